//! Platform launch queues.
//!
//! Every targeted platform has one queue per environment. Messages are stored in
//! `queue_messages`; a receive hides a message for the visibility timeout and a
//! message that is not deleted before the timeout becomes visible again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::time::Duration;

use crate::errors::{AppError, ResultExt};
use crate::models::{LaunchMessage, Platform};

/// Suffix of the queue that holds messages which exhausted their deliveries.
pub const DEAD_LETTER_SUFFIX: &str = "-dead-letter";

/// Queue address for a platform in an environment, e.g. `production-google-campaign-launch`.
pub fn queue_name(env: &str, platform: Platform) -> String {
    format!("{}-{}-campaign-launch", env, platform.as_str()).to_lowercase()
}

#[async_trait]
pub trait QueueProducer: Send + Sync {
    async fn publish(&self, platform: Platform, message: &LaunchMessage) -> Result<(), AppError>;
}

/// A message claimed by a consumer.
#[derive(Debug, Clone, FromRow)]
pub struct ReceivedMessage {
    pub id: i64,
    pub queue_name: String,
    pub body: Json<LaunchMessage>,
    pub receive_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Postgres-backed queue.
#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    env: String,
}

impl PgQueue {
    pub fn new(pool: PgPool, env: impl Into<String>) -> Self {
        Self {
            pool,
            env: env.into(),
        }
    }

    pub fn queue_for(&self, platform: Platform) -> String {
        queue_name(&self.env, platform)
    }

    /// Claims up to `max` visible messages and hides them for `visibility_timeout`.
    pub async fn receive(
        &self,
        platform: Platform,
        max: i64,
        visibility_timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, AppError> {
        let queue = self.queue_for(platform);
        let hidden_until = Utc::now()
            + chrono::Duration::from_std(visibility_timeout)
                .unwrap_or_else(|_| chrono::Duration::seconds(30));

        let messages = sqlx::query_as::<_, ReceivedMessage>(
            r#"
            UPDATE queue_messages
            SET visible_at = $3, receive_count = receive_count + 1
            WHERE id IN (
                SELECT id FROM queue_messages
                WHERE queue_name = $1 AND visible_at <= NOW()
                ORDER BY id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, queue_name, body, receive_count, created_at
            "#,
        )
        .bind(&queue)
        .bind(max)
        .bind(hidden_until)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to receive from queue {}", queue))?;

        if !messages.is_empty() {
            tracing::debug!("Received {} message(s) from {}", messages.len(), queue);
        }
        Ok(messages)
    }

    /// Moves a message to the platform's dead-letter queue, where consumers no longer see it.
    pub async fn dead_letter(&self, message_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE queue_messages SET queue_name = queue_name || $2, visible_at = NOW() WHERE id = $1",
        )
        .bind(message_id)
        .bind(DEAD_LETTER_SUFFIX)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to dead-letter message {}", message_id))?;
        Ok(())
    }

    /// Acknowledges a processed message.
    pub async fn delete(&self, message_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM queue_messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl QueueProducer for PgQueue {
    async fn publish(&self, platform: Platform, message: &LaunchMessage) -> Result<(), AppError> {
        let queue = self.queue_for(platform);

        sqlx::query("INSERT INTO queue_messages (queue_name, body) VALUES ($1, $2)")
            .bind(&queue)
            .bind(Json(message))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to publish to queue {}", queue))?;

        tracing::info!("📤 Campaign {} queued on {}", message.campaign_id, queue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_queue_name_per_env_and_platform() {
        assert_eq!(
            queue_name("production", Platform::Google),
            "production-google-campaign-launch"
        );
        assert_eq!(
            queue_name("Staging", Platform::Instagram),
            "staging-instagram-campaign-launch"
        );
    }

    #[test]
    fn test_message_wire_format() {
        let id = Uuid::parse_str("4f6c1f5e-8b8a-4c53-9c2e-3a1d2b7e9f10").unwrap();
        let body = serde_json::to_value(LaunchMessage { campaign_id: id }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "campaignId": "4f6c1f5e-8b8a-4c53-9c2e-3a1d2b7e9f10" })
        );
    }
}
