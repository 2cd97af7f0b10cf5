//! Queue consumer shared by every platform worker.

use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppError;
use crate::google_ads_worker::GoogleAdsWorker;
use crate::models::Platform;
use crate::queue::{PgQueue, ReceivedMessage};

/// Runs the launch steps of one platform for a campaign.
#[async_trait]
pub trait LaunchHandler: Send + Sync {
    async fn launch(&self, campaign_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
impl LaunchHandler for GoogleAdsWorker {
    async fn launch(&self, campaign_id: Uuid) -> Result<(), AppError> {
        self.process(campaign_id).await
    }
}

/// Placeholder for platforms without a launch integration yet. Messages are
/// acknowledged and the campaign is left as is.
pub struct UnsupportedPlatform(pub Platform);

#[async_trait]
impl LaunchHandler for UnsupportedPlatform {
    async fn launch(&self, campaign_id: Uuid) -> Result<(), AppError> {
        tracing::warn!(
            "⚠️ {} launch is not implemented, acknowledging campaign {}",
            self.0,
            campaign_id
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub batch_size: i64,
    pub visibility_timeout: Duration,
    pub poll_interval: Duration,
    /// Deliveries allowed before a message is dead-lettered.
    pub max_receives: i32,
}

/// Result of handling one message; only successes are deleted from the queue.
#[derive(Debug)]
pub struct Outcome {
    pub message_id: i64,
    pub campaign_id: Uuid,
    pub result: Result<(), AppError>,
}

/// Splits a batch into messages still worth handling and messages delivered more
/// than `max_receives` times.
pub fn split_exhausted(
    messages: Vec<ReceivedMessage>,
    max_receives: i32,
) -> (Vec<ReceivedMessage>, Vec<ReceivedMessage>) {
    messages
        .into_iter()
        .partition(|message| message.receive_count <= max_receives)
}

/// Handles a batch concurrently.
pub async fn handle_batch(
    handler: &dyn LaunchHandler,
    messages: &[ReceivedMessage],
) -> Vec<Outcome> {
    join_all(messages.iter().map(|message| async move {
        let campaign_id = message.body.campaign_id;
        Outcome {
            message_id: message.id,
            campaign_id,
            result: handler.launch(campaign_id).await,
        }
    }))
    .await
}

/// Polls the platform queue until `shutdown` resolves.
///
/// Failed messages stay in the queue and are redelivered once their visibility
/// timeout expires.
pub async fn run(
    queue: PgQueue,
    platform: Platform,
    handler: Arc<dyn LaunchHandler>,
    settings: PollSettings,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);
    tracing::info!(
        "Worker polling {} (batch {}, visibility {:?})",
        queue.queue_for(platform),
        settings.batch_size,
        settings.visibility_timeout
    );

    loop {
        let received = tokio::select! {
            _ = &mut shutdown => break,
            received = queue.receive(platform, settings.batch_size, settings.visibility_timeout) => received,
        };

        let messages = match received {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Failed to receive messages: {}", e);
                Vec::new()
            }
        };

        let (messages, exhausted) = split_exhausted(messages, settings.max_receives);
        for message in &exhausted {
            tracing::error!(
                "☠️ Campaign {} gave up after {} deliveries, moving message {} to dead letter",
                message.body.campaign_id,
                message.receive_count,
                message.id
            );
            if let Err(e) = queue.dead_letter(message.id).await {
                tracing::error!("Failed to dead-letter message {}: {}", message.id, e);
            }
        }

        if messages.is_empty() && !exhausted.is_empty() {
            continue;
        }

        if messages.is_empty() {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(settings.poll_interval) => continue,
            }
        }

        for outcome in handle_batch(handler.as_ref(), &messages).await {
            match outcome.result {
                Ok(()) => {
                    if let Err(e) = queue.delete(outcome.message_id).await {
                        tracing::error!(
                            "Failed to delete message {} for campaign {}: {}",
                            outcome.message_id,
                            outcome.campaign_id,
                            e
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(
                        "❌ {} launch failed for campaign {} (message {}): {}",
                        platform,
                        outcome.campaign_id,
                        outcome.message_id,
                        e
                    );
                }
            }
        }
    }

    tracing::info!("Worker for {} stopped", platform);
}
