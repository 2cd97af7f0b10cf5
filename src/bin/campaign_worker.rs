//! Platform launch worker.
//!
//! Consumes `{env}-{platform}-campaign-launch` and runs the platform's launch steps
//! for each campaign. One process serves one platform, chosen by `WORKER_PLATFORM`.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campaign_api::config::WorkerConfig;
use campaign_api::db::Database;
use campaign_api::google_ads_client::GoogleAdsClient;
use campaign_api::google_ads_worker::GoogleAdsWorker;
use campaign_api::internal_client::InternalApiClient;
use campaign_api::models::Platform;
use campaign_api::platform_worker::{self, LaunchHandler, PollSettings, UnsupportedPlatform};
use campaign_api::queue::PgQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_api=debug,campaign_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let handler: Arc<dyn LaunchHandler> = match (config.platform, &config.google_ads) {
        (Platform::Google, Some(google_ads)) => {
            let internal = InternalApiClient::new(
                config.internal_api_url.clone(),
                config.business_rules_url.clone(),
                config.internal_api_key.clone(),
            )?;
            let ads = GoogleAdsClient::new(google_ads)?;
            tracing::info!("✓ Google Ads client initialized: {}", google_ads.api_url);
            Arc::new(GoogleAdsWorker::new(internal, ads))
        }
        (Platform::Google, None) => anyhow::bail!("Google Ads configuration missing"),
        (platform, _) => Arc::new(UnsupportedPlatform(platform)),
    };

    let queue = PgQueue::new(db.pool.clone(), config.app_env.clone());
    let settings = PollSettings {
        batch_size: config.batch_size,
        visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
        poll_interval: Duration::from_secs(config.poll_interval_secs),
        max_receives: config.max_receives,
    };

    platform_worker::run(queue, config.platform, handler, settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    })
    .await;

    Ok(())
}
