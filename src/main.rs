use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campaign_api::ad_platforms::{AdPlatformRegistry, GoogleAdsPlatform};
use campaign_api::auth::AuthKeys;
use campaign_api::config::Config;
use campaign_api::db::Database;
use campaign_api::db_storage::PgStorage;
use campaign_api::google_ads_client::GoogleAdsClient;
use campaign_api::handlers::{self, AppState};
use campaign_api::internal_handlers;
use campaign_api::orchestrator::CampaignOrchestrator;
use campaign_api::queue::PgQueue;
use campaign_api::shopify_client::ShopifyClient;
use campaign_api::store_profile_cache::StoreProfileCache;
use campaign_api::wallet_client::WalletClient;

/// Main entry point for the API.
///
/// Initializes tracing, configuration, the database (with migrations), outbound
/// clients and the store profile cache, then serves the HTTP routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    db.migrate().await?;
    tracing::info!("Database migrations applied");

    let storage = Arc::new(PgStorage::new(db.pool.clone()));
    let queue = Arc::new(PgQueue::new(db.pool.clone(), config.app_env.clone()));

    // Wallet calls go through the circuit breaker
    let wallet = Arc::new(WalletClient::new(
        config.wallet_service_url.clone(),
        config.internal_api_key.clone(),
    )?);
    tracing::info!("✓ Wallet client initialized: {}", config.wallet_service_url);

    let google_ads = GoogleAdsClient::new(&config.google_ads)?;
    let platforms =
        AdPlatformRegistry::with_defaults(GoogleAdsPlatform::new(storage.clone(), google_ads));

    let shopify = ShopifyClient::new(config.shopify.clone())?;

    let store_profiles = StoreProfileCache::new(
        Duration::from_secs(config.store_profile_cache_ttl_secs),
        config.store_profile_cache_capacity,
    );
    tracing::info!(
        "Store profile cache initialized ({}s TTL, {} capacity)",
        config.store_profile_cache_ttl_secs,
        config.store_profile_cache_capacity
    );

    let app_state = Arc::new(AppState {
        orchestrator: CampaignOrchestrator::new(
            storage.clone(),
            storage.clone(),
            wallet,
            queue,
            platforms,
        ),
        businesses: storage.clone(),
        google_ads_campaigns: storage,
        shopify,
        store_profiles,
        auth: AuthKeys {
            jwt_secret: config.jwt_secret.clone(),
            internal_api_key: config.internal_api_key.clone(),
            internal_token: config.internal_token.clone(),
        },
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let public_routes = handlers::public_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 1MB max payload
            .layer(RequestBodyLimitLayer::new(1024 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    let internal_routes =
        internal_handlers::internal_routes().layer(RequestBodyLimitLayer::new(1024 * 1024));

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(public_routes)
        .merge(internal_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
