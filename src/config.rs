use crate::models::Platform;

/// Runtime configuration of the HTTP API.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Deployment environment, part of every queue name.
    pub app_env: String,
    pub jwt_secret: String,
    /// Static key expected in `x-api-key` on `/internal/*` routes.
    pub internal_api_key: String,
    /// Token expected in `Authorization: Internal <token>`.
    pub internal_token: String,
    pub wallet_service_url: String,
    pub google_ads: GoogleAdsConfig,
    pub shopify: ShopifyConfig,
    pub store_profile_cache_ttl_secs: u64,
    pub store_profile_cache_capacity: u64,
}

/// Google Ads API credentials shared by the API and the worker.
#[derive(Debug, Clone)]
pub struct GoogleAdsConfig {
    pub api_url: String,
    pub developer_token: String,
    pub access_token: String,
    pub manager_customer_id: String,
}

#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    pub api_key: String,
    pub api_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
}

/// Runtime configuration of the platform worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub app_env: String,
    pub platform: Platform,
    pub internal_api_url: String,
    pub internal_api_key: String,
    pub business_rules_url: String,
    /// Only loaded for the Google worker.
    pub google_ads: Option<GoogleAdsConfig>,
    pub batch_size: i64,
    pub visibility_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Deliveries after which a message is moved to the dead-letter queue.
    pub max_receives: i32,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

fn required_url(name: &str) -> anyhow::Result<String> {
    let url = required(name)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn database_url() -> anyhow::Result<String> {
    std::env::var("DB_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required"))
        .and_then(|url| {
            if url.trim().is_empty() {
                anyhow::bail!("DB_URL cannot be empty");
            }
            if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
            }
            Ok(url)
        })
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        _ => Ok(default),
    }
}

fn app_env() -> String {
    std::env::var("APP_ENV")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "development".to_string())
        .to_lowercase()
}

impl GoogleAdsConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            api_url: std::env::var("GOOGLE_ADS_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "https://googleads.googleapis.com/v17".to_string())
                .trim_end_matches('/')
                .to_string(),
            developer_token: required("GOOGLE_ADS_DEVELOPER_TOKEN")?,
            access_token: required("GOOGLE_ADS_ACCESS_TOKEN")?,
            manager_customer_id: required("GOOGLE_ADS_MANAGER_CUSTOMER_ID")?
                .replace('-', ""),
        })
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: database_url()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            app_env: app_env(),
            jwt_secret: required("JWT_SECRET")?,
            internal_api_key: required("INTERNAL_API_KEY")?,
            internal_token: required("INTERNAL_TOKEN")?,
            wallet_service_url: required_url("WALLET_SERVICE_URL")?,
            google_ads: GoogleAdsConfig::from_env()?,
            shopify: ShopifyConfig {
                api_key: required("SHOPIFY_API_KEY")?,
                api_secret: required("SHOPIFY_API_SECRET")?,
                redirect_uri: required_url("SHOPIFY_REDIRECT_URI")?,
                scopes: std::env::var("SHOPIFY_SCOPES")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| "read_products,read_orders".to_string()),
            },
            store_profile_cache_ttl_secs: parsed_or("STORE_PROFILE_CACHE_TTL_SECS", 600)?,
            store_profile_cache_capacity: parsed_or("STORE_PROFILE_CACHE_CAPACITY", 1_000)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Environment: {}", config.app_env);
        tracing::debug!("Wallet service URL: {}", config.wallet_service_url);
        tracing::debug!("Google Ads API URL: {}", config.google_ads.api_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let platform = required("WORKER_PLATFORM")?;
        let platform = Platform::parse(&platform).ok_or_else(|| {
            anyhow::anyhow!(
                "WORKER_PLATFORM must be one of GOOGLE, FACEBOOK, INSTAGRAM (got {})",
                platform
            )
        })?;

        let config = Self {
            database_url: database_url()?,
            app_env: app_env(),
            platform,
            internal_api_url: required_url("INTERNAL_API_URL")?,
            internal_api_key: required("INTERNAL_API_KEY")?,
            business_rules_url: required_url("BUSINESS_RULES_URL")?,
            google_ads: match platform {
                Platform::Google => Some(GoogleAdsConfig::from_env()?),
                _ => None,
            },
            batch_size: parsed_or("QUEUE_BATCH_SIZE", 10)?,
            visibility_timeout_secs: parsed_or("QUEUE_VISIBILITY_TIMEOUT_SECS", 300)?,
            poll_interval_secs: parsed_or("QUEUE_POLL_INTERVAL_SECS", 5)?,
            max_receives: parsed_or("QUEUE_MAX_RECEIVES", 5)?,
        };

        if config.batch_size < 1 {
            anyhow::bail!("QUEUE_BATCH_SIZE must be at least 1");
        }
        if config.max_receives < 1 {
            anyhow::bail!("QUEUE_MAX_RECEIVES must be at least 1");
        }

        tracing::info!(
            "Worker configuration loaded: platform={}, env={}",
            config.platform,
            config.app_env
        );
        tracing::debug!("Internal API URL: {}", config.internal_api_url);
        tracing::debug!("Business rules URL: {}", config.business_rules_url);

        Ok(config)
    }
}
