//! Shopify OAuth and Admin API client.

use regex::Regex;
use serde::{Deserialize, Serialize};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::OnceLock;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ShopifyConfig;
use crate::errors::AppError;
use crate::models::Product;

const ADMIN_API_VERSION: &str = "2024-01";

type HmacSha256 = Hmac<Sha256>;

fn shop_domain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9-]*\.myshopify\.com$").expect("shop domain pattern is valid")
    })
}

/// Normalizes and validates a `*.myshopify.com` shop domain.
pub fn validate_shop_domain(shop: &str) -> Result<String, AppError> {
    let shop = shop
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_lowercase();

    if shop_domain_regex().is_match(&shop) {
        Ok(shop)
    } else {
        Err(AppError::BadRequest(format!("Invalid Shopify shop domain: {}", shop)))
    }
}

/// Shop details returned by `shop.json`; cached as the ad-library store profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProfile {
    pub shop_domain: String,
    pub name: String,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub currency: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShopEnvelope {
    shop: ShopResource,
}

#[derive(Debug, Deserialize)]
struct ShopResource {
    name: String,
    email: Option<String>,
    domain: Option<String>,
    currency: Option<String>,
    country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyVariant {
    pub price: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyImage {
    pub src: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyProduct {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    pub handle: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
    #[serde(default)]
    pub images: Vec<ShopifyImage>,
}

#[derive(Debug, Deserialize)]
struct ProductsEnvelope {
    products: Vec<ShopifyProduct>,
}

impl ShopifyProduct {
    /// Campaign product for this listing. Price is the first variant's.
    pub fn to_campaign_product(&self, shop_domain: &str) -> Product {
        let price = self
            .variants
            .first()
            .and_then(|v| v.price.parse::<f64>().ok())
            .unwrap_or(0.0);

        Product {
            title: self.title.clone(),
            price,
            description: self.body_html.as_deref().map(strip_html).filter(|d| !d.is_empty()),
            features: self
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            images: self.images.iter().map(|i| i.src.clone()).collect(),
            creatives: Vec::new(),
            url: Some(format!("https://{}/products/{}", shop_domain, self.handle)),
        }
    }
}

fn strip_html(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));
    tags.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parsed OAuth `state`: who started the install and for which business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallState {
    pub user_id: String,
    pub business_id: Uuid,
}

#[derive(Clone)]
pub struct ShopifyClient {
    client: reqwest::Client,
    config: ShopifyConfig,
    /// Replaces `https://{shop}` for every call when set.
    base_url_override: Option<String>,
}

impl ShopifyClient {
    pub fn new(config: ShopifyConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Shopify client: {}", e))
            })?;

        Ok(Self {
            client,
            config,
            base_url_override: None,
        })
    }

    /// Sends every request to `base_url` instead of the shop's own host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn shop_url(&self, shop: &str) -> String {
        self.base_url_override
            .clone()
            .unwrap_or_else(|| format!("https://{}", shop))
    }

    /// HMAC over the install binding, keyed with the app secret.
    fn state_mac(&self, user_id: &str, business_id: Uuid) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .map_err(|e| AppError::InternalError(format!("Invalid Shopify secret: {}", e)))?;
        mac.update(business_id.as_bytes());
        mac.update(b":");
        mac.update(user_id.as_bytes());
        Ok(mac)
    }

    /// `state` value binding an install to a user and business.
    pub fn sign_state(&self, user_id: &str, business_id: Uuid) -> Result<String, AppError> {
        let signature = self.state_mac(user_id, business_id)?.finalize().into_bytes();
        Ok(format!("{}.{}.{}", business_id, user_id, hex::encode(signature)))
    }

    pub fn verify_state(&self, state: &str) -> Result<InstallState, AppError> {
        let invalid = || AppError::BadRequest("Invalid OAuth state".to_string());

        let (business_id, rest) = state.split_once('.').ok_or_else(invalid)?;
        let (user_id, signature) = rest.rsplit_once('.').ok_or_else(invalid)?;
        let business_id = Uuid::parse_str(business_id).map_err(|_| invalid())?;

        let signature = hex::decode(signature).map_err(|_| invalid())?;
        if user_id.is_empty() {
            return Err(invalid());
        }
        self.state_mac(user_id, business_id)?
            .verify_slice(&signature)
            .map_err(|_| invalid())?;

        Ok(InstallState {
            user_id: user_id.to_string(),
            business_id,
        })
    }

    /// OAuth install URL for `shop`.
    pub fn build_auth_url(&self, shop: &str, state: &str) -> Result<String, AppError> {
        let shop = validate_shop_domain(shop)?;
        let url = reqwest::Url::parse_with_params(
            &format!("https://{}/admin/oauth/authorize", shop),
            &[
                ("client_id", self.config.api_key.as_str()),
                ("scope", self.config.scopes.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build install URL: {}", e)))?;

        Ok(url.to_string())
    }

    /// Trades an OAuth `code` for an offline access token.
    pub async fn exchange_code(&self, shop: &str, code: &str) -> Result<String, AppError> {
        let shop = validate_shop_domain(shop)?;
        let response = self
            .client
            .post(format!("{}/admin/oauth/access_token", self.shop_url(&shop)))
            .json(&serde_json::json!({
                "client_id": self.config.api_key,
                "client_secret": self.config.api_secret,
                "code": code,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: format!("Shopify token exchange failed: {}", body),
            });
        }

        let token: AccessTokenResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Shopify token: {}", e))
        })?;

        tracing::info!("✓ Shopify access token obtained for {}", shop);
        Ok(token.access_token)
    }

    async fn admin_get<T: serde::de::DeserializeOwned>(
        &self,
        shop: &str,
        access_token: &str,
        resource: &str,
    ) -> Result<T, AppError> {
        let url = format!(
            "{}/admin/api/{}/{}",
            self.shop_url(shop),
            ADMIN_API_VERSION,
            resource
        );

        let response = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", access_token)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(AppError::Unauthorized(format!(
                "Shopify rejected the access token for {}",
                shop
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApiError(format!(
                "Shopify {} returned {}: {}",
                resource, status, body
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Shopify {}: {}", resource, e))
        })
    }

    pub async fn list_products(
        &self,
        shop: &str,
        access_token: &str,
    ) -> Result<Vec<ShopifyProduct>, AppError> {
        let envelope: ProductsEnvelope = self
            .admin_get(shop, access_token, "products.json?limit=250")
            .await?;
        Ok(envelope.products)
    }

    pub async fn get_shop(&self, shop: &str, access_token: &str) -> Result<StoreProfile, AppError> {
        let envelope: ShopEnvelope = self.admin_get(shop, access_token, "shop.json").await?;
        let resource = envelope.shop;

        Ok(StoreProfile {
            shop_domain: shop.to_string(),
            name: resource.name,
            email: resource.email,
            domain: resource.domain,
            currency: resource.currency,
            country_code: resource.country_code,
        })
    }
}
