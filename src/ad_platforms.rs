//! Live-campaign operations per ad platform.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db_storage::GoogleAdsCampaignStore;
use crate::errors::AppError;
use crate::google_ads_client::GoogleAdsClient;
use crate::models::{Campaign, Platform};

/// Capabilities every ad platform exposes once a campaign is launched on it.
#[async_trait]
pub trait AdPlatform: Send + Sync {
    async fn pause(&self, campaign: &Campaign) -> Result<(), AppError>;
    async fn resume(&self, campaign: &Campaign) -> Result<(), AppError>;
    async fn get_campaign_data(&self, campaign: &Campaign) -> Result<Value, AppError>;
}

pub struct GoogleAdsPlatform {
    shadows: Arc<dyn GoogleAdsCampaignStore>,
    ads: GoogleAdsClient,
}

impl GoogleAdsPlatform {
    pub fn new(shadows: Arc<dyn GoogleAdsCampaignStore>, ads: GoogleAdsClient) -> Self {
        Self { shadows, ads }
    }

    /// Customer id and campaign resource recorded by the launch worker.
    async fn locate(&self, campaign: &Campaign) -> Result<(String, String), AppError> {
        let shadow = self.shadows.find(campaign.id).await?;

        match shadow.and_then(|s| s.customer_id.zip(s.campaign_resource_name)) {
            Some(located) => Ok(located),
            None => Err(AppError::Conflict(format!(
                "Campaign {} has not been created on Google Ads yet",
                campaign.id
            ))),
        }
    }
}

#[async_trait]
impl AdPlatform for GoogleAdsPlatform {
    async fn pause(&self, campaign: &Campaign) -> Result<(), AppError> {
        let (customer_id, resource) = self.locate(campaign).await?;
        self.ads
            .set_campaign_status(&customer_id, &resource, "PAUSED")
            .await
    }

    async fn resume(&self, campaign: &Campaign) -> Result<(), AppError> {
        let (customer_id, resource) = self.locate(campaign).await?;
        self.ads
            .set_campaign_status(&customer_id, &resource, "ENABLED")
            .await
    }

    async fn get_campaign_data(&self, campaign: &Campaign) -> Result<Value, AppError> {
        let (customer_id, resource) = self.locate(campaign).await?;
        let row = self.ads.campaign_metrics(&customer_id, &resource).await?;

        Ok(json!({
            "customerId": customer_id,
            "campaignResourceName": resource,
            "status": row.pointer("/campaign/status").cloned().unwrap_or(Value::Null),
            "metrics": row.get("metrics").cloned().unwrap_or_else(|| json!({})),
        }))
    }
}

/// Facebook and Instagram. No Graph API integration yet.
pub struct MetaAdsPlatform;

#[async_trait]
impl AdPlatform for MetaAdsPlatform {
    async fn pause(&self, _campaign: &Campaign) -> Result<(), AppError> {
        Err(AppError::NotImplemented("Meta campaign pause".to_string()))
    }

    async fn resume(&self, _campaign: &Campaign) -> Result<(), AppError> {
        Err(AppError::NotImplemented("Meta campaign resume".to_string()))
    }

    async fn get_campaign_data(&self, _campaign: &Campaign) -> Result<Value, AppError> {
        Err(AppError::NotImplemented("Meta campaign data".to_string()))
    }
}

/// Ad platform implementations keyed by platform.
#[derive(Clone, Default)]
pub struct AdPlatformRegistry {
    platforms: HashMap<Platform, Arc<dyn AdPlatform>>,
}

impl AdPlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Google Ads plus the shared Meta implementation for Facebook and Instagram.
    pub fn with_defaults(google: GoogleAdsPlatform) -> Self {
        let meta: Arc<dyn AdPlatform> = Arc::new(MetaAdsPlatform);
        Self::new()
            .register(Platform::Google, Arc::new(google))
            .register(Platform::Facebook, meta.clone())
            .register(Platform::Instagram, meta)
    }

    pub fn register(mut self, platform: Platform, implementation: Arc<dyn AdPlatform>) -> Self {
        self.platforms.insert(platform, implementation);
        self
    }

    pub fn get(&self, platform: Platform) -> Result<Arc<dyn AdPlatform>, AppError> {
        self.platforms.get(&platform).cloned().ok_or_else(|| {
            AppError::NotImplemented(format!("No ad platform registered for {}", platform))
        })
    }
}
