use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

use crate::errors::AppError;

// ============ Enums ============

/// External advertising platform a campaign can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Facebook,
    Instagram,
    Google,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Facebook, Platform::Instagram, Platform::Google];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "FACEBOOK",
            Platform::Instagram => "INSTAGRAM",
            Platform::Google => "GOOGLE",
        }
    }

    /// Case-insensitive parse of the wire name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "FACEBOOK" => Some(Platform::Facebook),
            "INSTAGRAM" => Some(Platform::Instagram),
            "GOOGLE" => Some(Platform::Google),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Archived,
    ValidationFailed,
    ReadyToLaunch,
    Launching,
    FailedToLaunch,
    Live,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "DRAFT",
            CampaignStatus::Active => "ACTIVE",
            CampaignStatus::Paused => "PAUSED",
            CampaignStatus::Completed => "COMPLETED",
            CampaignStatus::Archived => "ARCHIVED",
            CampaignStatus::ValidationFailed => "VALIDATION_FAILED",
            CampaignStatus::ReadyToLaunch => "READY_TO_LAUNCH",
            CampaignStatus::Launching => "LAUNCHING",
            CampaignStatus::FailedToLaunch => "FAILED_TO_LAUNCH",
            CampaignStatus::Live => "LIVE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let status = match raw {
            "DRAFT" => CampaignStatus::Draft,
            "ACTIVE" => CampaignStatus::Active,
            "PAUSED" => CampaignStatus::Paused,
            "COMPLETED" => CampaignStatus::Completed,
            "ARCHIVED" => CampaignStatus::Archived,
            "VALIDATION_FAILED" => CampaignStatus::ValidationFailed,
            "READY_TO_LAUNCH" => CampaignStatus::ReadyToLaunch,
            "LAUNCHING" => CampaignStatus::Launching,
            "FAILED_TO_LAUNCH" => CampaignStatus::FailedToLaunch,
            "LIVE" => CampaignStatus::Live,
            _ => return None,
        };
        Some(status)
    }

    /// Statuses during which budget and schedule are owned by the launch pipeline.
    pub fn is_launch_in_progress(&self) -> bool {
        matches!(self, CampaignStatus::Launching | CampaignStatus::Live)
    }

    /// Statuses a platform launch report may advance. Owner-set statuses stay put.
    pub fn follows_launch_reports(&self) -> bool {
        matches!(
            self,
            CampaignStatus::ReadyToLaunch
                | CampaignStatus::Launching
                | CampaignStatus::FailedToLaunch
                | CampaignStatus::Live
        )
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Campaign ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    pub url: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub creatives: Vec<Creative>,
    /// Storefront URL of the product page.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub country: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: String,
    pub business_id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub platforms: Vec<Platform>,
    pub products: Vec<Product>,
    pub target_locations: Vec<Location>,
    pub total_budget: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Platforms that reported their launch steps complete.
    #[serde(default)]
    pub launched_platforms: Vec<Platform>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for `campaigns`; nested documents live in JSONB columns.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub owner_id: String,
    pub business_id: Uuid,
    pub name: String,
    pub status: String,
    pub platforms: Json<Vec<Platform>>,
    pub products: Json<Vec<Product>>,
    pub target_locations: Json<Vec<Location>>,
    pub total_budget: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub launched_platforms: Json<Vec<Platform>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = AppError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let status = CampaignStatus::parse(&row.status).ok_or_else(|| {
            AppError::InternalError(format!(
                "Campaign {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            business_id: row.business_id,
            name: row.name,
            status,
            platforms: row.platforms.0,
            products: row.products.0,
            target_locations: row.target_locations.0,
            total_budget: row.total_budget,
            start_date: row.start_date,
            end_date: row.end_date,
            launched_platforms: row.launched_platforms.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Status implied by the set of platforms that finished launching.
///
/// `LIVE` only once every targeted platform has reported, `LAUNCHING` before.
/// Campaigns the owner paused, archived or completed keep `current`.
pub fn aggregate_launch_status(
    current: CampaignStatus,
    targeted: &[Platform],
    launched: &[Platform],
) -> CampaignStatus {
    if !current.follows_launch_reports() {
        current
    } else if !targeted.is_empty() && targeted.iter().all(|p| launched.contains(p)) {
        CampaignStatus::Live
    } else {
        CampaignStatus::Launching
    }
}

// ============ Business ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsIntegration {
    pub customer_id: String,
    pub conversion_action_resource_name: String,
    pub conversion_tag: String,
    pub conversion_label: String,
    #[serde(default)]
    pub global_site_tag: Option<String>,
    #[serde(default)]
    pub event_snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyAccount {
    pub shop_domain: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub shopify: Option<ShopifyAccount>,
    pub google_ads: Option<GoogleAdsIntegration>,
    pub created_at: DateTime<Utc>,
}

impl Business {
    /// Public storefront URL used to seed keyword ideas.
    pub fn storefront_url(&self) -> Option<String> {
        self.shopify
            .as_ref()
            .map(|s| format!("https://{}", s.shop_domain))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BusinessRow {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub shopify_shop_domain: Option<String>,
    pub shopify_access_token: Option<String>,
    pub google_ads_customer_id: Option<String>,
    pub google_ads_conversion_action: Option<String>,
    pub google_ads_conversion_tag: Option<String>,
    pub google_ads_conversion_label: Option<String>,
    pub google_ads_global_site_tag: Option<String>,
    pub google_ads_event_snippet: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        let shopify = match (row.shopify_shop_domain, row.shopify_access_token) {
            (Some(shop_domain), Some(access_token)) => Some(ShopifyAccount {
                shop_domain,
                access_token,
            }),
            _ => None,
        };

        let google_ads = match (
            row.google_ads_customer_id,
            row.google_ads_conversion_action,
            row.google_ads_conversion_tag,
            row.google_ads_conversion_label,
        ) {
            (Some(customer_id), Some(action), Some(tag), Some(label)) => {
                Some(GoogleAdsIntegration {
                    customer_id,
                    conversion_action_resource_name: action,
                    conversion_tag: tag,
                    conversion_label: label,
                    global_site_tag: row.google_ads_global_site_tag,
                    event_snippet: row.google_ads_event_snippet,
                })
            }
            _ => None,
        };

        Self {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            shopify,
            google_ads,
            created_at: row.created_at,
        }
    }
}

// ============ Google Ads shadow record ============

/// Per-campaign Google Ads progress record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsCampaign {
    pub campaign_id: Uuid,
    pub customer_id: Option<String>,
    pub budget_resource_name: Option<String>,
    pub bidding_strategy_resource_name: Option<String>,
    pub campaign_resource_name: Option<String>,
    #[serde(default)]
    pub ad_group_resource_names: Vec<String>,
    #[serde(default)]
    pub ad_group_ad_resource_names: Vec<String>,
    pub daily_budget: Option<f64>,
    pub target_roas: Option<f64>,
    #[serde(default)]
    pub keywords_added_to_ad_groups: bool,
    #[serde(default)]
    pub geotargeting_added_to_campaign: bool,
    #[serde(default)]
    pub all_steps_completed: bool,
}

/// Partial update of a shadow record; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAdsCampaignPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidding_strategy_resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_group_resource_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_group_ad_resource_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_roas: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords_added_to_ad_groups: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geotargeting_added_to_campaign: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_steps_completed: Option<bool>,
}

impl GoogleAdsCampaign {
    /// Applies a patch in place, keeping fields the patch leaves unset.
    pub fn apply(&mut self, patch: &GoogleAdsCampaignPatch) {
        if let Some(v) = &patch.customer_id {
            self.customer_id = Some(v.clone());
        }
        if let Some(v) = &patch.budget_resource_name {
            self.budget_resource_name = Some(v.clone());
        }
        if let Some(v) = &patch.bidding_strategy_resource_name {
            self.bidding_strategy_resource_name = Some(v.clone());
        }
        if let Some(v) = &patch.campaign_resource_name {
            self.campaign_resource_name = Some(v.clone());
        }
        if let Some(v) = &patch.ad_group_resource_names {
            self.ad_group_resource_names = v.clone();
        }
        if let Some(v) = &patch.ad_group_ad_resource_names {
            self.ad_group_ad_resource_names = v.clone();
        }
        if let Some(v) = patch.daily_budget {
            self.daily_budget = Some(v);
        }
        if let Some(v) = patch.target_roas {
            self.target_roas = Some(v);
        }
        if let Some(v) = patch.keywords_added_to_ad_groups {
            self.keywords_added_to_ad_groups = v;
        }
        if let Some(v) = patch.geotargeting_added_to_campaign {
            self.geotargeting_added_to_campaign = v;
        }
        if let Some(v) = patch.all_steps_completed {
            self.all_steps_completed = v;
        }
    }
}

// ============ Request / response payloads ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub business_id: Uuid,
    pub name: String,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub target_locations: Vec<Location>,
    pub total_budget: f64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub products: Option<Vec<Product>>,
    pub target_locations: Option<Vec<Location>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: Option<CampaignStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpResponse {
    pub campaign: Campaign,
    pub transaction_id: String,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBusinessRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: CampaignStatus,
}

/// Body of every message published to a platform launch queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchMessage {
    pub campaign_id: Uuid,
}
