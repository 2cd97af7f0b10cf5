//! Campaign orchestration.
//!
//! Creation runs strictly in order: quota check, wallet debit keyed by the new
//! campaign id, insert, then one launch message per platform. Debit and insert
//! are not rolled back when publishing fails; the campaign is marked
//! `FAILED_TO_LAUNCH` and the wallet transaction is logged for repair.

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::ad_platforms::AdPlatformRegistry;
use crate::db_storage::{BusinessStore, CampaignStore};
use crate::errors::{AppError, ResultExt};
use crate::models::{
    Business, Campaign, CampaignStatus, CreateCampaignRequest, LaunchMessage, Platform,
    TopUpResponse, UpdateCampaignRequest,
};
use crate::planning::ensure_start_not_past;
use crate::queue::QueueProducer;
use crate::wallet_client::{DebitRequest, WalletService};

/// Statuses an owner may set directly; the rest belong to the launch pipeline.
const USER_SETTABLE_STATUSES: [CampaignStatus; 3] = [
    CampaignStatus::Draft,
    CampaignStatus::Completed,
    CampaignStatus::Archived,
];

#[derive(Debug, Clone, Copy)]
enum Toggle {
    Pause,
    Resume,
}

/// Wallet amount in cents for a currency amount.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Checks a creation payload before any side effect.
pub fn validate_create_request(request: &CreateCampaignRequest) -> Result<(), AppError> {
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Campaign name is required".to_string()));
    }
    if request.platforms.is_empty() {
        return Err(AppError::BadRequest(
            "At least one platform is required".to_string(),
        ));
    }
    if !request.total_budget.is_finite() || request.total_budget <= 0.0 {
        return Err(AppError::BadRequest(
            "Total budget must be greater than zero".to_string(),
        ));
    }
    if request.end_date < request.start_date {
        return Err(AppError::BadRequest(
            "End date must not precede start date".to_string(),
        ));
    }
    ensure_start_not_past(request.start_date, Utc::now())
}

pub struct CampaignOrchestrator {
    campaigns: Arc<dyn CampaignStore>,
    businesses: Arc<dyn BusinessStore>,
    wallet: Arc<dyn WalletService>,
    queue: Arc<dyn QueueProducer>,
    platforms: AdPlatformRegistry,
}

impl CampaignOrchestrator {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        businesses: Arc<dyn BusinessStore>,
        wallet: Arc<dyn WalletService>,
        queue: Arc<dyn QueueProducer>,
        platforms: AdPlatformRegistry,
    ) -> Self {
        Self {
            campaigns,
            businesses,
            wallet,
            queue,
            platforms,
        }
    }

    /// Creates, funds and enqueues a campaign.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Authenticated owner.
    /// * `request` - Campaign payload.
    ///
    /// # Returns
    ///
    /// * `Result<Campaign, AppError>` - The stored campaign in `READY_TO_LAUNCH`. Fails with
    ///   `Forbidden` when the plan's campaign limit is reached, `PaymentRequired` when the
    ///   wallet cannot cover the budget, or the publish error after the campaign was stored.
    pub async fn create_campaign(
        &self,
        user_id: &str,
        request: CreateCampaignRequest,
    ) -> Result<Campaign, AppError> {
        validate_create_request(&request)?;
        self.owned_business(user_id, request.business_id).await?;

        let subscription = self
            .wallet
            .get_subscription_details(user_id)
            .await
            .context("Fetching subscription details")?;
        let count = self.campaigns.count_by_owner(user_id).await?;

        if count >= subscription.campaign_limit {
            tracing::warn!(
                "Campaign limit reached for user {}: {} of {} ({})",
                user_id,
                count,
                subscription.campaign_limit,
                subscription.plan_tier
            );
            return Err(AppError::Forbidden(format!(
                "Campaign limit exceeded: your {} plan allows {} campaign(s)",
                subscription.plan_tier, subscription.campaign_limit
            )));
        }

        let campaign_id = Uuid::new_v4();
        let debit = self
            .wallet
            .debit_for_campaign(&DebitRequest {
                user_id: user_id.to_string(),
                amount_in_cents: to_cents(request.total_budget),
                idempotency_key: campaign_id.to_string(),
                description: Some(format!("Campaign budget: {}", request.name.trim())),
            })
            .await?;
        tracing::info!(
            "💰 Wallet debited for campaign {} (transaction {})",
            campaign_id,
            debit.transaction_id
        );

        let mut platforms = request.platforms;
        platforms.sort();
        platforms.dedup();

        let now = Utc::now();
        let campaign = Campaign {
            id: campaign_id,
            owner_id: user_id.to_string(),
            business_id: request.business_id,
            name: request.name.trim().to_string(),
            status: CampaignStatus::ReadyToLaunch,
            platforms,
            products: request.products,
            target_locations: request.target_locations,
            total_budget: request.total_budget,
            start_date: request.start_date,
            end_date: request.end_date,
            launched_platforms: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.campaigns.insert(&campaign).await {
            tracing::error!(
                "❌ Campaign {} debited (transaction {}) but not stored: {}",
                campaign_id,
                debit.transaction_id,
                e
            );
            return Err(e);
        }

        let message = LaunchMessage { campaign_id };
        let results = join_all(
            campaign
                .platforms
                .iter()
                .map(|platform| self.queue.publish(*platform, &message)),
        )
        .await;

        let failures: Vec<(Platform, AppError)> = campaign
            .platforms
            .iter()
            .copied()
            .zip(results)
            .filter_map(|(platform, result)| result.err().map(|e| (platform, e)))
            .collect();

        if let Some((platform, error)) = failures.into_iter().next() {
            tracing::error!(
                "❌ Campaign {} stored and debited (transaction {}) but launch message for {} failed: {}",
                campaign_id,
                debit.transaction_id,
                platform,
                error
            );
            if let Err(e) = self
                .campaigns
                .set_status(campaign_id, CampaignStatus::FailedToLaunch)
                .await
            {
                tracing::error!("Failed to mark campaign {} as failed: {}", campaign_id, e);
            }
            return Err(error);
        }

        tracing::info!(
            "✅ Campaign {} created for {} platform(s)",
            campaign_id,
            campaign.platforms.len()
        );
        Ok(campaign)
    }

    pub async fn list_campaigns(&self, user_id: &str) -> Result<Vec<Campaign>, AppError> {
        self.campaigns.list_by_owner(user_id).await
    }

    /// Campaign by id for internal callers, without an ownership check.
    pub async fn find_campaign(&self, campaign_id: Uuid) -> Result<Campaign, AppError> {
        self.campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", campaign_id)))
    }

    pub async fn get_campaign(&self, user_id: &str, campaign_id: Uuid) -> Result<Campaign, AppError> {
        let campaign = self.find_campaign(campaign_id).await?;
        if campaign.owner_id != user_id {
            return Err(AppError::Forbidden(
                "Campaign belongs to another user".to_string(),
            ));
        }
        Ok(campaign)
    }

    pub async fn update_campaign(
        &self,
        user_id: &str,
        campaign_id: Uuid,
        patch: UpdateCampaignRequest,
    ) -> Result<Campaign, AppError> {
        let mut campaign = self.get_campaign(user_id, campaign_id).await?;

        let reschedules = patch.start_date.is_some() || patch.end_date.is_some();
        if reschedules && campaign.status.is_launch_in_progress() {
            return Err(AppError::Conflict(format!(
                "Schedule of a {} campaign cannot change",
                campaign.status
            )));
        }

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("Campaign name is required".to_string()));
            }
            campaign.name = name.trim().to_string();
        }
        if let Some(products) = patch.products {
            campaign.products = products;
        }
        if let Some(locations) = patch.target_locations {
            campaign.target_locations = locations;
        }
        if let Some(start) = patch.start_date {
            campaign.start_date = start;
        }
        if let Some(end) = patch.end_date {
            campaign.end_date = end;
        }
        if let Some(status) = patch.status {
            if !USER_SETTABLE_STATUSES.contains(&status) {
                return Err(AppError::BadRequest(format!(
                    "Status {} is managed by the launch pipeline",
                    status
                )));
            }
            campaign.status = status;
        }

        if campaign.end_date < campaign.start_date {
            return Err(AppError::BadRequest(
                "End date must not precede start date".to_string(),
            ));
        }

        self.campaigns.update(&campaign).await
    }

    /// Debits the wallet and adds `amount` to the campaign budget.
    pub async fn top_up(
        &self,
        user_id: &str,
        campaign_id: Uuid,
        amount: f64,
    ) -> Result<TopUpResponse, AppError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::BadRequest(
                "Top-up amount must be greater than zero".to_string(),
            ));
        }
        let campaign = self.get_campaign(user_id, campaign_id).await?;

        let debit = self
            .wallet
            .debit_for_campaign(&DebitRequest {
                user_id: user_id.to_string(),
                amount_in_cents: to_cents(amount),
                idempotency_key: Uuid::new_v4().to_string(),
                description: Some(format!("Campaign top-up: {}", campaign.name)),
            })
            .await?;

        let campaign = self
            .campaigns
            .add_budget(campaign_id, amount)
            .await
            .map_err(|e| {
                tracing::error!(
                    "❌ Top-up of campaign {} debited (transaction {}) but not applied: {}",
                    campaign_id,
                    debit.transaction_id,
                    e
                );
                e
            })?;

        tracing::info!("✓ Campaign {} topped up by {:.2}", campaign_id, amount);
        Ok(TopUpResponse {
            campaign,
            transaction_id: debit.transaction_id,
            remaining_balance: debit.remaining_balance,
        })
    }

    pub async fn pause_campaign(&self, user_id: &str, campaign_id: Uuid) -> Result<Campaign, AppError> {
        let campaign = self.get_campaign(user_id, campaign_id).await?;
        if campaign.status != CampaignStatus::Live {
            return Err(AppError::Conflict(format!(
                "Only LIVE campaigns can be paused (status is {})",
                campaign.status
            )));
        }

        self.toggle_platforms(&campaign, Toggle::Pause).await?;
        self.campaigns
            .set_status(campaign_id, CampaignStatus::Paused)
            .await
    }

    pub async fn resume_campaign(&self, user_id: &str, campaign_id: Uuid) -> Result<Campaign, AppError> {
        let campaign = self.get_campaign(user_id, campaign_id).await?;
        if campaign.status != CampaignStatus::Paused {
            return Err(AppError::Conflict(format!(
                "Only PAUSED campaigns can be resumed (status is {})",
                campaign.status
            )));
        }

        self.toggle_platforms(&campaign, Toggle::Resume).await?;
        self.campaigns
            .set_status(campaign_id, CampaignStatus::Live)
            .await
    }

    /// Runs pause or resume on every targeted platform.
    ///
    /// Platforms without the capability are skipped; fails when none supports it.
    async fn toggle_platforms(&self, campaign: &Campaign, action: Toggle) -> Result<(), AppError> {
        let mut unsupported = None;
        let mut applied = 0;

        for platform in &campaign.platforms {
            let implementation = self.platforms.get(*platform)?;
            let result = match action {
                Toggle::Pause => implementation.pause(campaign).await,
                Toggle::Resume => implementation.resume(campaign).await,
            };

            match result {
                Ok(()) => applied += 1,
                Err(AppError::NotImplemented(msg)) => {
                    tracing::warn!("⚠️ {} {:?} skipped: {}", platform, action, msg);
                    unsupported = Some(AppError::NotImplemented(msg));
                }
                Err(e) => return Err(e),
            }
        }

        match (applied, unsupported) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Per-platform campaign data keyed by platform name.
    pub async fn platform_data(&self, user_id: &str, campaign_id: Uuid) -> Result<Value, AppError> {
        let campaign = self.get_campaign(user_id, campaign_id).await?;

        let mut data = Map::new();
        for platform in &campaign.platforms {
            let value = match self.platforms.get(*platform)?.get_campaign_data(&campaign).await {
                Ok(value) => value,
                Err(AppError::NotImplemented(msg)) => json!({ "supported": false, "message": msg }),
                Err(e) => return Err(e),
            };
            data.insert(platform.as_str().to_string(), value);
        }
        Ok(Value::Object(data))
    }

    /// Records that a platform finished its launch steps.
    pub async fn record_platform_launched(
        &self,
        campaign_id: Uuid,
        platform: Platform,
    ) -> Result<Campaign, AppError> {
        let campaign = self.find_campaign(campaign_id).await?;
        if !campaign.platforms.contains(&platform) {
            return Err(AppError::BadRequest(format!(
                "Campaign {} does not target {}",
                campaign_id, platform
            )));
        }
        self.campaigns
            .mark_platform_launched(campaign_id, platform)
            .await
    }

    pub async fn set_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<Campaign, AppError> {
        let campaign = self.campaigns.set_status(campaign_id, status).await?;
        tracing::info!("Campaign {} status set to {}", campaign_id, status);
        Ok(campaign)
    }

    // ============ Businesses ============

    pub async fn create_business(&self, user_id: &str, name: &str) -> Result<Business, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Business name is required".to_string()));
        }

        let business = Business {
            id: Uuid::new_v4(),
            owner_id: user_id.to_string(),
            name: name.trim().to_string(),
            shopify: None,
            google_ads: None,
            created_at: Utc::now(),
        };
        self.businesses.insert(&business).await?;

        tracing::info!("✓ Business {} created for user {}", business.id, user_id);
        Ok(business)
    }

    pub async fn list_businesses(&self, user_id: &str) -> Result<Vec<Business>, AppError> {
        self.businesses.find_by_owner(user_id).await
    }

    pub async fn find_business(&self, business_id: Uuid) -> Result<Business, AppError> {
        self.businesses
            .find_by_id(business_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", business_id)))
    }

    pub async fn owned_business(&self, user_id: &str, business_id: Uuid) -> Result<Business, AppError> {
        let business = self.find_business(business_id).await?;
        if business.owner_id != user_id {
            return Err(AppError::Forbidden(
                "Business belongs to another user".to_string(),
            ));
        }
        Ok(business)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> CreateCampaignRequest {
        let start = Utc::now() + Duration::days(1);
        CreateCampaignRequest {
            business_id: Uuid::new_v4(),
            name: "Spring sale".to_string(),
            platforms: vec![Platform::Google],
            products: vec![],
            target_locations: vec![],
            total_budget: 100.0,
            start_date: start,
            end_date: start + Duration::days(9),
        }
    }

    #[test]
    fn test_to_cents_rounds() {
        assert_eq!(to_cents(100.0), 10_000);
        assert_eq!(to_cents(19.99), 1_999);
    }

    #[test]
    fn test_validate_create_request() {
        assert!(validate_create_request(&request()).is_ok());

        let mut no_platforms = request();
        no_platforms.platforms.clear();
        assert!(validate_create_request(&no_platforms).is_err());

        let mut zero_budget = request();
        zero_budget.total_budget = 0.0;
        assert!(validate_create_request(&zero_budget).is_err());

        let mut reversed = request();
        reversed.end_date = reversed.start_date - Duration::days(1);
        assert!(validate_create_request(&reversed).is_err());

        let mut started_last_week = request();
        started_last_week.start_date = Utc::now() - Duration::days(7);
        assert!(validate_create_request(&started_last_week).is_err());
    }
}
