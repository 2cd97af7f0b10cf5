use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::models::{
    aggregate_launch_status, Business, BusinessRow, Campaign, CampaignRow, CampaignStatus,
    GoogleAdsCampaign, GoogleAdsCampaignPatch, GoogleAdsIntegration, Platform,
};

const CAMPAIGN_COLUMNS: &str = "id, owner_id, business_id, name, status, platforms, products, \
     target_locations, total_budget, start_date, end_date, launched_platforms, created_at, updated_at";

const BUSINESS_COLUMNS: &str = "id, owner_id, name, shopify_shop_domain, shopify_access_token, \
     google_ads_customer_id, google_ads_conversion_action, google_ads_conversion_tag, \
     google_ads_conversion_label, google_ads_global_site_tag, google_ads_event_snippet, created_at";

const SHADOW_COLUMNS: &str = "campaign_id, customer_id, budget_resource_name, \
     bidding_strategy_resource_name, campaign_resource_name, ad_group_resource_names, \
     ad_group_ad_resource_names, daily_budget, target_roas, keywords_added_to_ad_groups, \
     geotargeting_added_to_campaign, all_steps_completed";

/// Campaign persistence used by the orchestrator and the HTTP layer.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn count_by_owner(&self, owner_id: &str) -> Result<i64, AppError>;
    async fn insert(&self, campaign: &Campaign) -> Result<(), AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, AppError>;
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Campaign>, AppError>;
    /// Persists the editable fields (name, products, locations, dates, status).
    async fn update(&self, campaign: &Campaign) -> Result<Campaign, AppError>;
    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<Campaign, AppError>;
    async fn add_budget(&self, id: Uuid, amount: f64) -> Result<Campaign, AppError>;
    /// Records a platform as launched and recomputes the parent status.
    async fn mark_platform_launched(
        &self,
        id: Uuid,
        platform: Platform,
    ) -> Result<Campaign, AppError>;
}

#[async_trait]
pub trait BusinessStore: Send + Sync {
    async fn insert(&self, business: &Business) -> Result<(), AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Business>, AppError>;
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Business>, AppError>;
    async fn set_shopify_account(
        &self,
        id: Uuid,
        shop_domain: &str,
        access_token: &str,
    ) -> Result<Business, AppError>;
    /// Stores the ad-account integration. Fails with `Conflict` if one is already set.
    async fn set_google_ads_integration(
        &self,
        id: Uuid,
        integration: &GoogleAdsIntegration,
    ) -> Result<Business, AppError>;
}

#[async_trait]
pub trait GoogleAdsCampaignStore: Send + Sync {
    async fn find(&self, campaign_id: Uuid) -> Result<Option<GoogleAdsCampaign>, AppError>;
    async fn upsert(
        &self,
        campaign_id: Uuid,
        patch: &GoogleAdsCampaignPatch,
    ) -> Result<GoogleAdsCampaign, AppError>;
}

/// Postgres-backed implementation of every store.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_campaign(&self, id: Uuid) -> Result<Campaign, AppError> {
        self.find_campaign(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", id)))
    }

    async fn find_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load campaign")?;

        row.map(Campaign::try_from).transpose()
    }

    async fn fetch_business(&self, id: Uuid) -> Result<Business, AppError> {
        BusinessStore::find_by_id(self, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))
    }
}

#[async_trait]
impl CampaignStore for PgStorage {
    async fn count_by_owner(&self, owner_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM campaigns WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn insert(&self, campaign: &Campaign) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, owner_id, business_id, name, status, platforms, products,
                target_locations, total_budget, start_date, end_date,
                launched_platforms, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(campaign.id)
        .bind(&campaign.owner_id)
        .bind(campaign.business_id)
        .bind(&campaign.name)
        .bind(campaign.status.as_str())
        .bind(Json(&campaign.platforms))
        .bind(Json(&campaign.products))
        .bind(Json(&campaign.target_locations))
        .bind(campaign.total_budget)
        .bind(campaign.start_date)
        .bind(campaign.end_date)
        .bind(Json(&campaign.launched_platforms))
        .bind(campaign.created_at)
        .bind(campaign.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert campaign")?;

        tracing::info!("✓ Campaign {} stored", campaign.id);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        self.find_campaign(id).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Campaign>, AppError> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE owner_id = $1 ORDER BY created_at DESC",
            CAMPAIGN_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn update(&self, campaign: &Campaign) -> Result<Campaign, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            UPDATE campaigns
            SET name = $2, products = $3, target_locations = $4,
                start_date = $5, end_date = $6, status = $7, updated_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        ))
        .bind(campaign.id)
        .bind(&campaign.name)
        .bind(Json(&campaign.products))
        .bind(Json(&campaign.target_locations))
        .bind(campaign.start_date)
        .bind(campaign.end_date)
        .bind(campaign.status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", campaign.id)))?;

        Campaign::try_from(row)
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<Campaign, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "UPDATE campaigns SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", id)))?;

        Campaign::try_from(row)
    }

    async fn add_budget(&self, id: Uuid, amount: f64) -> Result<Campaign, AppError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "UPDATE campaigns SET total_budget = total_budget + $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", id)))?;

        Campaign::try_from(row)
    }

    async fn mark_platform_launched(
        &self,
        id: Uuid,
        platform: Platform,
    ) -> Result<Campaign, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {} FROM campaigns WHERE id = $1 FOR UPDATE",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Campaign {} not found", id)))?;

        let mut campaign = Campaign::try_from(row)?;
        if !campaign.launched_platforms.contains(&platform) {
            campaign.launched_platforms.push(platform);
            campaign.launched_platforms.sort();
        }
        let status = aggregate_launch_status(
            campaign.status,
            &campaign.platforms,
            &campaign.launched_platforms,
        );

        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "UPDATE campaigns SET launched_platforms = $2, status = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            CAMPAIGN_COLUMNS
        ))
        .bind(id)
        .bind(Json(&campaign.launched_platforms))
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "✓ Campaign {} platform {} launched, status now {}",
            id,
            platform,
            status
        );
        Campaign::try_from(row)
    }
}

#[async_trait]
impl BusinessStore for PgStorage {
    async fn insert(&self, business: &Business) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO businesses (id, owner_id, name, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(business.id)
        .bind(&business.owner_id)
        .bind(&business.name)
        .bind(business.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert business")?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Business>, AppError> {
        let row = sqlx::query_as::<_, BusinessRow>(&format!(
            "SELECT {} FROM businesses WHERE id = $1",
            BUSINESS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Business::from))
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Business>, AppError> {
        let rows = sqlx::query_as::<_, BusinessRow>(&format!(
            "SELECT {} FROM businesses WHERE owner_id = $1 ORDER BY created_at ASC",
            BUSINESS_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Business::from).collect())
    }

    async fn set_shopify_account(
        &self,
        id: Uuid,
        shop_domain: &str,
        access_token: &str,
    ) -> Result<Business, AppError> {
        let row = sqlx::query_as::<_, BusinessRow>(&format!(
            "UPDATE businesses SET shopify_shop_domain = $2, shopify_access_token = $3 \
             WHERE id = $1 RETURNING {}",
            BUSINESS_COLUMNS
        ))
        .bind(id)
        .bind(shop_domain)
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))?;

        Ok(Business::from(row))
    }

    async fn set_google_ads_integration(
        &self,
        id: Uuid,
        integration: &GoogleAdsIntegration,
    ) -> Result<Business, AppError> {
        let row = sqlx::query_as::<_, BusinessRow>(&format!(
            r#"
            UPDATE businesses
            SET google_ads_customer_id = $2, google_ads_conversion_action = $3,
                google_ads_conversion_tag = $4, google_ads_conversion_label = $5,
                google_ads_global_site_tag = $6, google_ads_event_snippet = $7
            WHERE id = $1 AND google_ads_customer_id IS NULL
            RETURNING {}
            "#,
            BUSINESS_COLUMNS
        ))
        .bind(id)
        .bind(&integration.customer_id)
        .bind(&integration.conversion_action_resource_name)
        .bind(&integration.conversion_tag)
        .bind(&integration.conversion_label)
        .bind(&integration.global_site_tag)
        .bind(&integration.event_snippet)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Business::from(row)),
            None => {
                // Either the business is missing or the integration was already set
                self.fetch_business(id).await?;
                Err(AppError::Conflict(format!(
                    "Business {} already has a Google Ads account",
                    id
                )))
            }
        }
    }
}

#[async_trait]
impl GoogleAdsCampaignStore for PgStorage {
    async fn find(&self, campaign_id: Uuid) -> Result<Option<GoogleAdsCampaign>, AppError> {
        let shadow = sqlx::query_as::<_, GoogleAdsCampaign>(&format!(
            "SELECT {} FROM google_ads_campaigns WHERE campaign_id = $1",
            SHADOW_COLUMNS
        ))
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shadow)
    }

    async fn upsert(
        &self,
        campaign_id: Uuid,
        patch: &GoogleAdsCampaignPatch,
    ) -> Result<GoogleAdsCampaign, AppError> {
        // Parent must exist; surfaces a 404 instead of a foreign-key error
        self.fetch_campaign(campaign_id).await?;

        let shadow = sqlx::query_as::<_, GoogleAdsCampaign>(&format!(
            r#"
            INSERT INTO google_ads_campaigns (
                campaign_id, customer_id, budget_resource_name, bidding_strategy_resource_name,
                campaign_resource_name, ad_group_resource_names, ad_group_ad_resource_names,
                daily_budget, target_roas, keywords_added_to_ad_groups,
                geotargeting_added_to_campaign, all_steps_completed
            )
            VALUES (
                $1, $2, $3, $4, $5, COALESCE($6, '{{}}'), COALESCE($7, '{{}}'), $8, $9,
                COALESCE($10, FALSE), COALESCE($11, FALSE), COALESCE($12, FALSE)
            )
            ON CONFLICT (campaign_id) DO UPDATE SET
                customer_id = COALESCE($2, google_ads_campaigns.customer_id),
                budget_resource_name = COALESCE($3, google_ads_campaigns.budget_resource_name),
                bidding_strategy_resource_name = COALESCE($4, google_ads_campaigns.bidding_strategy_resource_name),
                campaign_resource_name = COALESCE($5, google_ads_campaigns.campaign_resource_name),
                ad_group_resource_names = COALESCE($6, google_ads_campaigns.ad_group_resource_names),
                ad_group_ad_resource_names = COALESCE($7, google_ads_campaigns.ad_group_ad_resource_names),
                daily_budget = COALESCE($8, google_ads_campaigns.daily_budget),
                target_roas = COALESCE($9, google_ads_campaigns.target_roas),
                keywords_added_to_ad_groups = COALESCE($10, google_ads_campaigns.keywords_added_to_ad_groups),
                geotargeting_added_to_campaign = COALESCE($11, google_ads_campaigns.geotargeting_added_to_campaign),
                all_steps_completed = COALESCE($12, google_ads_campaigns.all_steps_completed),
                updated_at = NOW()
            RETURNING {}
            "#,
            SHADOW_COLUMNS
        ))
        .bind(campaign_id)
        .bind(&patch.customer_id)
        .bind(&patch.budget_resource_name)
        .bind(&patch.bidding_strategy_resource_name)
        .bind(&patch.campaign_resource_name)
        .bind(&patch.ad_group_resource_names)
        .bind(&patch.ad_group_ad_resource_names)
        .bind(patch.daily_budget)
        .bind(patch.target_roas)
        .bind(patch.keywords_added_to_ad_groups)
        .bind(patch.geotargeting_added_to_campaign)
        .bind(patch.all_steps_completed)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert Google Ads campaign progress")?;

        Ok(shadow)
    }
}
