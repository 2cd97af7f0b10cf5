//! Google Ads launch steps for one campaign.
//!
//! Every creation step first looks the resource up by its deterministic name, so a
//! redelivered message re-derives what already exists instead of duplicating it.
//! Progress is written to the shadow record after each step; keyword and geo
//! steps are skipped once their flag is set there.

use chrono::Utc;
use std::future::Future;
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::google_ads_client::GoogleAdsClient;
use crate::internal_client::InternalApiClient;
use crate::models::{
    Business, Campaign, GoogleAdsCampaign, GoogleAdsCampaignPatch, GoogleAdsIntegration, Platform,
};
use crate::planning::{self, to_micros};

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_TIME_ZONE: &str = "America/New_York";

/// Single ad group per campaign.
const AD_GROUP_COUNT: usize = 1;

pub struct GoogleAdsWorker {
    internal: InternalApiClient,
    ads: GoogleAdsClient,
}

impl GoogleAdsWorker {
    pub fn new(internal: InternalApiClient, ads: GoogleAdsClient) -> Self {
        Self { internal, ads }
    }

    /// Runs every launch step for the campaign.
    pub async fn process(&self, campaign_id: Uuid) -> Result<(), AppError> {
        tracing::info!("🚀 Google Ads launch started for campaign {}", campaign_id);

        // Step 1: campaign and business
        let campaign = self
            .internal
            .get_campaign(campaign_id)
            .await
            .context("Loading campaign")?;
        let business = self
            .internal
            .get_business(campaign.business_id)
            .await
            .context("Loading business")?;

        // Step 2: ad account
        let integration = self.ensure_ad_account(&business).await?;
        let customer_id = integration.customer_id.as_str();

        let mut shadow = self
            .internal
            .get_google_ads_campaign(campaign_id)
            .await?
            .unwrap_or_else(|| GoogleAdsCampaign {
                campaign_id,
                ..Default::default()
            });

        if shadow.all_steps_completed {
            tracing::info!(
                "Campaign {} already launched on Google Ads, re-reporting completion",
                campaign_id
            );
            self.internal
                .report_platform_launched(campaign_id, Platform::Google)
                .await?;
            return Ok(());
        }

        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                customer_id: Some(customer_id.to_string()),
                ..Default::default()
            },
        )
        .await?;

        // Steps 3 and 4: budget and bidding figures
        let daily_budget = planning::daily_budget(
            campaign.total_budget,
            campaign.start_date,
            campaign.end_date,
            Utc::now(),
        )?;
        let reported_roas = self
            .internal
            .get_reported_roas(business.id, campaign.id)
            .await?;
        let target_roas = planning::target_roas(reported_roas);
        let (cpc_floor, cpc_ceiling) = planning::cpc_bid_bounds(daily_budget);

        tracing::info!(
            "Campaign {}: daily budget {:.2}, target ROAS {}, CPC {}..{}",
            campaign_id,
            daily_budget,
            target_roas,
            cpc_floor,
            cpc_ceiling
        );

        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                daily_budget: Some(daily_budget),
                target_roas: Some(target_roas),
                ..Default::default()
            },
        )
        .await?;

        // Step 5: budget, bidding strategy, campaign, ad group, ads
        let budget_name = planning::budget_name(campaign_id);
        let budget = self
            .create_or_get(
                customer_id,
                "campaign_budget",
                "campaign_budget.name",
                &budget_name,
                self.ads
                    .create_campaign_budget(customer_id, &budget_name, to_micros(daily_budget)),
            )
            .await?;
        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                budget_resource_name: Some(budget.clone()),
                ..Default::default()
            },
        )
        .await?;

        let strategy_name = planning::bidding_strategy_name(campaign_id);
        let strategy = self
            .create_or_get(
                customer_id,
                "bidding_strategy",
                "bidding_strategy.name",
                &strategy_name,
                self.ads.create_bidding_strategy(
                    customer_id,
                    &strategy_name,
                    target_roas,
                    to_micros(cpc_floor),
                    to_micros(cpc_ceiling),
                ),
            )
            .await?;
        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                bidding_strategy_resource_name: Some(strategy.clone()),
                ..Default::default()
            },
        )
        .await?;

        let campaign_name = planning::campaign_name(campaign_id);
        let ads_campaign = self
            .create_or_get(
                customer_id,
                "campaign",
                "campaign.name",
                &campaign_name,
                self.ads.create_campaign(
                    customer_id,
                    &campaign_name,
                    &budget,
                    &strategy,
                    campaign.start_date,
                    campaign.end_date,
                ),
            )
            .await?;
        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                campaign_resource_name: Some(ads_campaign.clone()),
                ..Default::default()
            },
        )
        .await?;

        let mut ad_groups = Vec::with_capacity(AD_GROUP_COUNT);
        for index in 0..AD_GROUP_COUNT {
            let name = planning::ad_group_name(campaign_id, index);
            let ad_group = self
                .create_or_get(
                    customer_id,
                    "ad_group",
                    "ad_group.name",
                    &name,
                    self.ads.create_ad_group(customer_id, &ads_campaign, &name),
                )
                .await?;
            ad_groups.push(ad_group);
        }
        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                ad_group_resource_names: Some(ad_groups.clone()),
                ..Default::default()
            },
        )
        .await?;

        let ads = self
            .create_ads(customer_id, &campaign, &business, &ad_groups)
            .await?;
        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                ad_group_ad_resource_names: Some(ads),
                ..Default::default()
            },
        )
        .await?;

        // Step 6: keywords
        if shadow.keywords_added_to_ad_groups {
            tracing::debug!("Keywords already added for campaign {}", campaign_id);
        } else {
            self.add_keywords(customer_id, &business, &ad_groups).await?;
            self.checkpoint(
                &mut shadow,
                GoogleAdsCampaignPatch {
                    keywords_added_to_ad_groups: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        }

        // Step 7: geo targeting
        if shadow.geotargeting_added_to_campaign {
            tracing::debug!("Geo targeting already added for campaign {}", campaign_id);
        } else {
            self.add_geo_targeting(customer_id, &campaign, &ads_campaign)
                .await?;
            self.checkpoint(
                &mut shadow,
                GoogleAdsCampaignPatch {
                    geotargeting_added_to_campaign: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        }

        self.checkpoint(
            &mut shadow,
            GoogleAdsCampaignPatch {
                all_steps_completed: Some(true),
                ..Default::default()
            },
        )
        .await?;

        self.internal
            .report_platform_launched(campaign_id, Platform::Google)
            .await?;

        tracing::info!("✅ Google Ads launch completed for campaign {}", campaign_id);
        Ok(())
    }

    /// Creates the ad account, its conversion action and tracking tag, and stores them
    /// on the business. Reuses the stored account when present.
    async fn ensure_ad_account(&self, business: &Business) -> Result<GoogleAdsIntegration, AppError> {
        if let Some(existing) = &business.google_ads {
            return Ok(existing.clone());
        }

        tracing::info!("Provisioning Google Ads account for business {}", business.id);

        let customer_id = self
            .ads
            .create_customer_client(&business.name, DEFAULT_CURRENCY, DEFAULT_TIME_ZONE)
            .await?;
        let conversion_action = self
            .ads
            .create_conversion_action(&customer_id, &format!("{} purchases", business.name))
            .await?;

        let snippets = self
            .ads
            .get_tag_snippets(&customer_id, &conversion_action)
            .await?;
        let snippet = snippets
            .iter()
            .filter(|s| s.event_snippet.is_some())
            .max_by_key(|s| s.page_format.as_deref() == Some("HTML"))
            .ok_or_else(|| {
                AppError::ExternalApiError(format!(
                    "Conversion action {} has no event snippet",
                    conversion_action
                ))
            })?;

        let event_snippet = snippet.event_snippet.clone().unwrap_or_default();
        let (conversion_tag, conversion_label) = planning::parse_conversion_tag(&event_snippet)
            .ok_or_else(|| {
                AppError::ExternalApiError(
                    "Could not find conversion tag and label in event snippet".to_string(),
                )
            })?;

        let integration = GoogleAdsIntegration {
            customer_id,
            conversion_action_resource_name: conversion_action,
            conversion_tag,
            conversion_label,
            global_site_tag: snippet.global_site_tag.clone(),
            event_snippet: Some(event_snippet),
        };

        self.internal
            .save_google_ads_integration(business.id, &integration)
            .await
            .context("Saving Google Ads account on business")?;

        tracing::info!(
            "✓ Business {} linked to Google Ads customer {}",
            business.id,
            integration.customer_id
        );
        Ok(integration)
    }

    /// Returns the existing resource with `name`, or runs `create`.
    ///
    /// `create` is only polled when the lookup finds nothing.
    async fn create_or_get<F>(
        &self,
        customer_id: &str,
        resource: &str,
        name_field: &str,
        name: &str,
        create: F,
    ) -> Result<String, AppError>
    where
        F: Future<Output = Result<String, AppError>>,
    {
        if let Some(existing) = self
            .ads
            .find_resource_by_name(customer_id, resource, name_field, name)
            .await?
        {
            tracing::info!("↺ Reusing {} '{}': {}", resource, name, existing);
            return Ok(existing);
        }

        let created = create.await?;
        tracing::info!("✓ Created {} '{}': {}", resource, name, created);
        Ok(created)
    }

    async fn create_ads(
        &self,
        customer_id: &str,
        campaign: &Campaign,
        business: &Business,
        ad_groups: &[String],
    ) -> Result<Vec<String>, AppError> {
        let Some(ad_group) = ad_groups.first() else {
            return Ok(Vec::new());
        };
        let storefront = business.storefront_url();

        let mut ads = Vec::with_capacity(campaign.products.len());
        for (index, product) in campaign.products.iter().enumerate() {
            let final_url = product
                .url
                .clone()
                .or_else(|| storefront.clone())
                .ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "Product '{}' has no landing page and the business has no storefront",
                        product.title
                    ))
                })?;

            let name = planning::ad_name(campaign.id, index);
            let copy = planning::build_ad_copy(product, &business.name);
            let ad = self
                .create_or_get(
                    customer_id,
                    "ad_group_ad",
                    "ad_group_ad.ad.name",
                    &name,
                    self.ads
                        .create_ad_group_ad(customer_id, ad_group, &name, &copy, &final_url),
                )
                .await?;
            ads.push(ad);
        }
        Ok(ads)
    }

    async fn add_keywords(
        &self,
        customer_id: &str,
        business: &Business,
        ad_groups: &[String],
    ) -> Result<(), AppError> {
        let url = business.storefront_url().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Business {} has no connected storefront to seed keywords",
                business.id
            ))
        })?;

        let keywords = self.ads.generate_keyword_ideas(customer_id, &url).await?;
        if keywords.is_empty() {
            tracing::warn!("No keyword ideas returned for {}", url);
        }

        let assignments = planning::assign_keywords_round_robin(&keywords, ad_groups.len());
        for (ad_group, group_keywords) in ad_groups.iter().zip(assignments.iter()) {
            let criteria = self
                .ads
                .add_keywords(customer_id, ad_group, group_keywords)
                .await?;
            tracing::info!("✓ {} keyword criteria added to {}", criteria.len(), ad_group);
        }
        Ok(())
    }

    async fn add_geo_targeting(
        &self,
        customer_id: &str,
        campaign: &Campaign,
        ads_campaign: &str,
    ) -> Result<(), AppError> {
        let buckets = planning::bucket_locations(&campaign.target_locations);

        for (country, locations) in &buckets {
            let names = planning::location_names(locations);
            let targets = self
                .ads
                .geo_targets_for_country(customer_id, country, &names)
                .await?;

            if targets.is_empty() {
                tracing::warn!("No geo targets resolved for country {}", country);
                continue;
            }

            self.ads
                .add_location_targets(customer_id, ads_campaign, &targets)
                .await?;
            tracing::info!("✓ {} location target(s) added for {}", targets.len(), country);
        }
        Ok(())
    }

    async fn checkpoint(
        &self,
        shadow: &mut GoogleAdsCampaign,
        patch: GoogleAdsCampaignPatch,
    ) -> Result<(), AppError> {
        *shadow = self
            .internal
            .patch_google_ads_campaign(shadow.campaign_id, &patch)
            .await
            .context("Saving Google Ads progress")?;
        Ok(())
    }
}
