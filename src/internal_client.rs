use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Business, Campaign, GoogleAdsCampaign, GoogleAdsCampaignPatch, GoogleAdsIntegration, Platform};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoasResponse {
    roas: f64,
}

/// Worker-side client for the API's `/internal/*` routes and the business-rules service.
#[derive(Clone)]
pub struct InternalApiClient {
    client: reqwest::Client,
    base_url: String,
    business_rules_url: String,
    api_key: String,
}

impl InternalApiClient {
    pub fn new(
        base_url: String,
        business_rules_url: String,
        api_key: String,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create internal API client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            business_rules_url: business_rules_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Converts a non-success response into the matching domain error.
    async fn error_for(response: reqwest::Response, what: &str) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => AppError::NotFound(format!("{} not found", what)),
            409 => AppError::Conflict(format!("{}: {}", what, body)),
            code => AppError::Upstream {
                status: code,
                message: format!("{} request failed: {}", what, body),
            },
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, AppError> {
        let response = self
            .client
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, what).await);
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} response: {}", what, e))
        })
    }

    pub async fn get_campaign(&self, campaign_id: Uuid) -> Result<Campaign, AppError> {
        self.get_json(
            &format!("{}/internal/campaign/{}", self.base_url, campaign_id),
            "Campaign",
        )
        .await
    }

    pub async fn get_business(&self, business_id: Uuid) -> Result<Business, AppError> {
        self.get_json(
            &format!("{}/internal/business/{}", self.base_url, business_id),
            "Business",
        )
        .await
    }

    /// Persists the ad-account integration; a second call for the same business is a `Conflict`.
    pub async fn save_google_ads_integration(
        &self,
        business_id: Uuid,
        integration: &GoogleAdsIntegration,
    ) -> Result<Business, AppError> {
        let response = self
            .client
            .post(format!(
                "{}/internal/business/{}/google-ads",
                self.base_url, business_id
            ))
            .header("x-api-key", &self.api_key)
            .json(integration)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "Google Ads integration").await);
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse business response: {}", e))
        })
    }

    pub async fn get_google_ads_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<GoogleAdsCampaign>, AppError> {
        match self
            .get_json(
                &format!("{}/internal/google-ads-campaign/{}", self.base_url, campaign_id),
                "Google Ads campaign",
            )
            .await
        {
            Ok(shadow) => Ok(Some(shadow)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn patch_google_ads_campaign(
        &self,
        campaign_id: Uuid,
        patch: &GoogleAdsCampaignPatch,
    ) -> Result<GoogleAdsCampaign, AppError> {
        let response = self
            .client
            .patch(format!(
                "{}/internal/google-ads-campaign/{}",
                self.base_url, campaign_id
            ))
            .header("x-api-key", &self.api_key)
            .json(patch)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "Google Ads campaign").await);
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse shadow record: {}", e))
        })
    }

    pub async fn report_platform_launched(
        &self,
        campaign_id: Uuid,
        platform: Platform,
    ) -> Result<Campaign, AppError> {
        let response = self
            .client
            .post(format!(
                "{}/internal/campaign/{}/platforms/{}/launched",
                self.base_url, campaign_id, platform
            ))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, "Campaign").await);
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse campaign response: {}", e))
        })
    }

    /// ROAS the business rules service reports for a campaign.
    pub async fn get_reported_roas(
        &self,
        business_id: Uuid,
        campaign_id: Uuid,
    ) -> Result<f64, AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/internal/business-rules/roas", self.business_rules_url),
            &[
                ("businessId", business_id.to_string()),
                ("campaignId", campaign_id.to_string()),
            ],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;

        let response: RoasResponse = self.get_json(url.as_str(), "Business rules").await?;
        if !response.roas.is_finite() || response.roas <= 0.0 {
            return Err(AppError::ExternalApiError(format!(
                "Business rules returned invalid ROAS {}",
                response.roas
            )));
        }
        Ok(response.roas)
    }
}
