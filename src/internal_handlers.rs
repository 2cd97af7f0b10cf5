//! Service-to-service routes under `/internal`.
//!
//! Guarded by `x-api-key`, except the status callback which uses the
//! `Internal <token>` scheme.

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{InternalApiKey, InternalToken};
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{
    Business, Campaign, GoogleAdsCampaign, GoogleAdsCampaignPatch, GoogleAdsIntegration, Platform,
    UpdateStatusRequest,
};

pub fn internal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/internal/campaign/:id", get(get_campaign))
        .route("/internal/campaign/:id/status", patch(update_campaign_status))
        .route(
            "/internal/campaign/:id/platforms/:platform/launched",
            post(report_platform_launched),
        )
        .route("/internal/business/:id", get(get_business))
        .route(
            "/internal/business/:id/google-ads",
            post(save_google_ads_integration),
        )
        .route(
            "/internal/google-ads-campaign/:campaign_id",
            get(get_google_ads_campaign).patch(patch_google_ads_campaign),
        )
}

pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    _key: InternalApiKey,
    Path(id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    Ok(Json(state.orchestrator.find_campaign(id).await?))
}

pub async fn get_business(
    State(state): State<Arc<AppState>>,
    _key: InternalApiKey,
    Path(id): Path<Uuid>,
) -> Result<Json<Business>, AppError> {
    Ok(Json(state.orchestrator.find_business(id).await?))
}

/// POST /internal/business/:id/google-ads
///
/// Stores the ad-account integration once; a second call is a 409.
pub async fn save_google_ads_integration(
    State(state): State<Arc<AppState>>,
    _key: InternalApiKey,
    Path(id): Path<Uuid>,
    Json(integration): Json<GoogleAdsIntegration>,
) -> Result<Json<Business>, AppError> {
    tracing::info!(
        "Linking business {} to Google Ads customer {}",
        id,
        integration.customer_id
    );
    let business = state
        .businesses
        .set_google_ads_integration(id, &integration)
        .await?;
    Ok(Json(business))
}

pub async fn get_google_ads_campaign(
    State(state): State<Arc<AppState>>,
    _key: InternalApiKey,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<GoogleAdsCampaign>, AppError> {
    state
        .google_ads_campaigns
        .find(campaign_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("Google Ads campaign {} not found", campaign_id))
        })
}

/// PATCH /internal/google-ads-campaign/:campaignId
///
/// Merges launch progress into the shadow record, creating it on first use.
pub async fn patch_google_ads_campaign(
    State(state): State<Arc<AppState>>,
    _key: InternalApiKey,
    Path(campaign_id): Path<Uuid>,
    Json(patch): Json<GoogleAdsCampaignPatch>,
) -> Result<Json<GoogleAdsCampaign>, AppError> {
    tracing::debug!("Google Ads progress for {}: {:?}", campaign_id, patch);
    let shadow = state
        .google_ads_campaigns
        .upsert(campaign_id, &patch)
        .await?;
    Ok(Json(shadow))
}

pub async fn report_platform_launched(
    State(state): State<Arc<AppState>>,
    _key: InternalApiKey,
    Path((id, platform)): Path<(Uuid, String)>,
) -> Result<Json<Campaign>, AppError> {
    let platform = Platform::parse(&platform)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown platform: {}", platform)))?;

    let campaign = state
        .orchestrator
        .record_platform_launched(id, platform)
        .await?;
    Ok(Json(campaign))
}

/// PATCH /internal/campaign/:id/status
pub async fn update_campaign_status(
    State(state): State<Arc<AppState>>,
    _token: InternalToken,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = state.orchestrator.set_status(id, payload.status).await?;
    Ok(Json(campaign))
}
