use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{AuthKeys, AuthState, AuthUser};
use crate::db_storage::{BusinessStore, GoogleAdsCampaignStore};
use crate::errors::AppError;
use crate::models::{
    Business, Campaign, CreateBusinessRequest, CreateCampaignRequest, Product, TopUpRequest,
    TopUpResponse, UpdateCampaignRequest,
};
use crate::orchestrator::CampaignOrchestrator;
use crate::shopify_client::{ShopifyClient, StoreProfile};
use crate::store_profile_cache::StoreProfileCache;

/// Shared application state.
pub struct AppState {
    /// Campaign and business operations.
    pub orchestrator: CampaignOrchestrator,
    /// Business persistence, used directly by integration callbacks.
    pub businesses: Arc<dyn BusinessStore>,
    /// Google Ads progress records written by the launch worker.
    pub google_ads_campaigns: Arc<dyn GoogleAdsCampaignStore>,
    pub shopify: ShopifyClient,
    /// Store profiles by shop domain (bounded, expiring).
    pub store_profiles: StoreProfileCache,
    pub auth: AuthKeys,
}

impl AuthState for AppState {
    fn auth_keys(&self) -> &AuthKeys {
        &self.auth
    }
}

/// Routes for authenticated end users.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/campaign", post(create_campaign).get(list_campaigns))
        .route(
            "/campaign/:campaign_id",
            get(get_campaign).patch(update_campaign),
        )
        .route("/campaign/:campaign_id/top-up", post(top_up_campaign))
        .route("/campaign/:campaign_id/pause", post(pause_campaign))
        .route("/campaign/:campaign_id/resume", post(resume_campaign))
        .route(
            "/campaign/:campaign_id/platform-data",
            get(get_platform_data),
        )
        .route("/business", post(create_business).get(list_businesses))
        .route("/api/shopify/auth/url", post(shopify_auth_url))
        .route("/api/shopify/auth/callback", post(shopify_auth_callback))
        .route("/api/shopify/products", get(shopify_products))
        .route("/api/ad-library/store-profile", get(store_profile))
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "campaign-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /campaign
///
/// Creates a campaign: checks the plan's campaign limit, debits the wallet for the
/// full budget and queues one launch message per platform.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `user` - The authenticated owner.
/// * `payload` - The campaign definition.
///
/// # Returns
///
/// * `Result<(StatusCode, Json<Campaign>), AppError>` - 201 with the stored campaign, 403 when
///   the limit is reached, 402 when the wallet balance is insufficient.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), AppError> {
    tracing::info!(
        "POST /campaign by {} for business {} on {:?}",
        user.user_id,
        payload.business_id,
        payload.platforms
    );

    let campaign = state
        .orchestrator
        .create_campaign(&user.user_id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Campaign>>, AppError> {
    let campaigns = state.orchestrator.list_campaigns(&user.user_id).await?;
    Ok(Json(campaigns))
}

/// GET /campaign/:campaignId
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = state
        .orchestrator
        .get_campaign(&user.user_id, campaign_id)
        .await?;
    Ok(Json(campaign))
}

/// PATCH /campaign/:id
///
/// Partial update of name, products, locations, schedule or an owner-settable status.
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> Result<Json<Campaign>, AppError> {
    tracing::info!("PATCH /campaign/{} by {}", campaign_id, user.user_id);

    let campaign = state
        .orchestrator
        .update_campaign(&user.user_id, campaign_id, payload)
        .await?;
    Ok(Json(campaign))
}

/// POST /campaign/:campaignId/top-up
pub async fn top_up_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<Uuid>,
    Json(payload): Json<TopUpRequest>,
) -> Result<Json<TopUpResponse>, AppError> {
    tracing::info!(
        "POST /campaign/{}/top-up by {} ({:.2})",
        campaign_id,
        user.user_id,
        payload.amount
    );

    let response = state
        .orchestrator
        .top_up(&user.user_id, campaign_id, payload.amount)
        .await?;
    Ok(Json(response))
}

pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = state
        .orchestrator
        .pause_campaign(&user.user_id, campaign_id)
        .await?;
    Ok(Json(campaign))
}

pub async fn resume_campaign(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Campaign>, AppError> {
    let campaign = state
        .orchestrator
        .resume_campaign(&user.user_id, campaign_id)
        .await?;
    Ok(Json(campaign))
}

/// GET /campaign/:campaignId/platform-data
///
/// Live data from every targeted platform, keyed by platform name.
pub async fn get_platform_data(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let data = state
        .orchestrator
        .platform_data(&user.user_id, campaign_id)
        .await?;
    Ok(Json(data))
}

pub async fn create_business(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<Business>), AppError> {
    let business = state
        .orchestrator
        .create_business(&user.user_id, &payload.name)
        .await?;
    Ok((StatusCode::CREATED, Json(business)))
}

pub async fn list_businesses(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Business>>, AppError> {
    let businesses = state.orchestrator.list_businesses(&user.user_id).await?;
    Ok(Json(businesses))
}

// ============ Shopify ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyAuthUrlRequest {
    pub shop: String,
    pub business_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ShopifyAuthUrlResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyCallbackRequest {
    pub shop: String,
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessQuery {
    pub business_id: Uuid,
}

/// POST /api/shopify/auth/url
///
/// Builds the Shopify install URL. The OAuth `state` binds the install to the
/// caller and the business.
pub async fn shopify_auth_url(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<ShopifyAuthUrlRequest>,
) -> Result<Json<ShopifyAuthUrlResponse>, AppError> {
    state
        .orchestrator
        .owned_business(&user.user_id, payload.business_id)
        .await?;

    let oauth_state = state
        .shopify
        .sign_state(&user.user_id, payload.business_id)?;
    let url = state.shopify.build_auth_url(&payload.shop, &oauth_state)?;

    Ok(Json(ShopifyAuthUrlResponse { url }))
}

/// POST /api/shopify/auth/callback
///
/// Completes the install: verifies `state`, exchanges the code and stores the
/// shop on the business.
pub async fn shopify_auth_callback(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<ShopifyCallbackRequest>,
) -> Result<Json<Business>, AppError> {
    let install = state.shopify.verify_state(&payload.state)?;
    if install.user_id != user.user_id {
        return Err(AppError::Forbidden(
            "OAuth state was issued to another user".to_string(),
        ));
    }
    state
        .orchestrator
        .owned_business(&user.user_id, install.business_id)
        .await?;

    let shop = crate::shopify_client::validate_shop_domain(&payload.shop)?;
    let access_token = state.shopify.exchange_code(&shop, &payload.code).await?;

    let business = state
        .businesses
        .set_shopify_account(install.business_id, &shop, &access_token)
        .await?;
    state.store_profiles.invalidate(&shop).await;

    tracing::info!("✓ Shop {} connected to business {}", shop, business.id);
    Ok(Json(business))
}

async fn connected_shop(
    state: &AppState,
    user: &AuthUser,
    business_id: Uuid,
) -> Result<(String, String), AppError> {
    let business = state
        .orchestrator
        .owned_business(&user.user_id, business_id)
        .await?;

    business
        .shopify
        .map(|s| (s.shop_domain, s.access_token))
        .ok_or_else(|| {
            AppError::BadRequest(format!("Business {} has no connected Shopify store", business_id))
        })
}

/// GET /api/shopify/products?businessId=
pub async fn shopify_products(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let (shop, token) = connected_shop(&state, &user, query.business_id).await?;

    let products = state
        .shopify
        .list_products(&shop, &token)
        .await?
        .iter()
        .map(|p| p.to_campaign_product(&shop))
        .collect();

    Ok(Json(products))
}

/// GET /api/ad-library/store-profile?businessId=
pub async fn store_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<StoreProfile>, AppError> {
    let (shop, token) = connected_shop(&state, &user, query.business_id).await?;

    let profile = state
        .store_profiles
        .get_or_fetch(&shop, state.shopify.get_shop(&shop, &token))
        .await?;

    Ok(Json(profile))
}
