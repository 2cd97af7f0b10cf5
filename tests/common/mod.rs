//! In-memory collaborators shared by integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use campaign_api::auth::Claims;
use campaign_api::db_storage::{BusinessStore, CampaignStore, GoogleAdsCampaignStore};
use campaign_api::errors::AppError;
use campaign_api::models::{
    aggregate_launch_status, Business, Campaign, CampaignStatus, CreateCampaignRequest,
    GoogleAdsCampaign, GoogleAdsCampaignPatch, GoogleAdsIntegration, Location, Platform, Product,
    ShopifyAccount, LaunchMessage,
};
use campaign_api::queue::QueueProducer;
use campaign_api::wallet_client::{
    DebitRequest, DebitResult, SubscriptionDetails, WalletService, INSUFFICIENT_FUNDS_MESSAGE,
};

#[derive(Default)]
pub struct MemoryStore {
    pub campaigns: Mutex<HashMap<Uuid, Campaign>>,
    pub businesses: Mutex<HashMap<Uuid, Business>>,
    pub shadows: Mutex<HashMap<Uuid, GoogleAdsCampaign>>,
    pub fail_insert: bool,
}

impl MemoryStore {
    pub fn with_business(owner_id: &str) -> (Self, Uuid) {
        let store = Self::default();
        let business = business(owner_id);
        let id = business.id;
        store.businesses.lock().unwrap().insert(id, business);
        (store, id)
    }

    pub fn campaign_count(&self) -> usize {
        self.campaigns.lock().unwrap().len()
    }

    pub fn put_campaign(&self, campaign: Campaign) {
        self.campaigns.lock().unwrap().insert(campaign.id, campaign);
    }
}

fn missing(id: Uuid) -> AppError {
    AppError::NotFound(format!("Campaign {} not found", id))
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn count_by_owner(&self, owner_id: &str) -> Result<i64, AppError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_id == owner_id)
            .count() as i64)
    }

    async fn insert(&self, campaign: &Campaign) -> Result<(), AppError> {
        if self.fail_insert {
            return Err(AppError::InternalError("insert failed".to_string()));
        }
        self.put_campaign(campaign.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        Ok(self.campaigns.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Campaign>, AppError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update(&self, campaign: &Campaign) -> Result<Campaign, AppError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        if !campaigns.contains_key(&campaign.id) {
            return Err(missing(campaign.id));
        }
        campaigns.insert(campaign.id, campaign.clone());
        Ok(campaign.clone())
    }

    async fn set_status(&self, id: Uuid, status: CampaignStatus) -> Result<Campaign, AppError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns.get_mut(&id).ok_or_else(|| missing(id))?;
        campaign.status = status;
        Ok(campaign.clone())
    }

    async fn add_budget(&self, id: Uuid, amount: f64) -> Result<Campaign, AppError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns.get_mut(&id).ok_or_else(|| missing(id))?;
        campaign.total_budget += amount;
        Ok(campaign.clone())
    }

    async fn mark_platform_launched(
        &self,
        id: Uuid,
        platform: Platform,
    ) -> Result<Campaign, AppError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let campaign = campaigns.get_mut(&id).ok_or_else(|| missing(id))?;
        if !campaign.launched_platforms.contains(&platform) {
            campaign.launched_platforms.push(platform);
        }
        campaign.status = aggregate_launch_status(
            campaign.status,
            &campaign.platforms,
            &campaign.launched_platforms,
        );
        Ok(campaign.clone())
    }
}

#[async_trait]
impl BusinessStore for MemoryStore {
    async fn insert(&self, business: &Business) -> Result<(), AppError> {
        self.businesses
            .lock()
            .unwrap()
            .insert(business.id, business.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Business>, AppError> {
        Ok(self.businesses.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Business>, AppError> {
        Ok(self
            .businesses
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn set_shopify_account(
        &self,
        id: Uuid,
        shop_domain: &str,
        access_token: &str,
    ) -> Result<Business, AppError> {
        let mut businesses = self.businesses.lock().unwrap();
        let business = businesses
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))?;
        business.shopify = Some(ShopifyAccount {
            shop_domain: shop_domain.to_string(),
            access_token: access_token.to_string(),
        });
        Ok(business.clone())
    }

    async fn set_google_ads_integration(
        &self,
        id: Uuid,
        integration: &GoogleAdsIntegration,
    ) -> Result<Business, AppError> {
        let mut businesses = self.businesses.lock().unwrap();
        let business = businesses
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Business {} not found", id)))?;
        if business.google_ads.is_some() {
            return Err(AppError::Conflict(format!(
                "Business {} already has a Google Ads account",
                id
            )));
        }
        business.google_ads = Some(integration.clone());
        Ok(business.clone())
    }
}

#[async_trait]
impl GoogleAdsCampaignStore for MemoryStore {
    async fn find(&self, campaign_id: Uuid) -> Result<Option<GoogleAdsCampaign>, AppError> {
        Ok(self.shadows.lock().unwrap().get(&campaign_id).cloned())
    }

    async fn upsert(
        &self,
        campaign_id: Uuid,
        patch: &GoogleAdsCampaignPatch,
    ) -> Result<GoogleAdsCampaign, AppError> {
        if !self.campaigns.lock().unwrap().contains_key(&campaign_id) {
            return Err(missing(campaign_id));
        }
        let mut shadows = self.shadows.lock().unwrap();
        let shadow = shadows.entry(campaign_id).or_insert_with(|| GoogleAdsCampaign {
            campaign_id,
            ..Default::default()
        });
        shadow.apply(patch);
        Ok(shadow.clone())
    }
}

/// Wallet double recording every debit.
pub struct FakeWallet {
    pub campaign_limit: i64,
    pub balance_cents: Mutex<i64>,
    pub debits: Mutex<Vec<DebitRequest>>,
    pub subscription_calls: Mutex<usize>,
}

impl FakeWallet {
    pub fn new(campaign_limit: i64, balance_cents: i64) -> Self {
        Self {
            campaign_limit,
            balance_cents: Mutex::new(balance_cents),
            debits: Mutex::new(Vec::new()),
            subscription_calls: Mutex::new(0),
        }
    }

    pub fn debit_count(&self) -> usize {
        self.debits.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletService for FakeWallet {
    async fn get_subscription_details(
        &self,
        _user_id: &str,
    ) -> Result<SubscriptionDetails, AppError> {
        *self.subscription_calls.lock().unwrap() += 1;
        Ok(SubscriptionDetails {
            plan_tier: "starter".to_string(),
            campaign_limit: self.campaign_limit,
        })
    }

    async fn debit_for_campaign(&self, request: &DebitRequest) -> Result<DebitResult, AppError> {
        self.debits.lock().unwrap().push(request.clone());
        let mut balance = self.balance_cents.lock().unwrap();
        if *balance < request.amount_in_cents {
            return Err(AppError::PaymentRequired(
                INSUFFICIENT_FUNDS_MESSAGE.to_string(),
            ));
        }
        *balance -= request.amount_in_cents;
        Ok(DebitResult {
            transaction_id: format!("tx-{}", request.idempotency_key),
            remaining_balance: *balance as f64 / 100.0,
        })
    }
}

/// Queue double; platforms listed in `failing` reject publishes.
#[derive(Default)]
pub struct FakeQueue {
    pub published: Mutex<Vec<(Platform, LaunchMessage)>>,
    pub failing: Vec<Platform>,
}

#[async_trait]
impl QueueProducer for FakeQueue {
    async fn publish(&self, platform: Platform, message: &LaunchMessage) -> Result<(), AppError> {
        if self.failing.contains(&platform) {
            return Err(AppError::InternalError(format!("{} queue unavailable", platform)));
        }
        self.published
            .lock()
            .unwrap()
            .push((platform, message.clone()));
        Ok(())
    }
}

pub fn business(owner_id: &str) -> Business {
    Business {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        name: "Acme Outdoors".to_string(),
        shopify: None,
        google_ads: None,
        created_at: Utc::now(),
    }
}

pub fn product(title: &str) -> Product {
    Product {
        title: title.to_string(),
        price: 49.0,
        description: Some("Lightweight and waterproof".to_string()),
        features: vec!["Waterproof".to_string()],
        images: vec![],
        creatives: vec![],
        url: None,
    }
}

pub fn create_request(business_id: Uuid, platforms: Vec<Platform>, budget: f64) -> CreateCampaignRequest {
    let start = Utc::now() + Duration::days(2);
    CreateCampaignRequest {
        business_id,
        name: "Summer launch".to_string(),
        platforms,
        products: vec![product("Trail Jacket")],
        target_locations: vec![Location {
            country: "USA".to_string(),
            state: Some("NY".to_string()),
            city: Some("New York".to_string()),
        }],
        total_budget: budget,
        start_date: start,
        end_date: start + Duration::days(9),
    }
}

/// A stored campaign with the given status.
pub fn campaign(owner_id: &str, business_id: Uuid, platforms: Vec<Platform>, status: CampaignStatus) -> Campaign {
    let start = Utc::now() + Duration::days(2);
    Campaign {
        id: Uuid::new_v4(),
        owner_id: owner_id.to_string(),
        business_id,
        name: "Stored campaign".to_string(),
        status,
        platforms,
        products: vec![product("Trail Jacket")],
        target_locations: vec![],
        total_budget: 100.0,
        start_date: start,
        end_date: start + Duration::days(9),
        launched_platforms: vec![],
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// HS256 token for `user_id`, signed the way the identity provider does.
pub fn create_token(user_id: &str, secret: &str, ttl: Duration) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: None,
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
