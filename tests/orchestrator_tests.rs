/// Campaign orchestration tests with in-memory stores, wallet and queue.
mod common;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use campaign_api::ad_platforms::{AdPlatform, AdPlatformRegistry, MetaAdsPlatform};
use campaign_api::errors::AppError;
use campaign_api::models::{Campaign, CampaignStatus, Platform, UpdateCampaignRequest};
use campaign_api::orchestrator::CampaignOrchestrator;
use common::{campaign, create_request, FakeQueue, FakeWallet, MemoryStore};

const OWNER: &str = "user-1";

/// Ad platform double counting calls.
#[derive(Default)]
struct RecordingPlatform {
    calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl AdPlatform for RecordingPlatform {
    async fn pause(&self, _campaign: &Campaign) -> Result<(), AppError> {
        self.calls.lock().unwrap().push("pause");
        Ok(())
    }

    async fn resume(&self, _campaign: &Campaign) -> Result<(), AppError> {
        self.calls.lock().unwrap().push("resume");
        Ok(())
    }

    async fn get_campaign_data(&self, _campaign: &Campaign) -> Result<Value, AppError> {
        Ok(json!({ "clicks": 12 }))
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    wallet: Arc<FakeWallet>,
    queue: Arc<FakeQueue>,
    google: Arc<RecordingPlatform>,
    orchestrator: CampaignOrchestrator,
    business_id: uuid::Uuid,
}

fn harness_with(wallet: FakeWallet, queue: FakeQueue) -> Harness {
    let (store, business_id) = MemoryStore::with_business(OWNER);
    let store = Arc::new(store);
    let wallet = Arc::new(wallet);
    let queue = Arc::new(queue);
    let google = Arc::new(RecordingPlatform::default());

    let registry = AdPlatformRegistry::new()
        .register(Platform::Google, google.clone())
        .register(Platform::Facebook, Arc::new(MetaAdsPlatform))
        .register(Platform::Instagram, Arc::new(MetaAdsPlatform));

    let orchestrator = CampaignOrchestrator::new(
        store.clone(),
        store.clone(),
        wallet.clone(),
        queue.clone(),
        registry,
    );

    Harness {
        store,
        wallet,
        queue,
        google,
        orchestrator,
        business_id,
    }
}

fn harness() -> Harness {
    harness_with(FakeWallet::new(5, 1_000_000), FakeQueue::default())
}

#[tokio::test]
async fn test_create_campaign_debits_stores_and_publishes() {
    let h = harness();
    let request = create_request(
        h.business_id,
        vec![Platform::Google, Platform::Facebook, Platform::Google],
        123.45,
    );

    let campaign = h
        .orchestrator
        .create_campaign(OWNER, request)
        .await
        .unwrap();

    assert_eq!(campaign.status, CampaignStatus::ReadyToLaunch);
    assert_eq!(campaign.platforms, vec![Platform::Facebook, Platform::Google]);
    assert_eq!(h.store.campaign_count(), 1);

    let debits = h.wallet.debits.lock().unwrap();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].amount_in_cents, 12_345);
    assert_eq!(debits[0].idempotency_key, campaign.id.to_string());
    assert_eq!(debits[0].user_id, OWNER);

    let published = h.queue.published.lock().unwrap();
    assert_eq!(published.len(), 2);
    assert!(published.iter().all(|(_, m)| m.campaign_id == campaign.id));
}

#[tokio::test]
async fn test_limit_reached_never_debits_or_inserts() {
    let h = harness_with(FakeWallet::new(1, 1_000_000), FakeQueue::default());
    h.store.put_campaign(campaign(
        OWNER,
        h.business_id,
        vec![Platform::Google],
        CampaignStatus::Live,
    ));

    let err = h
        .orchestrator
        .create_campaign(OWNER, create_request(h.business_id, vec![Platform::Google], 50.0))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), AppError::Forbidden(msg) if msg.contains("Campaign limit exceeded")));
    assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    assert_eq!(h.wallet.debit_count(), 0);
    assert_eq!(h.store.campaign_count(), 1);
    assert!(h.queue.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_insufficient_funds_is_payment_required_and_not_stored() {
    let h = harness_with(FakeWallet::new(5, 100), FakeQueue::default());

    let err = h
        .orchestrator
        .create_campaign(OWNER, create_request(h.business_id, vec![Platform::Google], 50.0))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), axum::http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(h.store.campaign_count(), 0);
    assert!(h.queue.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_failure_keeps_campaign_and_marks_it_failed() {
    let h = harness_with(
        FakeWallet::new(5, 1_000_000),
        FakeQueue {
            failing: vec![Platform::Facebook],
            ..Default::default()
        },
    );

    let err = h
        .orchestrator
        .create_campaign(
            OWNER,
            create_request(h.business_id, vec![Platform::Google, Platform::Facebook], 80.0),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InternalError(_)));

    // Debit and insert are not rolled back
    assert_eq!(h.wallet.debit_count(), 1);
    let stored: Vec<Campaign> = h.store.campaigns.lock().unwrap().values().cloned().collect();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, CampaignStatus::FailedToLaunch);
}

#[tokio::test]
async fn test_other_users_business_is_forbidden() {
    let h = harness();

    let err = h
        .orchestrator
        .create_campaign(
            "someone-else",
            create_request(h.business_id, vec![Platform::Google], 10.0),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(*h.wallet.subscription_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_invalid_payload_is_rejected_before_wallet() {
    let h = harness();
    let mut request = create_request(h.business_id, vec![], 10.0);
    request.name = "Nameless".to_string();

    let err = h
        .orchestrator
        .create_campaign(OWNER, request)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(*h.wallet.subscription_calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_past_start_date_is_rejected_before_debit() {
    let h = harness();
    let mut request = create_request(h.business_id, vec![Platform::Google], 60.0);
    request.start_date = Utc::now() - Duration::days(3);
    request.end_date = Utc::now() + Duration::days(3);

    let err = h
        .orchestrator
        .create_campaign(OWNER, request)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("in the past")));
    assert_eq!(h.wallet.debit_count(), 0);
    assert_eq!(h.store.campaign_count(), 0);
    assert!(h.queue.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_campaign_checks_owner() {
    let h = harness();
    let stored = campaign(OWNER, h.business_id, vec![Platform::Google], CampaignStatus::Live);
    let id = stored.id;
    h.store.put_campaign(stored);

    assert!(h.orchestrator.get_campaign(OWNER, id).await.is_ok());
    assert!(matches!(
        h.orchestrator.get_campaign("intruder", id).await.unwrap_err(),
        AppError::Forbidden(_)
    ));
    assert!(matches!(
        h.orchestrator
            .get_campaign(OWNER, uuid::Uuid::new_v4())
            .await
            .unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_update_rejects_reschedule_while_live() {
    let h = harness();
    let stored = campaign(OWNER, h.business_id, vec![Platform::Google], CampaignStatus::Live);
    let id = stored.id;
    let new_end = stored.end_date + Duration::days(3);
    h.store.put_campaign(stored);

    let err = h
        .orchestrator
        .update_campaign(
            OWNER,
            id,
            UpdateCampaignRequest {
                end_date: Some(new_end),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let renamed = h
        .orchestrator
        .update_campaign(
            OWNER,
            id,
            UpdateCampaignRequest {
                name: Some("  Renamed  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Renamed");
}

#[tokio::test]
async fn test_update_rejects_pipeline_status() {
    let h = harness();
    let stored = campaign(OWNER, h.business_id, vec![Platform::Google], CampaignStatus::Draft);
    let id = stored.id;
    h.store.put_campaign(stored);

    let err = h
        .orchestrator
        .update_campaign(
            OWNER,
            id,
            UpdateCampaignRequest {
                status: Some(CampaignStatus::Live),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let archived = h
        .orchestrator
        .update_campaign(
            OWNER,
            id,
            UpdateCampaignRequest {
                status: Some(CampaignStatus::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(archived.status, CampaignStatus::Archived);
}

#[tokio::test]
async fn test_top_up_uses_fresh_idempotency_key() {
    let h = harness();
    let stored = campaign(OWNER, h.business_id, vec![Platform::Google], CampaignStatus::Live);
    let id = stored.id;
    h.store.put_campaign(stored);

    let response = h.orchestrator.top_up(OWNER, id, 25.5).await.unwrap();

    assert_eq!(response.campaign.total_budget, 125.5);
    let debits = h.wallet.debits.lock().unwrap();
    assert_eq!(debits[0].amount_in_cents, 2_550);
    assert_ne!(debits[0].idempotency_key, id.to_string());
}

#[tokio::test]
async fn test_pause_and_resume_skip_unsupported_platforms() {
    let h = harness();
    let stored = campaign(
        OWNER,
        h.business_id,
        vec![Platform::Facebook, Platform::Google],
        CampaignStatus::Live,
    );
    let id = stored.id;
    h.store.put_campaign(stored);

    let paused = h.orchestrator.pause_campaign(OWNER, id).await.unwrap();
    assert_eq!(paused.status, CampaignStatus::Paused);

    let resumed = h.orchestrator.resume_campaign(OWNER, id).await.unwrap();
    assert_eq!(resumed.status, CampaignStatus::Live);

    assert_eq!(*h.google.calls.lock().unwrap(), vec!["pause", "resume"]);
}

#[tokio::test]
async fn test_pause_fails_when_no_platform_supports_it() {
    let h = harness();
    let stored = campaign(OWNER, h.business_id, vec![Platform::Instagram], CampaignStatus::Live);
    let id = stored.id;
    h.store.put_campaign(stored);

    let err = h.orchestrator.pause_campaign(OWNER, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotImplemented(_)));
}

#[tokio::test]
async fn test_platform_data_is_keyed_by_platform() {
    let h = harness();
    let stored = campaign(
        OWNER,
        h.business_id,
        vec![Platform::Facebook, Platform::Google],
        CampaignStatus::Live,
    );
    let id = stored.id;
    h.store.put_campaign(stored);

    let data = h.orchestrator.platform_data(OWNER, id).await.unwrap();
    assert_eq!(data["GOOGLE"]["clicks"], 12);
    assert_eq!(data["FACEBOOK"]["supported"], false);
}

#[tokio::test]
async fn test_campaign_goes_live_only_after_every_platform_reports() {
    let h = harness();
    let stored = campaign(
        OWNER,
        h.business_id,
        vec![Platform::Facebook, Platform::Google],
        CampaignStatus::ReadyToLaunch,
    );
    let id = stored.id;
    h.store.put_campaign(stored);

    let after_google = h
        .orchestrator
        .record_platform_launched(id, Platform::Google)
        .await
        .unwrap();
    assert_eq!(after_google.status, CampaignStatus::Launching);

    let after_both = h
        .orchestrator
        .record_platform_launched(id, Platform::Facebook)
        .await
        .unwrap();
    assert_eq!(after_both.status, CampaignStatus::Live);

    let err = h
        .orchestrator
        .record_platform_launched(id, Platform::Instagram)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_launch_report_keeps_owner_status() {
    let h = harness();

    for status in [CampaignStatus::Paused, CampaignStatus::Archived] {
        let stored = campaign(OWNER, h.business_id, vec![Platform::Google], status);
        let id = stored.id;
        h.store.put_campaign(stored);

        let reported = h
            .orchestrator
            .record_platform_launched(id, Platform::Google)
            .await
            .unwrap();
        assert_eq!(reported.status, status);
        assert_eq!(reported.launched_platforms, vec![Platform::Google]);
    }
}

#[tokio::test]
async fn test_redelivered_launch_report_keeps_campaign_live() {
    let h = harness();
    let stored = campaign(OWNER, h.business_id, vec![Platform::Google], CampaignStatus::FailedToLaunch);
    let id = stored.id;
    h.store.put_campaign(stored);

    for _ in 0..2 {
        let reported = h
            .orchestrator
            .record_platform_launched(id, Platform::Google)
            .await
            .unwrap();
        assert_eq!(reported.status, CampaignStatus::Live);
        assert_eq!(reported.launched_platforms, vec![Platform::Google]);
    }
}

#[tokio::test]
async fn test_business_creation_and_listing() {
    let h = harness();

    let created = h
        .orchestrator
        .create_business("user-2", " Second Shop ")
        .await
        .unwrap();
    assert_eq!(created.name, "Second Shop");

    let listed = h.orchestrator.list_businesses("user-2").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    assert!(h.orchestrator.create_business("user-2", "  ").await.is_err());
}
