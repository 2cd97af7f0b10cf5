/// Wallet client tests against a mocked wallet service.
use campaign_api::errors::AppError;
use campaign_api::wallet_client::{
    DebitRequest, WalletClient, WalletService, INSUFFICIENT_FUNDS_MESSAGE,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn debit_request() -> DebitRequest {
    DebitRequest {
        user_id: "user-1".to_string(),
        amount_in_cents: 12_345,
        idempotency_key: "8d6f8a4e-4b1c-4a57-9d0c-3f1b2c7e9a10".to_string(),
        description: None,
    }
}

fn client(server: &MockServer) -> WalletClient {
    WalletClient::new(server.uri(), "wallet-key".to_string()).unwrap()
}

#[tokio::test]
async fn test_subscription_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/subscriptions/user-1"))
        .and(header("x-api-key", "wallet-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "planTier": "growth", "campaignLimit": 10 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let details = client(&server)
        .get_subscription_details("user-1")
        .await
        .unwrap();

    assert_eq!(details.plan_tier, "growth");
    assert_eq!(details.campaign_limit, 10);
}

#[tokio::test]
async fn test_subscription_failure_surfaces_as_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/subscriptions/user-1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
        .mount(&server)
        .await;

    let err = client(&server)
        .get_subscription_details("user-1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ExternalApiError(msg) if msg.contains("no such user")));
}

#[tokio::test]
async fn test_debit_sends_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/internal/wallet/debit"))
        .and(header("x-api-key", "wallet-key"))
        .and(body_partial_json(json!({
            "userId": "user-1",
            "amountInCents": 12345,
            "idempotencyKey": "8d6f8a4e-4b1c-4a57-9d0c-3f1b2c7e9a10"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "transactionId": "tx-1", "remainingBalance": 76.55 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .debit_for_campaign(&debit_request())
        .await
        .unwrap();

    assert_eq!(result.transaction_id, "tx-1");
    assert_eq!(result.remaining_balance, 76.55);
}

#[tokio::test]
async fn test_insufficient_funds_is_402_for_any_remote_status() {
    for status in [400, 402, 422, 500] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/internal/wallet/debit"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "code": "INSUFFICIENT_FUNDS",
                "message": "Balance too low"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .debit_for_campaign(&debit_request())
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 402, "remote status {}", status);
        assert!(matches!(err, AppError::PaymentRequired(ref msg) if msg == INSUFFICIENT_FUNDS_MESSAGE));
    }
}

#[tokio::test]
async fn test_other_wallet_errors_keep_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/internal/wallet/debit"))
        .respond_with(ResponseTemplate::new(423).set_body_json(json!({
            "code": "WALLET_LOCKED",
            "message": "Wallet is locked"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .debit_for_campaign(&debit_request())
        .await
        .unwrap_err();

    assert_eq!(err.status_code().as_u16(), 423);
    assert_eq!(err.to_string(), "Upstream error (423): Wallet is locked");
}

#[tokio::test]
async fn test_unparseable_debit_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/internal/wallet/debit"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
        .mount(&server)
        .await;

    let err = client(&server)
        .debit_for_campaign(&debit_request())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExternalApiError(_)));
    assert_eq!(err.status_code().as_u16(), 502);
}

#[tokio::test]
async fn test_breaker_ignores_business_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/internal/wallet/debit"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(json!({ "code": "INSUFFICIENT_FUNDS" })),
        )
        .expect(8)
        .mount(&server)
        .await;

    let client = client(&server);
    // More rejections than the breaker's failure threshold; every call still reaches the wallet
    for _ in 0..8 {
        let err = client
            .debit_for_campaign(&debit_request())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentRequired(_)));
    }
}
