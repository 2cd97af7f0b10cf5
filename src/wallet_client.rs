use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::circuit_breaker::{create_wallet_circuit_breaker, WalletCircuitBreaker};
use crate::errors::AppError;

/// Message returned to clients when the wallet cannot cover a debit.
pub const INSUFFICIENT_FUNDS_MESSAGE: &str = "Insufficient wallet balance to fund this campaign";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub plan_tier: String,
    pub campaign_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitRequest {
    pub user_id: String,
    pub amount_in_cents: i64,
    /// Lets the wallet deduplicate retried debits.
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitResult {
    pub transaction_id: String,
    pub remaining_balance: f64,
}

#[derive(Debug, Deserialize)]
struct WalletErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Billing operations the orchestrator depends on.
#[async_trait]
pub trait WalletService: Send + Sync {
    async fn get_subscription_details(&self, user_id: &str)
        -> Result<SubscriptionDetails, AppError>;

    async fn debit_for_campaign(&self, request: &DebitRequest) -> Result<DebitResult, AppError>;
}

/// Maps a failed debit response to a domain error.
///
/// `INSUFFICIENT_FUNDS` always becomes a 402, whatever status the wallet used. Any
/// other coded body keeps the wallet's status and message. Bodies that are not a
/// wallet error document fall back to the raw transport failure.
pub fn map_debit_error(status: u16, body: &str) -> AppError {
    match serde_json::from_str::<WalletErrorBody>(body) {
        Ok(WalletErrorBody {
            code: Some(code), ..
        }) if code == "INSUFFICIENT_FUNDS" => {
            AppError::PaymentRequired(INSUFFICIENT_FUNDS_MESSAGE.to_string())
        }
        Ok(WalletErrorBody {
            code: Some(code),
            message,
        }) => AppError::Upstream {
            status,
            message: message.unwrap_or(code),
        },
        _ => AppError::ExternalApiError(format!(
            "Wallet debit failed with status {}: {}",
            status, body
        )),
    }
}

/// Whether a wallet error means the service itself is unhealthy.
fn counts_as_outage(error: &AppError) -> bool {
    match error {
        AppError::ExternalApiError(_) => true,
        AppError::Upstream { status, .. } => *status >= 500,
        _ => false,
    }
}

/// HTTP client for the wallet/billing microservice.
#[derive(Clone)]
pub struct WalletClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: WalletCircuitBreaker,
}

impl WalletClient {
    /// Creates a new `WalletClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the wallet service.
    /// * `api_key` - Service-to-service key sent as `x-api-key`.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create wallet client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            breaker: create_wallet_circuit_breaker(),
        })
    }

    async fn fetch_subscription(&self, user_id: &str) -> Result<SubscriptionDetails, AppError> {
        let url = format!("{}/internal/subscriptions/{}", self.base_url, user_id);
        tracing::info!("Fetching subscription details for user {}", user_id);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Wallet request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Wallet returned {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse subscription response: {}", e))
        })
    }

    async fn send_debit(&self, request: &DebitRequest) -> Result<DebitResult, AppError> {
        let url = format!("{}/internal/wallet/debit", self.base_url);
        tracing::info!(
            "Debiting {} cents from wallet of user {} (idempotency key {})",
            request.amount_in_cents,
            request.user_id,
            request.idempotency_key
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Wallet debit failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let error = map_debit_error(status, &body);
            tracing::warn!("Wallet debit rejected: {}", error);
            return Err(error);
        }

        let result: DebitResult = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse debit response: {}", e))
        })?;

        tracing::info!(
            "✓ Wallet debited: transaction {} (remaining balance {})",
            result.transaction_id,
            result.remaining_balance
        );
        Ok(result)
    }
}

fn breaker_error(err: failsafe::Error<AppError>) -> AppError {
    match err {
        failsafe::Error::Inner(e) => e,
        failsafe::Error::Rejected => AppError::ExternalApiError(
            "Wallet service unavailable (circuit open)".to_string(),
        ),
    }
}

#[async_trait]
impl WalletService for WalletClient {
    async fn get_subscription_details(
        &self,
        user_id: &str,
    ) -> Result<SubscriptionDetails, AppError> {
        self.breaker
            .call_with(counts_as_outage, self.fetch_subscription(user_id))
            .await
            .map_err(breaker_error)
    }

    async fn debit_for_campaign(&self, request: &DebitRequest) -> Result<DebitResult, AppError> {
        self.breaker
            .call_with(counts_as_outage, self.send_debit(request))
            .await
            .map_err(breaker_error)
    }
}
