use moka::future::Cache;
use std::future::Future;
use std::time::Duration;

use crate::errors::AppError;
use crate::shopify_client::StoreProfile;

/// Bounded, expiring cache of Shopify store profiles keyed by shop domain.
#[derive(Clone)]
pub struct StoreProfileCache {
    inner: Cache<String, StoreProfile>,
}

impl StoreProfileCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
        }
    }

    /// Returns the cached profile for `shop`, or runs `fetch` and caches its result.
    ///
    /// Concurrent misses for the same shop share one fetch. Failures are not cached.
    pub async fn get_or_fetch<F>(&self, shop: &str, fetch: F) -> Result<StoreProfile, AppError>
    where
        F: Future<Output = Result<StoreProfile, AppError>>,
    {
        self.inner
            .try_get_with(shop.to_string(), fetch)
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn get(&self, shop: &str) -> Option<StoreProfile> {
        self.inner.get(shop).await
    }

    pub async fn invalidate(&self, shop: &str) {
        self.inner.invalidate(shop).await;
    }

    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}
