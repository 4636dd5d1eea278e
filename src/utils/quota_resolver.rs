use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    models::{
        cache::TtlCache,
        quota::{QuotaOutcome, QuotaSnapshot},
    },
    utils::exchange_api::ExchangeRateApi,
};

/// There is only ever one quota state, stored under this key.
pub const QUOTA_KEY: &str = "quota";

/// Cached view of the provider's quota. Never fails: when the provider can't
/// be asked the caller gets `QuotaOutcome::Fallback` and nothing is cached.
pub struct QuotaResolver {
    cache: TtlCache<&'static str, QuotaSnapshot>,
    api: Arc<dyn ExchangeRateApi>,
}

impl QuotaResolver {
    pub fn new(cache: TtlCache<&'static str, QuotaSnapshot>, api: Arc<dyn ExchangeRateApi>) -> Self {
        Self { cache, api }
    }

    pub async fn resolve(&self) -> QuotaOutcome {
        if let Some(snapshot) = self.cache.get(&QUOTA_KEY) {
            debug!("quota cache hit");
            return QuotaOutcome::Live(snapshot);
        }

        debug!("quota cache miss, asking upstream");
        match self.api.fetch_quota().await {
            Ok(response) => {
                let snapshot = QuotaSnapshot::from(response);
                self.cache.set(QUOTA_KEY, snapshot);
                QuotaOutcome::Live(snapshot)
            }
            Err(err) => {
                warn!("quota lookup failed, using fallback: {}", err);
                QuotaOutcome::Fallback
            }
        }
    }

    /// Drop whatever is cached and ask upstream again.
    pub async fn refresh(&self) -> QuotaOutcome {
        self.cache.delete(&QUOTA_KEY);
        self.resolve().await
    }
}
