use std::sync::Arc;

use chrono::Duration;
use reqwest::Client;

use crate::{
    models::{cache::TtlCache, rate::CurrencyPair},
    utils::{
        clock::{Clock, SystemClock},
        config::Config,
        exchange_api::{ExchangeRateApi, HttpExchangeRateApi},
        quota_resolver::QuotaResolver,
        rate_limiter::RateLimiter,
        rate_resolver::RateResolver,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub rates: Arc<RateResolver>,
    pub quota: Arc<QuotaResolver>,
    pub default_pair: CurrencyPair,
}

impl AppState {
    pub fn init(config: &Config) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.upstream_timeout_seconds))
            .build()?;
        let limiter = RateLimiter::new(
            config.upstream_max_concurrent,
            std::time::Duration::from_millis(config.upstream_min_delay_ms),
        );
        let api = Arc::new(HttpExchangeRateApi::new(
            http_client,
            &config.exchange_api_base_url,
            &config.exchange_api_key,
            limiter,
        ));

        Ok(Self::with_parts(config, api, Arc::new(SystemClock)))
    }

    /// Wire the resolvers around an arbitrary provider and clock.
    pub fn with_parts(config: &Config, api: Arc<dyn ExchangeRateApi>, clock: Arc<dyn Clock>) -> Self {
        let quota = Arc::new(QuotaResolver::new(
            TtlCache::new(
                Duration::seconds(config.quota_cache_ttl_seconds),
                clock.clone(),
            ),
            api.clone(),
        ));
        let rates = Arc::new(RateResolver::new(
            TtlCache::new(Duration::seconds(config.rate_cache_ttl_seconds), clock),
            quota.clone(),
            api,
        ));

        AppState {
            rates,
            quota,
            default_pair: config.default_pair,
        }
    }
}
