use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{
    models::{
        cache::TtlCache,
        error::UpstreamError,
        rate::{CurrencyPair, RateLookup, RateRecord},
    },
    utils::{exchange_api::ExchangeRateApi, quota_resolver::QuotaResolver},
};

/// Claim on a pair's in-flight lock. Dropping it, including when the lookup
/// is cancelled, removes the map entry once no one else holds it.
struct InFlight<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn claim(map: &'a DashMap<String, Arc<Mutex<()>>>, key: &'a str) -> Self {
        let lock = map.entry(key.to_string()).or_default().clone();
        Self { map, key, lock }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and ours.
        self.map.remove_if(self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// Cached pair rates, each response enriched with the current quota.
pub struct RateResolver {
    cache: TtlCache<String, RateRecord>,
    quota: Arc<QuotaResolver>,
    api: Arc<dyn ExchangeRateApi>,
    // One lock per pair currently being fetched, so concurrent misses for the
    // same pair share a single upstream call.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl RateResolver {
    pub fn new(
        cache: TtlCache<String, RateRecord>,
        quota: Arc<QuotaResolver>,
        api: Arc<dyn ExchangeRateApi>,
    ) -> Self {
        Self {
            cache,
            quota,
            api,
            in_flight: DashMap::new(),
        }
    }

    pub async fn resolve(&self, pair: CurrencyPair) -> Result<RateLookup, UpstreamError> {
        let key = pair.cache_key();

        if let Some(record) = self.cache.get(&key) {
            debug!("rate cache hit for {}", key);
            return Ok(self.serve_cached(record).await);
        }

        let slot = InFlight::claim(&self.in_flight, &key);
        let _guard = slot.lock.lock().await;
        // Bound so the fetch future is dropped before `slot` and `key`.
        let result = match self.cache.get(&key) {
            // Someone else filled it while we waited.
            Some(record) => Ok(self.serve_cached(record).await),
            None => self.fetch(pair, &key).await,
        };
        result
    }

    async fn serve_cached(&self, record: RateRecord) -> RateLookup {
        let quota = self.quota.resolve().await.snapshot();
        RateLookup {
            record: record.with_quota(&quota),
            cached: true,
        }
    }

    async fn fetch(&self, pair: CurrencyPair, key: &str) -> Result<RateLookup, UpstreamError> {
        debug!("rate cache miss for {}, asking upstream", key);

        let (rate, quota) = tokio::join!(self.api.fetch_pair_rate(&pair), self.quota.resolve());

        let response = rate.map_err(|err| {
            error!("rate lookup for {} failed: {}", key, err);
            err
        })?;

        let record = RateRecord::new(pair, response, &quota.snapshot());
        self.cache.set(key.to_string(), record.clone());

        Ok(RateLookup {
            record,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::quota::FALLBACK_PLAN_LIMIT,
        utils::{clock::ManualClock, exchange_api::FakeExchangeApi},
    };
    use chrono::Duration;
    use tokio::time::Instant;

    struct Harness {
        rates: Arc<RateResolver>,
        quota: Arc<QuotaResolver>,
        api: Arc<FakeExchangeApi>,
        clock: Arc<ManualClock>,
    }

    fn harness(api: FakeExchangeApi) -> Harness {
        let api = Arc::new(api);
        let clock = Arc::new(ManualClock::new());
        let quota = Arc::new(QuotaResolver::new(
            TtlCache::new(Duration::seconds(600), clock.clone()),
            api.clone(),
        ));
        let rates = Arc::new(RateResolver::new(
            TtlCache::new(Duration::seconds(3600), clock.clone()),
            quota.clone(),
            api.clone(),
        ));
        Harness {
            rates,
            quota,
            api,
            clock,
        }
    }

    fn usd_eur() -> CurrencyPair {
        CurrencyPair::new("USD".parse().unwrap(), "EUR".parse().unwrap())
    }

    #[tokio::test]
    async fn test_miss_builds_record_from_rate_and_quota() {
        let h = harness(FakeExchangeApi::default());

        let lookup = h.rates.resolve(usd_eur()).await.unwrap();
        assert!(!lookup.cached);
        assert_eq!(lookup.record.rate, 0.92);
        assert_eq!(lookup.record.from.as_str(), "USD");
        assert_eq!(lookup.record.to.as_str(), "EUR");
        assert_eq!(lookup.record.last_update, "Mon, 01 Jan 2024 00:00:00 +0000");
        assert_eq!(lookup.record.remaining, Some(29500));
        assert_eq!(lookup.record.limit, Some(30000));
        assert_eq!(h.api.rate_calls(), 1);
    }

    #[tokio::test]
    async fn test_hit_keeps_rate_but_refreshes_quota() {
        let h = harness(FakeExchangeApi::default());

        let first = h.rates.resolve(usd_eur()).await.unwrap();

        h.api.set_rate(1.5);
        h.api.set_remaining(29000);
        h.quota.refresh().await;

        let second = h.rates.resolve(usd_eur()).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.record.rate, first.record.rate);
        assert_eq!(second.record.last_update, first.record.last_update);
        assert_eq!(second.record.remaining, Some(29000));
        assert_eq!(h.api.rate_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_rate_is_refetched() {
        let h = harness(FakeExchangeApi::default());

        h.rates.resolve(usd_eur()).await.unwrap();
        h.api.set_rate(0.95);
        h.clock.advance(Duration::seconds(3600));

        let lookup = h.rates.resolve(usd_eur()).await.unwrap();
        assert!(!lookup.cached);
        assert_eq!(lookup.record.rate, 0.95);
        assert_eq!(h.api.rate_calls(), 2);
    }

    #[tokio::test]
    async fn test_pairs_are_cached_independently() {
        let h = harness(FakeExchangeApi::default());
        let eur_usd = CurrencyPair::new("EUR".parse().unwrap(), "USD".parse().unwrap());

        h.rates.resolve(usd_eur()).await.unwrap();
        let lookup = h.rates.resolve(eur_usd).await.unwrap();
        assert!(!lookup.cached);
        assert_eq!(h.api.rate_calls(), 2);
    }

    #[tokio::test]
    async fn test_rate_failure_is_surfaced_and_not_cached() {
        let h = harness(FakeExchangeApi::default());

        h.api.fail_rate(true);
        assert!(h.rates.resolve(usd_eur()).await.is_err());

        h.api.fail_rate(false);
        let lookup = h.rates.resolve(usd_eur()).await.unwrap();
        assert!(!lookup.cached);
        assert_eq!(h.api.rate_calls(), 2);
        assert!(h.rates.in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_quota_failure_degrades_but_rate_is_cached() {
        let h = harness(FakeExchangeApi::default());

        h.api.fail_quota(true);
        let lookup = h.rates.resolve(usd_eur()).await.unwrap();
        assert!(!lookup.cached);
        assert_eq!(lookup.record.rate, 0.92);
        assert_eq!(lookup.record.remaining, None);
        assert_eq!(lookup.record.limit, Some(FALLBACK_PLAN_LIMIT));

        let again = h.rates.resolve(usd_eur()).await.unwrap();
        assert!(again.cached);
        assert_eq!(h.api.rate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_and_quota_are_fetched_concurrently() {
        let h = harness(FakeExchangeApi::with_latency(
            tokio::time::Duration::from_millis(100),
        ));

        let start = Instant::now();
        h.rates.resolve(usd_eur()).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(h.api.rate_calls(), 1);
        assert_eq!(h.api.quota_calls(), 1);
        assert!(
            elapsed < tokio::time::Duration::from_millis(200),
            "calls were serialized: {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_upstream_call() {
        let h = harness(FakeExchangeApi::with_latency(
            tokio::time::Duration::from_millis(50),
        ));

        let (a, b) = tokio::join!(h.rates.resolve(usd_eur()), h.rates.resolve(usd_eur()));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.record, b.record);
        assert_ne!(a.cached, b.cached);
        assert_eq!(h.api.rate_calls(), 1);
        assert!(h.rates.in_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_lookups_release_their_locks() {
        let h = harness(FakeExchangeApi::with_latency(
            tokio::time::Duration::from_secs(5),
        ));
        let pairs = [("AAA", "BBB"), ("CCC", "DDD"), ("EEE", "FFF"), ("AAA", "BBB")];

        let handles: Vec<_> = pairs
            .iter()
            .map(|(from, to)| {
                let rates = h.rates.clone();
                let pair = CurrencyPair::new(from.parse().unwrap(), to.parse().unwrap());
                tokio::spawn(async move { rates.resolve(pair).await })
            })
            .collect();

        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        assert_eq!(h.rates.in_flight.len(), 3);

        for handle in handles {
            handle.abort();
            assert!(handle.await.unwrap_err().is_cancelled());
        }
        assert!(h.rates.in_flight.is_empty());
    }
}
