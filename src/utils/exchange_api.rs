use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    models::{
        error::UpstreamError,
        quota::QuotaResponse,
        rate::{CurrencyPair, PairRateResponse},
    },
    utils::rate_limiter::RateLimiter,
};

/// The two calls this service makes against the exchange-rate provider.
#[async_trait]
pub trait ExchangeRateApi: Send + Sync {
    async fn fetch_pair_rate(&self, pair: &CurrencyPair) -> Result<PairRateResponse, UpstreamError>;

    async fn fetch_quota(&self) -> Result<QuotaResponse, UpstreamError>;
}

/// exchangerate-api.com v6 over HTTP.
pub struct HttpExchangeRateApi {
    http_client: Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl HttpExchangeRateApi {
    pub fn new(http_client: Client, base_url: &str, api_key: &str, limiter: RateLimiter) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            limiter,
        }
    }

    fn pair_url(&self, pair: &CurrencyPair) -> String {
        format!(
            "{}/{}/pair/{}/{}",
            self.base_url, self.api_key, pair.from, pair.to
        )
    }

    fn quota_url(&self) -> String {
        format!("{}/{}/quota", self.base_url, self.api_key)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let _permit = self.limiter.acquire().await;

        let res = self.http_client.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        let body = res.text().await?;
        decode_body(&body)
    }
}

/// The provider reports failures in-band as `{"result": "error", "error-type": ...}`.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, UpstreamError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;

    match value.get("result").and_then(Value::as_str) {
        Some("success") | None => {}
        Some(_) => {
            let error_type = value["error-type"].as_str().unwrap_or("unknown");
            return Err(UpstreamError::Rejected(error_type.to_string()));
        }
    }

    serde_json::from_value(value).map_err(|e| UpstreamError::Malformed(e.to_string()))
}

#[async_trait]
impl ExchangeRateApi for HttpExchangeRateApi {
    async fn fetch_pair_rate(&self, pair: &CurrencyPair) -> Result<PairRateResponse, UpstreamError> {
        self.get(&self.pair_url(pair)).await
    }

    async fn fetch_quota(&self) -> Result<QuotaResponse, UpstreamError> {
        self.get(&self.quota_url()).await
    }
}

#[cfg(test)]
pub use fake::FakeExchangeApi;
