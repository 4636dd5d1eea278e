use std::{net::SocketAddr, str::FromStr};

use crate::models::rate::{CurrencyCode, CurrencyPair};

pub const DEFAULT_BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Cache TTLs must fall in `1..=MAX_CACHE_TTL_SECONDS` (one year).
pub const MAX_CACHE_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub exchange_api_key: String,
    pub exchange_api_base_url: String,
    pub rate_cache_ttl_seconds: i64,
    pub quota_cache_ttl_seconds: i64,
    pub default_pair: CurrencyPair,
    pub host: String,
    pub port: u16,
    pub upstream_timeout_seconds: u64,
    pub upstream_max_concurrent: usize,
    pub upstream_min_delay_ms: u64,
}

impl Config {
    pub fn init() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rate_cache_ttl_seconds = parse_ttl(&lookup, "RATE_CACHE_TTL_SECONDS", 3600)?;
        let default_from: CurrencyCode = parse_or(&lookup, "DEFAULT_FROM", CurrencyCode::JPY)?;
        let default_to: CurrencyCode = parse_or(&lookup, "DEFAULT_TO", CurrencyCode::EUR)?;

        let exchange_api_key = lookup("EXCHANGE_API_KEY").unwrap_or_default();
        if exchange_api_key.is_empty() {
            tracing::warn!("EXCHANGE_API_KEY not set, upstream calls will be rejected");
        }

        Ok(Config {
            exchange_api_key,
            exchange_api_base_url: lookup("EXCHANGE_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            rate_cache_ttl_seconds,
            quota_cache_ttl_seconds: parse_ttl(
                &lookup,
                "QUOTA_CACHE_TTL_SECONDS",
                rate_cache_ttl_seconds,
            )?,
            default_pair: CurrencyPair::new(default_from, default_to),
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            upstream_timeout_seconds: parse_or(&lookup, "UPSTREAM_TIMEOUT_SECONDS", 10)?,
            upstream_max_concurrent: parse_or(&lookup, "UPSTREAM_MAX_CONCURRENT", 4)?,
            upstream_min_delay_ms: parse_or(&lookup, "UPSTREAM_MIN_DELAY_MS", 0)?,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let value = format!("{}:{}", self.host, self.port);
        value
            .parse()
            .map_err(|_| ConfigError::Invalid { key: "HOST", value })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_ttl<F>(lookup: &F, key: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let ttl = parse_or(lookup, key, default)?;
    if (1..=MAX_CACHE_TTL_SECONDS).contains(&ttl) {
        Ok(ttl)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: ttl.to_string(),
        })
    }
}
