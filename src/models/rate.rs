use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::models::quota::QuotaSnapshot;

#[derive(Debug, thiserror::Error)]
#[error("invalid currency code: {0:?}")]
pub struct CurrencyCodeError(pub String);

/// ISO 4217 style code: three ASCII letters, stored upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub const JPY: Self = Self(*b"JPY");
    pub const EUR: Self = Self(*b"EUR");

    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.as_bytes() {
            [a, b, c] if trimmed.bytes().all(|ch| ch.is_ascii_alphabetic()) => Ok(Self([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(CurrencyCodeError(s.to_string())),
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(from: CurrencyCode, to: CurrencyCode) -> Self {
        Self { from, to }
    }

    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }
}

#[derive(Deserialize, Default)]
pub struct RateQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RateQuery {
    /// Missing parameters fall back to `default`; present ones must be valid codes.
    pub fn into_pair(self, default: CurrencyPair) -> Result<CurrencyPair, CurrencyCodeError> {
        let from = match self.from {
            Some(code) => code.parse()?,
            None => default.from,
        };
        let to = match self.to {
            Some(code) => code.parse()?,
            None => default.to,
        };
        Ok(CurrencyPair::new(from, to))
    }
}

/// Body of `GET {base}/{key}/pair/{from}/{to}`.
#[derive(Deserialize, Debug, Clone)]
pub struct PairRateResponse {
    pub conversion_rate: f64,
    pub time_last_update_utc: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateRecord {
    pub rate: f64,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub last_update: String,
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
}

impl RateRecord {
    pub fn new(pair: CurrencyPair, response: PairRateResponse, quota: &QuotaSnapshot) -> Self {
        Self {
            rate: response.conversion_rate,
            from: pair.from,
            to: pair.to,
            last_update: response.time_last_update_utc,
            remaining: quota.remaining,
            limit: Some(quota.limit),
        }
    }

    /// Copy of this record carrying `quota` instead of the quota it was built with.
    pub fn with_quota(&self, quota: &QuotaSnapshot) -> Self {
        Self {
            remaining: quota.remaining,
            limit: Some(quota.limit),
            ..self.clone()
        }
    }
}

/// What `/api/rates` returns: the record plus whether it came from cache.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RateLookup {
    #[serde(flatten)]
    pub record: RateRecord,
    pub cached: bool,
}
