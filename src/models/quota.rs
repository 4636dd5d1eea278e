use serde::{Deserialize, Serialize};

/// Plan size reported when the provider could not be asked.
pub const FALLBACK_PLAN_LIMIT: u64 = 30_000;

/// Body of `GET {base}/{key}/quota`.
#[derive(Deserialize, Debug, Clone)]
pub struct QuotaResponse {
    pub plan_quota: u64,
    pub requests_remaining: u64,
    pub refresh_day_of_month: Option<u8>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSnapshot {
    pub used: u64,
    pub limit: u64,
    pub remaining: Option<u64>,
    pub refresh_day: Option<u8>,
}

impl QuotaSnapshot {
    pub fn fallback() -> Self {
        Self {
            used: 0,
            limit: FALLBACK_PLAN_LIMIT,
            remaining: None,
            refresh_day: None,
        }
    }
}

impl From<QuotaResponse> for QuotaSnapshot {
    fn from(response: QuotaResponse) -> Self {
        Self {
            used: response.plan_quota.saturating_sub(response.requests_remaining),
            limit: response.plan_quota,
            remaining: Some(response.requests_remaining),
            refresh_day: response.refresh_day_of_month,
        }
    }
}

/// Result of asking for quota: either what the provider said, or the fallback
/// used when it could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaOutcome {
    Live(QuotaSnapshot),
    Fallback,
}

impl QuotaOutcome {
    pub fn snapshot(&self) -> QuotaSnapshot {
        match self {
            QuotaOutcome::Live(snapshot) => *snapshot,
            QuotaOutcome::Fallback => QuotaSnapshot::fallback(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, QuotaOutcome::Fallback)
    }
}
