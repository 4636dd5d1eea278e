use axum::{extract::State, Json};
use tracing::warn;

use crate::{models::quota::QuotaSnapshot, utils::state::AppState};

/// Always goes to the provider; the cached quota is discarded first.
pub async fn get_quota(State(state): State<AppState>) -> Json<QuotaSnapshot> {
    let outcome = state.quota.refresh().await;
    if outcome.is_fallback() {
        warn!("serving fallback quota");
    }
    Json(outcome.snapshot())
}
