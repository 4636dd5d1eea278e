use axum::{routing::get, Router};

use crate::{
    handlers::{health::health_check, quota::get_quota, rates::get_rates},
    utils::state::AppState,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/rates", get(get_rates))
        .route("/quota", get(get_quota))
        .route("/health", get(health_check))
}
