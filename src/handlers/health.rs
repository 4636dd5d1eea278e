use axum::{response::IntoResponse, Json};
use chrono::Utc;
use http::StatusCode;
use serde_json::json;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "timestamp": Utc::now().timestamp_millis()})),
    )
}
