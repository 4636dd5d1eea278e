use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use serde_json::Value;

use crate::models::rate::CurrencyCodeError;

/// Failure talking to the exchange-rate provider.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider responded with status {0}")]
    Status(StatusCode),

    #[error("provider rejected the request: {0}")]
    Rejected(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Error returned to HTTP clients. The body is always `{"error": ...}`.
#[derive(Debug)]
pub struct Error {
    pub code: StatusCode,
    pub body: Json<Value>,
}

impl Error {
    pub fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            body: Json(json!({"error": message})),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.code, self.body).into_response()
    }
}

// Upstream detail is logged where it happens; clients only get a generic message.
impl From<UpstreamError> for Error {
    fn from(_: UpstreamError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to fetch exchange rate",
        )
    }
}

impl From<CurrencyCodeError> for Error {
    fn from(error: CurrencyCodeError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, &error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_hides_detail() {
        let err: Error = UpstreamError::Rejected("invalid-key".to_string()).into();
        assert_eq!(err.code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.0, json!({"error": "failed to fetch exchange rate"}));
    }

    #[test]
    fn test_invalid_currency_is_bad_request() {
        let err: Error = CurrencyCodeError("US".to_string()).into();
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert!(err.body.0["error"].as_str().unwrap().contains("US"));
    }
}
