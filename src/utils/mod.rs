pub mod clock;
pub mod config;
pub mod exchange_api;
pub mod quota_resolver;
pub mod rate_limiter;
pub mod rate_resolver;
pub mod state;
pub mod telemetry;
