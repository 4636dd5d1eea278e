pub mod cache;
pub mod error;
pub mod quota;
pub mod rate;
