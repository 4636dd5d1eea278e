pub mod health;
pub mod quota;
pub mod rates;
