pub mod auth;
pub mod dashboard;
pub mod deposits;
pub mod health;
pub mod latency;
pub mod orders;
pub mod routes;
pub mod sessions;
pub mod stream;
pub mod upload;
pub mod users;
pub mod withdrawals;
