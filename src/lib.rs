pub mod attendance;
pub mod auth;
pub mod builder;
pub mod calendar;
pub mod config;
pub mod error;
pub mod fields;
pub mod models;
pub mod openapi;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod storage; // upload blobs for file fields
pub mod validation;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config, AppState};
