//! Middleware for the web API.

mod auth;

pub use auth::{bearer_token, require_cron_token};
