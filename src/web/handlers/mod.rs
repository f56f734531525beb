//! API handlers for the web API.

pub mod items;
pub mod sync;

pub use items::*;
pub use sync::*;

use std::sync::Arc;

use crate::db::Database;
use crate::sync::SyncService;

/// Application state shared across handlers.
pub struct AppState {
    /// Database.
    pub db: Database,
    /// Synchronization service.
    pub sync: Arc<SyncService>,
    /// Bearer token for the cron endpoints; `None` disables them.
    pub cron_secret: Option<String>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, sync: Arc<SyncService>) -> Self {
        Self {
            db,
            sync,
            cron_secret: None,
        }
    }

    /// Set the cron bearer token. Empty strings disable the cron endpoints.
    pub fn with_cron_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.cron_secret = (!secret.is_empty()).then_some(secret);
        self
    }
}
