//! Request DTOs for the web API.

use serde::Deserialize;

use crate::sync::{RunOptions, TRIGGER_MANUAL};

/// Default number of items returned by the item listing.
pub const DEFAULT_ITEMS_LIMIT: i64 = 50;

/// Maximum number of items returned by the item listing.
pub const MAX_ITEMS_LIMIT: i64 = 500;

/// Query parameters for `POST /api/admin/sync`.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    /// Clear the failure map before running.
    #[serde(default)]
    pub clear_failed: bool,
    /// Trigger name recorded in the activity log.
    pub trigger: Option<String>,
    /// Return 202 immediately and run in the background.
    #[serde(default)]
    pub background: bool,
}

impl TriggerQuery {
    /// Run options described by this query.
    pub fn to_run_options(&self) -> RunOptions {
        let trigger = self
            .trigger
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(TRIGGER_MANUAL);

        RunOptions {
            clear_failed: self.clear_failed,
            trigger: trigger.to_string(),
        }
    }
}

/// Query parameters for `GET /api/users/{id}/items`.
#[derive(Debug, Default, Deserialize)]
pub struct ItemsQuery {
    /// Maximum number of items.
    pub limit: Option<i64>,
}

impl ItemsQuery {
    /// Limit clamped to `1..=MAX_ITEMS_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ITEMS_LIMIT)
            .clamp(1, MAX_ITEMS_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_query_defaults() {
        let options = TriggerQuery::default().to_run_options();
        assert_eq!(options.trigger, TRIGGER_MANUAL);
        assert!(!options.clear_failed);
    }

    #[test]
    fn test_trigger_query_custom_trigger() {
        let query = TriggerQuery {
            clear_failed: true,
            trigger: Some("deploy-hook".to_string()),
            background: false,
        };
        let options = query.to_run_options();
        assert_eq!(options.trigger, "deploy-hook");
        assert!(options.clear_failed);

        let query = TriggerQuery {
            trigger: Some("  ".to_string()),
            ..TriggerQuery::default()
        };
        assert_eq!(query.to_run_options().trigger, TRIGGER_MANUAL);
    }

    #[test]
    fn test_items_query_limit() {
        assert_eq!(ItemsQuery::default().limit(), DEFAULT_ITEMS_LIMIT);
        assert_eq!(ItemsQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(ItemsQuery { limit: Some(10_000) }.limit(), MAX_ITEMS_LIMIT);
        assert_eq!(ItemsQuery { limit: Some(20) }.limit(), 20);
    }
}
