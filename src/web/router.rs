//! Router configuration for the web API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    clear_failures, cron_sync, list_user_items, sync_status, trigger_sync, AppState,
};
use super::middleware::require_cron_token;

/// Create the main API router.
///
/// Cron routes are only mounted when a cron secret is configured.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Admin routes (authentication handled upstream)
    let admin_routes = Router::new()
        .route("/sync", post(trigger_sync))
        .route("/sync/status", get(sync_status))
        .route("/sync/failures/clear", post(clear_failures));

    let mut api_routes = Router::new()
        .nest("/admin", admin_routes)
        .route("/users/:id/items", get(list_user_items));

    if app_state.cron_secret.is_some() {
        let cron_routes = Router::new()
            .route("/sync", post(cron_sync))
            .route("/sync/status", get(sync_status))
            .route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                require_cron_token,
            ));
        api_routes = api_routes.nest("/cron", cron_routes);
    }

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
