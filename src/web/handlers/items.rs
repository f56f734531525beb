//! Item handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::db::UserRepository;
use crate::feed::{dedupe_for_display, ItemRepository};
use crate::web::dto::{ApiQuery, ApiResponse, ItemResponse, ItemsQuery};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/users/:id/items - A user's items, newest first, with display
/// duplicates collapsed.
pub async fn list_user_items(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    ApiQuery(query): ApiQuery<ItemsQuery>,
) -> Result<Json<ApiResponse<Vec<ItemResponse>>>, ApiError> {
    let pool = state.db.pool();

    UserRepository::new(pool)
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let items = ItemRepository::new(pool)
        .list_for_user(user_id, query.limit())
        .await
        .map_err(|e| {
            tracing::error!("Failed to list items: {}", e);
            ApiError::internal("Failed to list items")
        })?;

    let responses = dedupe_for_display(items)
        .into_iter()
        .map(ItemResponse::from)
        .collect();

    Ok(Json(ApiResponse::new(responses)))
}
