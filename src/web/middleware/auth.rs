//! Bearer token check for the cron endpoints.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reject requests whose bearer token does not match the cron secret.
pub async fn require_cron_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(secret) = state.cron_secret.as_deref() else {
        return Err(ApiError::unauthorized("Cron access is not configured"));
    };

    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

    if !constant_time_eq(token.as_bytes(), secret.as_bytes()) {
        tracing::debug!("Rejected cron request with invalid token");
        return Err(ApiError::unauthorized("Invalid token"));
    }

    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
