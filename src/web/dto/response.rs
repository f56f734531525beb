//! Response DTOs for the web API.

use serde::Serialize;
use uuid::Uuid;

use crate::feed::Item;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Body of a 202 response for a run started in the background.
#[derive(Debug, Serialize)]
pub struct RunAcceptedResponse {
    /// ID of the started run.
    pub run_id: Uuid,
    /// Always `running`.
    pub status: String,
}

impl RunAcceptedResponse {
    /// Response for a just-started run.
    pub fn running(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: "running".to_string(),
        }
    }
}

/// Body of the clear-failures response.
#[derive(Debug, Serialize)]
pub struct ClearFailuresResponse {
    /// Number of failure entries removed.
    pub cleared: usize,
}

/// A stored item.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    /// Item ID.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Entry URL.
    pub url: String,
    /// Description or content.
    pub description: Option<String>,
    /// Publish date (RFC 3339).
    pub postdate: String,
    /// Permalink slug.
    pub slug: String,
    /// Source ID.
    pub source_id: i64,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            title: item.title,
            url: item.url,
            description: item.description,
            postdate: item.postdate.to_rfc3339(),
            slug: item.slug,
            source_id: item.source_id,
        }
    }
}
