//! Feed types for PESOS.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Title used for entries that carry none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// A registered feed URL, shared by all of its subscribers.
#[derive(Debug, Clone)]
pub struct Source {
    /// Source ID.
    pub id: i64,
    /// Feed URL (unique).
    pub url: String,
    /// Whether the source takes part in synchronization runs.
    pub active: bool,
    /// When the source was registered.
    pub created_at: DateTime<Utc>,
}

/// A user's subscription to a source.
#[derive(Debug, Clone)]
pub struct UserSource {
    /// Subscribing user.
    pub user_id: i64,
    /// Subscribed source.
    pub source_id: i64,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

/// A feed entry stored for one user.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    /// Item ID.
    pub id: i64,
    /// Entry title.
    pub title: String,
    /// Canonical entry URL.
    pub url: String,
    /// Description or content, possibly HTML.
    pub description: Option<String>,
    /// Publish date.
    pub postdate: DateTime<Utc>,
    /// URL-safe permalink token.
    pub slug: String,
    /// Owning user.
    pub user_id: i64,
    /// Source the entry came from.
    pub source_id: i64,
}

/// An entry as it comes out of the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    /// Entry title (placeholder when missing).
    pub title: String,
    /// Entry link, resolved against the feed URL.
    pub link: Option<String>,
    /// Publish date, after the missing-date policy was applied.
    pub publish_date: DateTime<Utc>,
    /// Content or summary, possibly HTML.
    pub content: Option<String>,
}

/// An entry that has a link and can therefore be deduplicated and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    /// Entry title.
    pub title: String,
    /// Entry URL.
    pub url: String,
    /// Publish date.
    pub postdate: DateTime<Utc>,
    /// Content or summary.
    pub description: Option<String>,
}

/// A row about to be inserted into `items`.
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Entry title.
    pub title: String,
    /// Entry URL.
    pub url: String,
    /// Content or summary.
    pub description: Option<String>,
    /// Publish date.
    pub postdate: DateTime<Utc>,
    /// Generated permalink token.
    pub slug: String,
}

impl NewItem {
    /// Build an insertable item from a candidate and a freshly generated slug.
    pub fn from_candidate(candidate: &CandidateItem, slug: impl Into<String>) -> Self {
        Self {
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            description: candidate.description.clone(),
            postdate: candidate.postdate,
            slug: slug.into(),
        }
    }
}
