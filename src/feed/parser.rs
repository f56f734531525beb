//! RSS, Atom and JSON Feed parsing.
//!
//! Feeds are normalized into [`ParsedEntry`] values: a title (placeholder
//! when missing), a link resolved against the feed URL, a publish date and
//! the raw (possibly HTML) content.

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use thiserror::Error;

use crate::config::{MissingDatePolicy, SyncConfig};
use crate::feed::types::{ParsedEntry, DEFAULT_TITLE};

/// Reasons a fetched body could not be turned into entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The body is not a well-formed RSS, Atom or JSON feed.
    #[error("malformed feed: {0}")]
    Malformed(String),

    /// The server declared a content type that cannot hold a feed.
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

/// Limits and policies applied while parsing.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum number of entries taken from one feed.
    pub max_entries: usize,
    /// Maximum content length in characters.
    pub max_content_length: usize,
    /// What to do with entries lacking a publish date.
    pub missing_date: MissingDatePolicy,
}

impl From<&SyncConfig> for ParseOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_entries: config.max_items_per_feed,
            max_content_length: config.max_content_length,
            missing_date: config.missing_date,
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// Parse a feed body into normalized entries.
///
/// `base_url` is the feed's own URL and is used to resolve relative links.
/// `now` stamps entries without a publish date when the policy is
/// [`MissingDatePolicy::FetchTime`].
pub fn parse_feed(
    body: &[u8],
    content_type: Option<&str>,
    base_url: Option<&str>,
    options: &ParseOptions,
    now: DateTime<Utc>,
) -> Result<Vec<ParsedEntry>, ParseError> {
    if let Some(content_type) = content_type {
        check_content_type(content_type)?;
    }

    let feed = parser::parse(body).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let base = base_url.and_then(|u| url::Url::parse(u).ok());

    let entries = feed
        .entries
        .into_iter()
        .take(options.max_entries)
        .filter_map(|entry| normalize_entry(entry, base.as_ref(), options, now))
        .collect();

    Ok(entries)
}

fn check_content_type(content_type: &str) -> Result<(), ParseError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if ["image/", "audio/", "video/", "font/"]
        .iter()
        .any(|prefix| mime.starts_with(prefix))
    {
        return Err(ParseError::UnsupportedContentType(mime));
    }
    Ok(())
}

fn normalize_entry(
    entry: Entry,
    base: Option<&url::Url>,
    options: &ParseOptions,
    now: DateTime<Utc>,
) -> Option<ParsedEntry> {
    let publish_date = match (entry.published.or(entry.updated), options.missing_date) {
        (Some(date), _) => date,
        (None, MissingDatePolicy::FetchTime) => now,
        (None, MissingDatePolicy::Skip) => return None,
    };

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| resolve_link(l.href.trim(), base))
        .filter(|l| !l.is_empty())
        .or_else(|| permalink_id(&entry.id));

    let content = entry
        .content
        .and_then(|c| c.body)
        .or_else(|| entry.summary.map(|s| s.content))
        .filter(|c| !c.trim().is_empty())
        .map(|c| truncate_chars(&c, options.max_content_length));

    Some(ParsedEntry {
        title,
        link,
        publish_date,
        content,
    })
}

fn resolve_link(href: &str, base: Option<&url::Url>) -> String {
    match base {
        Some(base) if url::Url::parse(href).is_err() => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        _ => href.to_string(),
    }
}

/// An entry ID that is itself an absolute web URL, such as an RSS
/// `<guid isPermaLink="true">`.
fn permalink_id(id: &str) -> Option<String> {
    let parsed = url::Url::parse(id.trim()).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
