//! Feed module for PESOS.
//!
//! This module provides feed retrieval, parsing, deduplication and the
//! persistence of sources, subscriptions and items.

pub mod dedup;
pub mod fetcher;
pub mod parser;
pub mod registry;
pub mod repository;
pub mod slug;
pub mod types;

pub use dedup::{candidates, dedupe_for_display, filter_new};
pub use fetcher::{validate_url, FeedFetcher, FetchError, FetchOptions, FetchedFeed, HttpFetcher};
pub use parser::{parse_feed, ParseError, ParseOptions};
pub use registry::SourceRepository;
pub use repository::ItemRepository;
pub use slug::{generate_slug, SLUG_LENGTH};
pub use types::{
    CandidateItem, Item, NewItem, ParsedEntry, Source, UserSource, DEFAULT_TITLE,
};
