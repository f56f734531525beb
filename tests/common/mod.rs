//! Test helpers for integration tests.
//!
//! Provides database seeding, a scripted feed fetcher, RSS fixtures and a
//! local HTTP server for serving feeds.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use pesos::config::SyncConfig;
use pesos::db::{Database, NewUser, UserRepository};
use pesos::feed::{FeedFetcher, FetchError, FetchedFeed, Source, SourceRepository};
use pesos::sync::{ManualClock, SyncService};

/// Fixed start time used by clock-driven tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Create an in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory()
        .await
        .expect("Failed to create test database")
}

/// Create a user and return its ID.
pub async fn create_user(db: &Database, username: &str) -> i64 {
    UserRepository::new(db.pool())
        .create(&NewUser::new(username))
        .await
        .expect("Failed to create user")
        .id
}

/// Register a source.
pub async fn create_source(db: &Database, url: &str) -> Source {
    SourceRepository::new(db.pool())
        .create(url)
        .await
        .expect("Failed to create source")
}

/// Subscribe a user to a source.
pub async fn subscribe(db: &Database, user_id: i64, source_id: i64) {
    SourceRepository::new(db.pool())
        .subscribe(user_id, source_id)
        .await
        .expect("Failed to subscribe");
}

/// Sync configuration without the inter-batch delay.
pub fn test_sync_config() -> SyncConfig {
    SyncConfig {
        batch_delay_ms: 0,
        ..SyncConfig::default()
    }
}

/// Build a service around a scripted fetcher and a manual clock.
pub fn sync_service(
    db: &Database,
    fetcher: Arc<ScriptedFetcher>,
    clock: Arc<ManualClock>,
    config: SyncConfig,
) -> Arc<SyncService> {
    Arc::new(SyncService::new(db.clone(), fetcher, config).with_clock(clock))
}

/// An RSS item fixture.
pub struct RssItem<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub pub_date: Option<&'a str>,
}

impl<'a> RssItem<'a> {
    pub fn new(title: &'a str, link: &'a str) -> Self {
        Self {
            title,
            link,
            pub_date: None,
        }
    }

    pub fn dated(title: &'a str, link: &'a str, pub_date: &'a str) -> Self {
        Self {
            title,
            link,
            pub_date: Some(pub_date),
        }
    }
}

/// Render an RSS 2.0 document.
pub fn rss_feed(items: &[RssItem<'_>]) -> String {
    let items: String = items
        .iter()
        .map(|item| {
            let date = item
                .pub_date
                .map(|d| format!("<pubDate>{d}</pubDate>"))
                .unwrap_or_default();
            format!(
                "<item><title>{}</title><link>{}</link>{}<description>About {}</description></item>",
                item.title, item.link, date, item.title
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>Fixture</description>
    {items}
  </channel>
</rss>"#
    )
}

/// RSS document with `count` dated items linking below `base`.
pub fn numbered_feed(base: &str, count: usize) -> String {
    let links: Vec<String> = (0..count).map(|i| format!("{base}/posts/{i}")).collect();
    let titles: Vec<String> = (0..count).map(|i| format!("Post {i}")).collect();
    let items: Vec<RssItem<'_>> = titles
        .iter()
        .zip(&links)
        .map(|(title, link)| RssItem::dated(title, link, "Mon, 06 Jan 2025 10:00:00 GMT"))
        .collect();
    rss_feed(&items)
}

/// Fetcher that answers from a script instead of the network.
///
/// Unknown URLs answer with HTTP 404. With a gate, every fetch waits for a
/// permit first, which lets a test hold a run open.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, Result<FetchedFeed, FetchError>>>,
    calls: Mutex<HashMap<String, usize>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Serve `body` as an RSS document for `url`.
    pub fn set_feed(&self, url: &str, body: impl Into<String>) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Ok(FetchedFeed {
                body: body.into().into_bytes(),
                content_type: Some("application/rss+xml".to_string()),
            }),
        );
    }

    /// Fail every fetch of `url` with `error`.
    pub fn set_error(&self, url: &str, error: FetchError) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
    }

    /// Number of fetches of `url` so far.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Total number of fetches so far.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }

        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::HttpStatus(404)))
    }
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    addr
}
