//! Web API Sync Tests
//!
//! Integration tests for the synchronization and item endpoints.

mod common;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::Value;
use tokio::sync::Semaphore;

use common::*;
use pesos::db::Database;
use pesos::feed::{FetchError, ItemRepository, NewItem};
use pesos::sync::{ManualClock, SyncService};
use pesos::web::handlers::AppState;
use pesos::web::router::create_router;

const FEED_URL: &str = "https://blog.example.com/feed.xml";
const CRON_SECRET: &str = "test-cron-secret";

struct TestApp {
    server: TestServer,
    db: Database,
    fetcher: Arc<ScriptedFetcher>,
    sync: Arc<SyncService>,
    user_id: i64,
}

/// Create a test server with one subscribed source.
async fn create_test_app(fetcher: ScriptedFetcher) -> TestApp {
    let db = setup_db().await;
    let user_id = create_user(&db, "alice").await;
    let source = create_source(&db, FEED_URL).await;
    subscribe(&db, user_id, source.id).await;

    let fetcher = Arc::new(fetcher);
    fetcher.set_feed(FEED_URL, numbered_feed("https://blog.example.com", 3));

    let sync = sync_service(
        &db,
        fetcher.clone(),
        Arc::new(ManualClock::new(t0())),
        test_sync_config(),
    );
    let state = AppState::new(db.clone(), sync.clone()).with_cron_secret(CRON_SECRET);
    let server =
        TestServer::new(create_router(Arc::new(state))).expect("Failed to create test server");

    TestApp {
        server,
        db,
        fetcher,
        sync,
        user_id,
    }
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_trigger_sync_returns_report() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app.server.post("/api/admin/sync").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["trigger"], "manual");
    assert_eq!(body["data"]["stats"]["new_items"], 3);
    assert_eq!(body["data"]["stats"]["sources_processed"], 1);
    assert!(body["data"]["summary"]
        .as_str()
        .unwrap()
        .contains("New items: 3"));
    assert!(!body["data"]["logs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_trigger_sync_with_custom_trigger() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app
        .server
        .post("/api/admin/sync")
        .add_query_param("trigger", "deploy")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["trigger"], "deploy");
}

#[tokio::test]
async fn test_trigger_sync_all_failed_is_500() {
    let app = create_test_app(ScriptedFetcher::new()).await;
    app.fetcher.set_error(FEED_URL, FetchError::HttpStatus(503));

    let response = app.server.post("/api/admin/sync").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json();
    assert_eq!(body["data"]["success"], false);
    assert_eq!(body["data"]["stats"]["failures"], 1);
}

#[tokio::test]
async fn test_status_and_clear_failures() {
    let app = create_test_app(ScriptedFetcher::new()).await;
    app.fetcher.set_error(FEED_URL, FetchError::Timeout);

    app.server.post("/api/admin/sync").await;

    let response = app.server.get("/api/admin/sync/status").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["is_running"], false);
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(
        body["data"]["failed_feeds"][FEED_URL]["error"],
        "request timed out"
    );

    // Backed off: a second run skips the feed.
    let response = app.server.post("/api/admin/sync").await;
    let body: Value = response.json();
    assert_eq!(body["data"]["stats"]["skipped_recent_failure"], 1);

    let response = app.server.post("/api/admin/sync/failures/clear").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["cleared"], 1);

    let response = app.server.get("/api/admin/sync/status").await;
    let body: Value = response.json();
    assert!(body["data"]["failed_feeds"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_clear_failed_query_param() {
    let app = create_test_app(ScriptedFetcher::new()).await;
    app.fetcher.set_error(FEED_URL, FetchError::Timeout);
    app.server.post("/api/admin/sync").await;

    app.fetcher
        .set_feed(FEED_URL, numbered_feed("https://blog.example.com", 3));
    let response = app
        .server
        .post("/api/admin/sync")
        .add_query_param("clear_failed", "true")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["data"]["stats"]["new_items"], 3);
    assert_eq!(app.fetcher.calls(FEED_URL), 2);
}

#[tokio::test]
async fn test_background_trigger_and_conflict() {
    let gate = Arc::new(Semaphore::new(0));
    let app = create_test_app(ScriptedFetcher::with_gate(gate.clone())).await;

    let response = app
        .server
        .post("/api/admin/sync")
        .add_query_param("background", "true")
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "running");
    let run_id = body["data"]["run_id"].as_str().unwrap().to_string();

    let response = app.server.post("/api/admin/sync").await;
    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");

    let response = app.server.get("/api/admin/sync/status").await;
    let body: Value = response.json();
    assert_eq!(body["data"]["is_running"], true);
    assert_eq!(body["data"]["current_run_id"], run_id.as_str());

    gate.add_permits(1);
    for _ in 0..100 {
        if !app.sync.is_running().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let status = app.sync.status().await;
    assert!(!status.is_running);
    assert_eq!(
        ItemRepository::new(app.db.pool())
            .count_for_user(app.user_id)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_cron_requires_bearer_token() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app.server.post("/api/cron/sync").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/cron/sync")
        .add_header(AUTHORIZATION, "Bearer wrong-secret".to_string())
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = app
        .server
        .get("/api/cron/sync/status")
        .add_header(AUTHORIZATION, "Bearer wrong-secret".to_string())
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(app.fetcher.total_calls(), 0);
}

#[tokio::test]
async fn test_cron_sync_runs_in_background() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app
        .server
        .post("/api/cron/sync")
        .add_header(AUTHORIZATION, format!("Bearer {}", CRON_SECRET))
        .await;
    response.assert_status(StatusCode::ACCEPTED);

    for _ in 0..100 {
        if !app.sync.is_running().await {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    let response = app
        .server
        .get("/api/cron/sync/status")
        .add_header(AUTHORIZATION, format!("Bearer {}", CRON_SECRET))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(app.fetcher.calls(FEED_URL), 1);
}

#[tokio::test]
async fn test_cron_routes_absent_without_secret() {
    let db = setup_db().await;
    let sync = sync_service(
        &db,
        Arc::new(ScriptedFetcher::new()),
        Arc::new(ManualClock::new(t0())),
        test_sync_config(),
    );
    let state = AppState::new(db, sync).with_cron_secret("");
    let server = TestServer::new(create_router(Arc::new(state))).unwrap();

    let response = server.post("/api/cron/sync").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_user_items_collapses_display_duplicates() {
    let app = create_test_app(ScriptedFetcher::new()).await;
    app.server.post("/api/admin/sync").await.assert_status_ok();

    // Same (title, url) arriving from a second source.
    let mirror = create_source(&app.db, "https://mirror.example.com/feed.xml").await;
    ItemRepository::new(app.db.pool())
        .insert_batch(
            app.user_id,
            mirror.id,
            &[NewItem {
                title: "Post 0".to_string(),
                url: "https://blog.example.com/posts/0".to_string(),
                description: None,
                postdate: t0(),
                slug: "mirrorslug000".to_string(),
            }],
        )
        .await
        .unwrap();

    let response = app
        .server
        .get(&format!("/api/users/{}/items", app.user_id))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(
        items
            .iter()
            .filter(|i| i["url"] == "https://blog.example.com/posts/0")
            .count(),
        1
    );

    let response = app
        .server
        .get(&format!("/api/users/{}/items", app.user_id))
        .add_query_param("limit", 2)
        .await;
    let body: Value = response.json();
    assert!(body["data"].as_array().unwrap().len() <= 2);
}

#[tokio::test]
async fn test_list_items_unknown_user() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app.server.get("/api/users/9999/items").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_query_is_json_bad_request() {
    let app = create_test_app(ScriptedFetcher::new()).await;

    let response = app
        .server
        .post("/api/admin/sync")
        .add_query_param("background", "maybe")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(app.fetcher.total_calls(), 0);

    let response = app
        .server
        .get(&format!("/api/users/{}/items", app.user_id))
        .add_query_param("limit", "lots")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
