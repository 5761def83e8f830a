//! HTTP API tests. The router runs on an ephemeral port with a stub loader
//! behind the resolver.

use async_trait::async_trait;
use libflix_covers::config::ResolverConfig;
use libflix_covers::diagnostics::MemoryFailureLog;
use libflix_covers::error::AttemptError;
use libflix_covers::loader::{ImageLoader, LoadOptions};
use libflix_covers::models::{CatalogItem, Dimensions};
use libflix_covers::resolver::Resolver;
use libflix_covers::server::{router, AppState};
use serde_json::Value;
use std::sync::Arc;

struct HostLoader;

#[async_trait]
impl ImageLoader for HostLoader {
    async fn attempt_load(
        &self,
        url: &str,
        _options: LoadOptions,
    ) -> Result<Dimensions, AttemptError> {
        if url.contains("good.example") {
            Ok(Dimensions {
                width: 200,
                height: 300,
            })
        } else {
            Err(AttemptError::fetch("HTTP 403 Forbidden"))
        }
    }
}

fn book(id: &str, url: &str) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        title: format!("Book {}", id),
        author: "Someone".to_string(),
        isbn: None,
        primary_image_url: Some(url.to_string()),
        fallback_urls: Vec::new(),
    }
}

async fn spawn_app() -> String {
    let failures = Arc::new(MemoryFailureLog::default());
    let resolver = Resolver::builder(Arc::new(HostLoader))
        .config(ResolverConfig {
            retry_delay_ms: 5,
            ..ResolverConfig::default()
        })
        .failure_sink(failures.clone())
        .build();
    let items = vec![
        book("ok", "https://good.example/cover.jpg"),
        book("bad", "https://bad.example/cover.jpg"),
    ];
    let app = router(AppState::new(resolver, items, failures));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn get_json(url: &str) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["items"], 2);
    assert_eq!(body["cache"]["successes"], 0);
}

#[tokio::test]
async fn test_cover_success() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/covers/ok?priority=high", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["url"], "https://good.example/cover.jpg");
    assert_eq!(body["width"], 200);
}

#[tokio::test]
async fn test_cover_failure_is_reported_not_an_error() {
    let base = spawn_app().await;
    let (status, body) = get_json(&format!("{}/covers/bad", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "failure");
    assert_eq!(body["title"], "Book bad");
    assert_eq!(body["reason"], "exhausted_all_candidates");

    let (_, body) = get_json(&format!("{}/failures", base)).await;
    let failures = body["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["item_id"], "bad");
    assert_eq!(failures[0]["attempts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_item_and_bad_priority() {
    let base = spawn_app().await;

    let (status, body) = get_json(&format!("{}/covers/nope", base)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = get_json(&format!("{}/covers/ok?priority=urgent", base)).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_cache_clear() {
    let base = spawn_app().await;
    get_json(&format!("{}/covers/ok", base)).await;
    get_json(&format!("{}/covers/bad", base)).await;

    let (_, health) = get_json(&format!("{}/health", base)).await;
    assert_eq!(health["cache"]["successes"], 1);
    assert_eq!(health["cache"]["failures"], 1);

    let body: Value = reqwest::Client::new()
        .post(format!("{}/cache/clear", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["cleared"], true);

    let (_, health) = get_json(&format!("{}/health", base)).await;
    assert_eq!(health["cache"]["successes"], 0);
    assert_eq!(health["cache"]["failed_urls"], 0);
    let (_, failures) = get_json(&format!("{}/failures", base)).await;
    assert!(failures["failures"].as_array().unwrap().is_empty());
}
