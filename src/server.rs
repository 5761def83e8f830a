//! HTTP API for cover resolution.
//!
//! Serves resolved covers for catalog items to UI code and exposes the
//! failure log to operators.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version and cache counts) |
//! | `GET`  | `/covers/{id}` | Resolve a catalog item; `?priority=high` widens timeouts |
//! | `GET`  | `/failures` | Items that exhausted every candidate |
//! | `POST` | `/cache/clear` | Drop cached results, failure markers, and reports |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no catalog item with id: 42" } }
//! ```
//!
//! A cover that could not be found is **not** an error: `/covers/{id}`
//! answers `200` with `"status": "failure"` and the title and author
//! needed to draw a placeholder.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::cache::{spawn_sweeper, CacheStats};
use crate::catalog::load_catalog;
use crate::config::Config;
use crate::diagnostics::{FailureReport, MemoryFailureLog};
use crate::models::{CatalogItem, Priority, ResolutionResult};
use crate::resolver::Resolver;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    resolver: Resolver,
    catalog: Arc<HashMap<String, CatalogItem>>,
    failures: Arc<MemoryFailureLog>,
}

impl AppState {
    pub fn new(
        resolver: Resolver,
        items: Vec<CatalogItem>,
        failures: Arc<MemoryFailureLog>,
    ) -> Self {
        let catalog = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        Self {
            resolver,
            catalog: Arc::new(catalog),
            failures,
        }
    }
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/covers/{id}", get(handle_cover))
        .route("/failures", get(handle_failures))
        .route("/cache/clear", post(handle_cache_clear))
        .layer(cors)
        .with_state(state)
}

/// Load the catalog, start the cache sweeper, and serve until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let items = load_catalog(&config.catalog.path)?;
    let failures = Arc::new(MemoryFailureLog::default());
    let resolver = Resolver::from_config(config, failures.clone())?;

    let sweeper = spawn_sweeper(
        resolver.cache().clone(),
        Duration::from_secs(config.cache.sweep_interval_secs),
        Duration::from_secs(config.cache.failure_sweep_interval_secs),
    );

    info!(items = items.len(), "catalog loaded");
    let app = router(AppState::new(resolver, items, failures));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Cover server listening on http://{}", config.server.bind);
    let served = axum::serve(listener, app).await;
    sweeper.abort();
    served?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    items: usize,
    cache: CacheStats,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        items: state.catalog.len(),
        cache: state.resolver.cache().stats(),
    })
}

// ============ GET /covers/{id} ============

#[derive(Deserialize)]
struct CoverQuery {
    priority: Option<String>,
}

async fn handle_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CoverQuery>,
) -> Result<Json<ResolutionResult>, AppError> {
    let priority = match query.priority.as_deref() {
        Some(p) => p.parse::<Priority>().map_err(|e| bad_request(e))?,
        None => Priority::Normal,
    };
    let item = state
        .catalog
        .get(&id)
        .ok_or_else(|| not_found(format!("no catalog item with id: {}", id)))?;

    Ok(Json(state.resolver.resolve_image(item, priority).await))
}

// ============ GET /failures ============

#[derive(Serialize)]
struct FailuresResponse {
    failures: Vec<FailureReport>,
}

async fn handle_failures(State(state): State<AppState>) -> Json<FailuresResponse> {
    Json(FailuresResponse {
        failures: state.failures.reports(),
    })
}

// ============ POST /cache/clear ============

async fn handle_cache_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.resolver.cache().clear();
    state.failures.clear();
    Json(serde_json::json!({ "cleared": true }))
}
