//! HTTP server for the vault API
//!
//! Provides /health, file CRUD under /api/files, tag listing and search,
//! and an on-demand sweep.

use crate::error::AppError;
use crate::types::{HealthResponse, SearchParams, SweepParams, UploadResponse};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use object_store_client::Tags;
use std::sync::Arc;
use std::time::Duration;
use tiered_storage::{FileTags, SweepReport, Tier, TieredStorage};
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state for the HTTP server
pub struct ServerState {
    pub storage: Arc<TieredStorage>,
    pub cold_threshold: Duration,
    pub max_upload_bytes: usize,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(storage: Arc<TieredStorage>, cold_threshold: Duration, max_upload_bytes: usize) -> Self {
        Self {
            storage,
            cold_threshold,
            max_upload_bytes,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api/files", get(list_files))
        .route(
            "/api/files/{name}",
            get(download_file).put(upload_file).delete(delete_file),
        )
        .route("/api/tags", get(list_tags))
        .route("/api/search", get(search))
        .route("/api/sweep", post(sweep))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache = state.storage.cache_stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache,
    })
}

async fn list_files(State(state): State<SharedState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.storage.list().await?))
}

async fn list_tags(State(state): State<SharedState>) -> Result<Json<Vec<FileTags>>, AppError> {
    Ok(Json(state.storage.list_with_tags().await?))
}

async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let (key, value) = match (params.key, params.value) {
        (Some(key), Some(value)) if !key.is_empty() && !value.is_empty() => (key, value),
        _ => {
            return Err(AppError::BadRequest(
                "Tag key and value are required for search".to_string(),
            ))
        }
    };

    Ok(Json(state.storage.search_by_tag(&key, &value).await?))
}

/// Store the request body under `name`; query parameters become tags
async fn upload_file(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(tags): Query<Tags>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }

    state.storage.upload(&name, &body, tags.clone()).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            name,
            size: body.len(),
            tags,
        }),
    ))
}

async fn download_file(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let (data, tier) = state.storage.download_with_source(&name).await?;
    let cache_header = match tier {
        Tier::Cache => "HIT",
        Tier::Remote => "MISS",
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (HeaderName::from_static("x-cache"), cache_header),
        ],
        data,
    )
        .into_response())
}

async fn delete_file(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    state.storage.delete(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Promote cold cache entries now instead of waiting for the background sweep
async fn sweep(
    State(state): State<SharedState>,
    Query(params): Query<SweepParams>,
) -> Json<SweepReport> {
    let threshold = params
        .threshold_secs
        .map(Duration::from_secs)
        .unwrap_or(state.cold_threshold);

    Json(state.storage.run_sweep(threshold).await)
}
