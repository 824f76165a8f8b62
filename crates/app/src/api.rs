use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pdf_page_search_core::{DocumentStore, IndexStats, SearchManager, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const SERVICE_NAME: &str = "PDF Search API";
const DEFAULT_SIZE: usize = 10;
const MAX_SIZE: i64 = 100;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: Option<String>,
    pub size: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router<S>(manager: Arc<SearchManager<S>>) -> Router
where
    S: DocumentStore + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_get::<S>).post(search_post::<S>))
        .route("/stats", get(get_stats::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

pub async fn serve<S>(manager: Arc<SearchManager<S>>, host: &str, port: u16) -> anyhow::Result<()>
where
    S: DocumentStore + Send + Sync + 'static,
{
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, index = manager.index_name(), "pdf search api listening");
    axum::serve(listener, router(manager)).await?;
    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
    })
}

async fn search_get<S>(
    State(manager): State<Arc<SearchManager<S>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError>
where
    S: DocumentStore + Send + Sync + 'static,
{
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::bad_request("query parameter \"q\" is required"));
    }

    let size = clamp_size(params.size.as_deref().and_then(|raw| raw.trim().parse().ok()));
    run_search(&manager, query, size).await
}

async fn search_post<S>(
    State(manager): State<Arc<SearchManager<S>>>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError>
where
    S: DocumentStore + Send + Sync + 'static,
{
    let Json(body) = payload
        .map_err(|_| ApiError::bad_request("JSON body with \"query\" field required"))?;

    let Some(query) = body.query else {
        return Err(ApiError::bad_request("JSON body with \"query\" field required"));
    };
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::bad_request("query is empty"));
    }

    let size = clamp_size(body.size.as_ref().and_then(size_from_json));
    run_search(&manager, query, size).await
}

async fn get_stats<S>(State(manager): State<Arc<SearchManager<S>>>) -> Result<Json<IndexStats>, ApiError>
where
    S: DocumentStore + Send + Sync + 'static,
{
    manager.try_stats().await.map(Json).map_err(|error| {
        error!(%error, "stats request failed");
        ApiError::internal(format!("stats error: {error}"))
    })
}

async fn run_search<S>(
    manager: &SearchManager<S>,
    query: &str,
    size: usize,
) -> Result<Json<SearchResponse>, ApiError>
where
    S: DocumentStore + Send + Sync,
{
    let results = manager.try_search(query, size).await.map_err(|error| {
        error!(%query, %error, "search request failed");
        ApiError::internal(format!("search error: {error}"))
    })?;

    Ok(Json(SearchResponse {
        query: query.to_string(),
        total_results: results.len(),
        results,
    }))
}

/// Sizes outside 1..=100, or missing, fall back to the default.
fn clamp_size(requested: Option<i64>) -> usize {
    match requested {
        Some(size) if (1..=MAX_SIZE).contains(&size) => size as usize,
        _ => DEFAULT_SIZE,
    }
}

fn size_from_json(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|size| size.is_finite())
                .map(|size| size as i64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}
