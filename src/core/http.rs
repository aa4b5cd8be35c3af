//! HTTP endpoint server using Axum

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::db::TrendingFilter;
use crate::metrics::Metrics;
use crate::models::{Item, ItemDetail, NewListing, Snapshot};
use crate::trends::engine::{IngestError, PassReport, TrendEngine};

pub const SERVICE_NAME: &str = "shoptrend-trend-engine";

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    /// Absent when no store could be reached; data routes answer 503
    pub trends: Option<Arc<TrendEngine>>,
}

impl AppState {
    pub fn new(metrics: Arc<Metrics>, trends: Option<Arc<TrendEngine>>) -> Self {
        Self {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics,
            start_time: Arc::new(Instant::now()),
            trends,
        }
    }

    fn engine(&self) -> Result<&Arc<TrendEngine>, StatusCode> {
        self.trends.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let health = state.health.read().await;
    Json(json!({
        "status": health.status,
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "service": SERVICE_NAME,
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    state.metrics.http_requests_in_flight.dec();

    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Highest-scoring items. Store failures degrade to an empty list.
async fn trending(
    State(state): State<AppState>,
    Query(filter): Query<TrendingFilter>,
) -> Result<Json<Vec<Item>>, StatusCode> {
    let engine = state.engine()?;
    let filter = filter.normalized();

    match engine.store().trending_items(&filter).await {
        Ok(items) => Ok(Json(items)),
        Err(e) => {
            warn!(error = %e, "Failed to query trending items");
            Ok(Json(Vec::new()))
        }
    }
}

async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, StatusCode> {
    let engine = state.engine()?;

    match engine.store().categories().await {
        Ok(categories) => Ok(Json(categories)),
        Err(e) => {
            warn!(error = %e, "Failed to query categories");
            Ok(Json(Vec::new()))
        }
    }
}

async fn register_item(
    State(state): State<AppState>,
    Json(listing): Json<NewListing>,
) -> Result<(StatusCode, Json<Item>), StatusCode> {
    let engine = state.engine()?;

    if listing.id.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let item = engine
        .register_item(listing, Utc::now())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to register item");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Item detail with recent history. A failing store reads as "not found".
async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemDetail>, StatusCode> {
    let engine = state.engine()?;

    match engine.item_detail(&id, Utc::now()).await {
        Ok(Some(detail)) => Ok(Json(detail)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(error = %e, item_id = %id, "Failed to load item detail");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

async fn ingest_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(snapshot): Json<Snapshot>,
) -> Result<Json<Item>, Response> {
    let engine = state.engine().map_err(IntoResponse::into_response)?;

    match engine.ingest_snapshot(&id, snapshot, Utc::now()).await {
        Ok(Some(item)) => Ok(Json(item)),
        Ok(None) => Err(StatusCode::NOT_FOUND.into_response()),
        Err(IngestError::Invalid(reason)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": reason })),
        )
            .into_response()),
        Err(IngestError::Store(e)) => {
            error!(error = %e, item_id = %id, "Failed to ingest snapshot");
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Trigger a scoring pass on demand
async fn run_scoring(State(state): State<AppState>) -> Result<Json<PassReport>, StatusCode> {
    let engine = state.engine()?;

    engine
        .run_pass(Utc::now())
        .await
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/products/trending", get(trending))
        .route("/api/products/categories", get(categories))
        .route("/api/products", post(register_item))
        .route("/api/products/{id}", get(get_item))
        .route("/api/products/{id}/snapshots", post(ingest_snapshot))
        .route("/api/scoring/run", post(run_scoring))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn start_server(
    port: u16,
    metrics: Arc<Metrics>,
    trends: Option<Arc<TrendEngine>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(AppState::new(metrics, trends));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
