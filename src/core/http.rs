//! HTTP control surface using Axum

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use super::manager::{DetectorStatus, ScannerManager};
use crate::config::{ConfigError, ScannerConfiguration};
use crate::error::ScannerError;
use crate::metrics::Metrics;
use crate::models::signal::SignalKind;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ScannerManager>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(manager: Arc<ScannerManager>, metrics: Arc<Metrics>) -> Self {
        Self {
            manager,
            metrics,
            start_time: Arc::new(Instant::now()),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

fn parse_scanner(name: &str) -> Result<SignalKind, ApiError> {
    name.parse::<SignalKind>()
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))
}

fn scanner_error(e: ScannerError) -> ApiError {
    let status = match &e {
        ScannerError::UnknownScanner(_) => StatusCode::NOT_FOUND,
        ScannerError::MarketData(_) => StatusCode::BAD_GATEWAY,
        ScannerError::Config(ConfigError::Invalid(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    api_error(status, e.to_string())
}

/// Recursively overlay `patch` onto `target`. Objects merge key by key;
/// any other value replaces the target outright.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let config = state.manager.config().get_config().await;
    let scanners: serde_json::Map<String, Value> = state
        .manager
        .kinds()
        .into_iter()
        .map(|kind| (kind.to_string(), json!(config.schedule(kind).enabled)))
        .collect();

    Json(json!({
        "status": "healthy",
        "service": "crypto-scanner",
        "uptime_seconds": uptime_seconds,
        "telegram_configured": state.manager.context().notifier.is_configured(),
        "scanners": scanners,
    }))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

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

async fn get_config(State(state): State<AppState>) -> Json<ScannerConfiguration> {
    Json(state.manager.config().get_config().await)
}

/// Partial update: the body is merged over the current configuration, then
/// the result is validated and persisted as a whole.
async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> ApiResult<ScannerConfiguration> {
    if !patch.is_object() {
        return Err(api_error(StatusCode::BAD_REQUEST, "configuration update must be a JSON object"));
    }

    let store = state.manager.config();
    let mut merged = serde_json::to_value(store.get_config().await)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    merge_json(&mut merged, patch);

    let next: ScannerConfiguration = serde_json::from_value(merged)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid configuration: {}", e)))?;

    match store.set_config(next.clone()).await {
        Ok(()) => Ok(Json(next)),
        Err(ConfigError::Invalid(message)) => {
            warn!(error = %message, "Rejected configuration update");
            Err(api_error(StatusCode::BAD_REQUEST, message))
        }
        Err(e) => {
            error!(error = %e, "Failed to persist configuration");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn list_scanners(State(state): State<AppState>) -> Json<Vec<DetectorStatus>> {
    Json(state.manager.status().await)
}

/// Manual one-shot scan ("test scan").
async fn run_scan(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let kind = parse_scanner(&name)?;
    let report = state.manager.run_once(kind).await.map_err(scanner_error)?;
    Ok(Json(json!({
        "scanner": kind,
        "report": report,
    })))
}

async fn start_scanner(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let kind = parse_scanner(&name)?;
    let started = state.manager.start(kind).await.map_err(scanner_error)?;
    let status = state.manager.status_of(kind).await.map_err(scanner_error)?;
    Ok(Json(json!({ "changed": started, "status": status })))
}

async fn stop_scanner(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let kind = parse_scanner(&name)?;
    let stopped = state.manager.stop(kind).await.map_err(scanner_error)?;
    let status = state.manager.status_of(kind).await.map_err(scanner_error)?;
    Ok(Json(json!({ "changed": stopped, "status": status })))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/scanner-api/health", get(health_check))
        .route("/scanner-api/config", get(get_config).put(update_config).post(update_config))
        .route("/scanner-api/scanners", get(list_scanners))
        .route("/scanner-api/scan/{name}", post(run_scan))
        .route("/scanner-api/scanners/{name}/start", post(start_scanner))
        .route("/scanner-api/scanners/{name}/stop", post(stop_scanner))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(state.clone(), metrics_middleware))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Serve the control surface until `shutdown` resolves.
pub async fn start_server<F>(port: u16, state: AppState, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!("Metrics endpoint available at http://0.0.0.0:{}/metrics", port);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}
