//! # Policy Decision Core HTTP Server
//!
//! Thin HTTP front end over [`authz_core::DecisionEngine`].
//!
//! ## Endpoints
//!
//! - `POST /v1/check` - Multi-action authorization check
//! - `POST /v1/admin/policies` - Reload the policy catalog from a YAML batch
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `RUST_LOG` - Log level (default: info)
//! - `CACHE_SIZE` - Decision cache capacity (default: 10000)
//! - `CACHE_TTL_SECS` - Decision cache TTL in seconds (default: 3600)

use authz_core::cache::CacheConfig;
use authz_core::engine::{DecisionEngine, EngineConfig};
use authz_core::expr::Engine as ExprEngine;
use authz_core::policy::parse_document;
use authz_core::catalog::PolicyCatalog;
use authz_core::types::CheckRequest;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    engine: Arc<DecisionEngine>,
    catalog: Arc<PolicyCatalog>,
    expr_engine: Arc<ExprEngine>,
    start_time: std::time::Instant,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Engine(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Engine(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error", msg),
        };

        (status, Json(ErrorResponse { error: error.to_string(), message })).into_response()
    }
}

impl From<authz_core::AuthzError> for AppError {
    fn from(err: authz_core::AuthzError) -> Self {
        AppError::Engine(err.to_string())
    }
}

async fn check_authorization(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<authz_core::CheckResponse>, AppError> {
    info!(
        principal = %request.principal.id,
        resource = %request.resource.id,
        actions = ?request.actions,
        "authorization check"
    );

    let response = state.engine.check(&request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ReloadRequest {
    /// One or more YAML documents, each a complete policy envelope.
    documents: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    version: u64,
}

async fn reload_policies(
    State(state): State<AppState>,
    Json(request): Json<ReloadRequest>,
) -> Result<Json<ReloadResponse>, AppError> {
    let mut parsed = Vec::with_capacity(request.documents.len());
    for source in &request.documents {
        let doc = parse_document(source).map_err(|e| AppError::BadRequest(e.to_string()))?;
        parsed.push(doc);
    }

    state.catalog.replace_all(&parsed, &state.expr_engine)?;
    state.engine.invalidate_cache();

    let version = state.catalog.current().version();
    info!(version, "policy catalog reloaded via admin endpoint");
    Ok(Json(ReloadResponse { version }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    catalog_version: u64,
    version: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        catalog_version: state.catalog.current().version(),
        version: authz_core::VERSION.to_string(),
    })
}

struct MetricsResponse(String);

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], self.0).into_response()
    }
}

async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let body = match state.engine.metrics() {
        Some(collector) => collector.export_prometheus().await,
        None => String::new(),
    };
    MetricsResponse(body)
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/check", post(check_authorization))
        .route("/v1/admin/policies", post(reload_policies))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C signal"),
        _ = terminate => info!("received SIGTERM signal"),
    }

    info!("starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting policy decision core server v{}", authz_core::VERSION);

    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8080);
    let cache_size: usize = std::env::var("CACHE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let cache_ttl_secs: u64 = std::env::var("CACHE_TTL_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(3600);

    let catalog = Arc::new(PolicyCatalog::new());
    let expr_engine = Arc::new(ExprEngine::new());

    let engine_config = EngineConfig {
        enable_cache: true,
        cache_config: CacheConfig {
            capacity: cache_size,
            ttl: std::time::Duration::from_secs(cache_ttl_secs),
        },
        ..EngineConfig::default()
    };

    let engine = Arc::new(DecisionEngine::new(engine_config, Arc::clone(&catalog)));

    let state = AppState {
        engine,
        catalog,
        expr_engine,
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind server: {e}");
            return Err(e);
        }
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}
