// ABOUTME: The `serve` subcommand: an axum router exposing GET /api/metadata?url= and /health.
// ABOUTME: A semaphore bounds outbound lookups and is closed on shutdown; lookups never produce an error response.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Args;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};
use urlist_preview::{MetadataResult, MetadataService};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "URLIST_ADDR", default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Simultaneous outbound lookups
    #[arg(long, env = "URLIST_MAX_IN_FLIGHT", default_value_t = 16)]
    max_in_flight: usize,
}

#[derive(Clone)]
pub struct AppState {
    service: Arc<MetadataService>,
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(service: MetadataService, max_in_flight: usize) -> Self {
        Self {
            service: Arc::new(service),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    MissingUrl,
    Unavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::MissingUrl => (StatusCode::BAD_REQUEST, "URL parameter is required"),
            ApiError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    url: Option<String>,
}

async fn metadata(
    State(state): State<AppState>,
    Query(query): Query<MetadataQuery>,
) -> Result<Json<MetadataResult>, ApiError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ApiError::MissingUrl)?;

    // A dropped connection drops this future, the permit and the in-flight fetch.
    let _permit = state
        .permits
        .acquire()
        .await
        .map_err(|_| ApiError::Unavailable)?;

    Ok(Json(state.service.get_metadata(url).await))
}

async fn health() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/metadata", get(metadata))
        .route("/health", get(health))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Waits for Ctrl-C, then stops admitting lookups while in-flight ones drain.
async fn shutdown_signal(permits: Arc<Semaphore>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    permits.close();
}

pub async fn run(service: MetadataService, args: &ServeArgs) -> Result<()> {
    let state = AppState::new(service, args.max_in_flight);
    let permits = state.permits.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    info!(addr = %args.addr, max_in_flight = args.max_in_flight, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(permits))
        .await
        .context("server error")?;
    Ok(())
}
