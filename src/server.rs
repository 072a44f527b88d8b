//! HTTP surface for route queries, edge updates and cache diagnostics.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{net::TcpListener, task};
use tower_http::trace::TraceLayer;

use crate::cache::{AdjacencyCache, CacheStats, RouteCache};
use crate::config::ServerConfig;
use crate::error::{RouteError, StoreError};
use crate::model::{EdgeUpdate, NodeId, RouteResponse, UpdateAck};
use crate::service::{CacheStatsReport, RouteService};
use crate::store::SqliteEdgeStore;

/// Errors that can occur while running the route server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Opening the edge store failed.
    #[error("failed to open edge store: {0}")]
    Store(#[from] StoreError),
    /// Binding or serving on the listener failed.
    #[error("route server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens the SQLite store named by `config` and wires fresh caches around it.
pub fn open_service(config: &ServerConfig) -> Result<RouteService, StoreError> {
    let store = SqliteEdgeStore::open(&config.database, config.store_options())?;
    let service = RouteService::new(
        Arc::new(store),
        Arc::new(AdjacencyCache::new(config.adjacency_capacity)),
        Arc::new(RouteCache::new()),
    )
    .with_cost_model(config.cost_model);
    Ok(service)
}

/// Opens the store, binds the listener and serves until ctrl-c.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let service = open_service(&config)?;
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(
        %addr,
        database = %config.database.display(),
        adjacency_capacity = config.adjacency_capacity,
        cost_model = config.cost_model.as_str(),
        "route server listening"
    );

    serve_on(listener, service).await
}

/// Serves `service` on an already bound listener until ctrl-c.
pub async fn serve_on(listener: TcpListener, service: RouteService) -> Result<(), ServerError> {
    let app = build_router(service);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Router exposing the route, update and diagnostic endpoints.
pub fn build_router(service: RouteService) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/route", get(route_handler))
        .route("/road/update", post(update_handler))
        .route(
            "/debug/clear_cache",
            get(clear_cache_handler).post(clear_cache_handler),
        )
        .route("/debug/adjcache_stats", get(adjacency_stats_handler))
        .route("/debug/cache_stats", get(cache_stats_handler))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn route_handler(
    State(service): State<RouteService>,
    Query(params): Query<RouteParams>,
) -> Result<Json<RouteResponse>, AppError> {
    let source = parse_node(params.src.as_deref(), "src")?;
    let destination = parse_node(params.dst.as_deref(), "dst")?;
    let response = task::spawn_blocking(move || service.route(source, destination))
        .await?
        .map_err(|err| {
            tracing::error!(source, destination, %err, "route lookup failed");
            err
        })?;
    Ok(Json(response))
}

async fn update_handler(
    State(service): State<RouteService>,
    payload: Result<Json<EdgeUpdate>, JsonRejection>,
) -> Result<Json<UpdateAck>, AppError> {
    let Json(update) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let edge_id = update.edge_id;
    let ack = task::spawn_blocking(move || service.update_edge(&update))
        .await?
        .map_err(|err| {
            tracing::error!(edge_id, %err, "edge update failed");
            err
        })?;
    Ok(Json(ack))
}

async fn clear_cache_handler(State(service): State<RouteService>) -> &'static str {
    service.clear_caches();
    "cleared"
}

async fn adjacency_stats_handler(State(service): State<RouteService>) -> Json<CacheStats> {
    Json(service.adjacency_stats())
}

async fn cache_stats_handler(State(service): State<RouteService>) -> Json<CacheStatsReport> {
    Json(service.cache_stats())
}

#[derive(Debug, Default, Deserialize)]
struct RouteParams {
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    dst: Option<String>,
}

fn parse_node(raw: Option<&str>, name: &str) -> Result<NodeId, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing query parameter '{name}'")))?;
    raw.parse::<NodeId>()
        .map_err(|_| AppError::BadRequest(format!("'{name}' must be an integer node id, got '{raw}'")))
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("internal task failure: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::Route(RouteError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Route(err) if matches!(err.store_error(), Some(StoreError::EdgeNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorPayload {
            message: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    message: String,
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(?err, "failed to listen for shutdown signal"),
    }
}
