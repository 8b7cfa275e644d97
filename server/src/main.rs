//! NanoIndex HTTP server.
//!
//! Exposes:
//! - `GET /live`: process liveness
//! - `GET /ready`: readiness (engine/storage checks)
//! - `GET /metrics`: runtime counters and engine state
//! - `POST {API_V1_STR}/search`: top-k nearest/most similar vectors
//! - `POST {API_V1_STR}/index/add`: append vectors to the store (and IVF cells, if trained)
//! - `POST {API_V1_STR}/index/train`: (re)train the IVF index over the current store
//! - `POST {API_V1_STR}/index/reset`: clear the store and the IVF index
//! - `GET {API_V1_STR}/agent/stats`: adaptive agent arm statistics
//! - `POST {API_V1_STR}/agent/reset`: clear adaptive agent statistics

use std::time::Duration;

use anyhow::{Context, Result};
use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Request};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handler_utils;
mod handlers;
mod handlers_health;
mod handlers_metrics;
mod http_metrics;
mod models;
mod state;
#[cfg(test)]
mod tests;

use crate::config::AppConfig;
use crate::errors::handle_middleware_error;
use crate::handlers::{agent_reset, agent_stats, index_add, index_reset, index_train, search};
use crate::handlers_health::{live, ready};
use crate::handlers_metrics::metrics;
use crate::http_metrics::track_http_metrics;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind = config.bind;
    let api_v1_str = config.api_v1_str.clone();
    let project_name = config.project_name.clone();
    let data_dir = config.data_dir.clone();

    let state = AppState::new(config.clone()).context("failed to initialize application state")?;
    let app = build_app(state.clone(), &api_v1_str);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind server socket on {bind}"))?;

    tracing::info!(
        %bind,
        %project_name,
        data_dir = %data_dir.display(),
        max_dimension = config.max_dimension,
        strict_finite = config.strict_finite,
        timeout_ms = config.request_timeout_ms,
        max_body_bytes = config.max_body_bytes,
        max_concurrency = config.max_concurrency,
        default_top_k = config.default_top_k,
        "nanoindex server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited unexpectedly")?;

    Ok(())
}

pub(crate) fn build_app(state: AppState, api_v1_str: &str) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    let http_metrics_layer = middleware::from_fn_with_state(state.clone(), track_http_metrics);
    let config = state.config.clone();
    let timeout = Duration::from_millis(config.request_timeout_ms);

    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(HandleErrorLayer::new(handle_middleware_error))
        .layer(TimeoutLayer::new(timeout))
        .layer(ConcurrencyLimitLayer::new(config.max_concurrency))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&request_id_header)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id
                    )
                })
                .on_response(DefaultOnResponse::new().latency_unit(LatencyUnit::Millis)),
        );

    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route(&format!("{api_v1_str}/search"), post(search))
        .route(&format!("{api_v1_str}/index/add"), post(index_add))
        .route(&format!("{api_v1_str}/index/train"), post(index_train))
        .route(&format!("{api_v1_str}/index/reset"), post(index_reset))
        .route(&format!("{api_v1_str}/agent/stats"), get(agent_stats))
        .route(&format!("{api_v1_str}/agent/reset"), post(agent_reset))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(middleware)
        .layer(http_metrics_layer)
        .with_state(state)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(error) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("failed to initialize tracing subscriber: {error}");
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(error) => tracing::error!(%error, "failed to install Ctrl-C handler"),
    }
}
