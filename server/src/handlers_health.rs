use axum::extract::State;
use axum::Json;

use crate::errors::ApiError;
use crate::models::{LiveResponse, ReadyChecks, ReadyResponse};
use crate::state::AppState;

pub(crate) async fn live(State(state): State<AppState>) -> Json<LiveResponse> {
    Json(LiveResponse {
        status: "live",
        uptime_ms: state.started_at.elapsed().as_millis() as u64,
    })
}

pub(crate) async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    let engine_loaded = state.engine_loaded.load(std::sync::atomic::Ordering::Relaxed);
    let storage_available = state
        .storage_available
        .load(std::sync::atomic::Ordering::Relaxed);

    let response = ReadyResponse {
        status: if state.ready() { "ready" } else { "not_ready" },
        uptime_ms: state.started_at.elapsed().as_millis() as u64,
        checks: ReadyChecks {
            engine_loaded,
            storage_available,
        },
    };

    if state.ready() {
        Ok(Json(response))
    } else {
        Err(ApiError::service_unavailable("engine or storage is not ready"))
    }
}
