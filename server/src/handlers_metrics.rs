use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct MetricsResponse {
    http_requests_total: u64,
    http_requests_in_flight: u64,
    http_responses_2xx_total: u64,
    http_responses_4xx_total: u64,
    http_responses_5xx_total: u64,
    http_request_duration_us_total: u64,
    search_queries_total: u64,
    index_add_requests_total: u64,
    index_train_requests_total: u64,
    vector_count: usize,
    dimension: usize,
    index_trained: bool,
}

pub(crate) async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let metrics = &state.metrics;
    Json(MetricsResponse {
        http_requests_total: metrics.http_requests_total.load(Ordering::Relaxed),
        http_requests_in_flight: metrics.http_requests_in_flight.load(Ordering::Relaxed),
        http_responses_2xx_total: metrics.http_responses_2xx_total.load(Ordering::Relaxed),
        http_responses_4xx_total: metrics.http_responses_4xx_total.load(Ordering::Relaxed),
        http_responses_5xx_total: metrics.http_responses_5xx_total.load(Ordering::Relaxed),
        http_request_duration_us_total: metrics
            .http_request_duration_us_total
            .load(Ordering::Relaxed),
        search_queries_total: metrics.search_queries_total.load(Ordering::Relaxed),
        index_add_requests_total: metrics.index_add_requests_total.load(Ordering::Relaxed),
        index_train_requests_total: metrics.index_train_requests_total.load(Ordering::Relaxed),
        vector_count: state.engine.vector_count(),
        dimension: state.engine.dimension(),
        index_trained: state.engine.is_index_trained(),
    })
}
