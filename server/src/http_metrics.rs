use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

pub(crate) async fn track_http_metrics(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    state
        .metrics
        .http_requests_total
        .fetch_add(1, Ordering::Relaxed);
    state
        .metrics
        .http_requests_in_flight
        .fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let response = next.run(request).await;

    state
        .metrics
        .http_requests_in_flight
        .fetch_sub(1, Ordering::Relaxed);
    if response.status().is_success() {
        state
            .metrics
            .http_responses_2xx_total
            .fetch_add(1, Ordering::Relaxed);
    } else if response.status().is_client_error() {
        state
            .metrics
            .http_responses_4xx_total
            .fetch_add(1, Ordering::Relaxed);
    } else if response.status().is_server_error() {
        state
            .metrics
            .http_responses_5xx_total
            .fetch_add(1, Ordering::Relaxed);
    }
    let elapsed_us = started.elapsed().as_micros().min(u64::MAX as u128) as u64;
    state
        .metrics
        .http_request_duration_us_total
        .fetch_add(elapsed_us, Ordering::Relaxed);

    response
}
