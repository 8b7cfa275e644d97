use std::sync::atomic::Ordering;

use nanoindex_core::{Metric, SearchError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;

use crate::errors::{map_engine_error, map_json_rejection, ApiError};
use crate::handler_utils::validate_query_vector;
use crate::models::{
    AgentResetResponse, AgentStatsResponse, ArmStatsResponse, IndexAddRequest, IndexAddResponse,
    IndexResetResponse, IndexTrainParams, IndexTrainResponse, MetricParam, SearchHitResponse,
    SearchRequestBody, SearchResponse,
};
use crate::state::AppState;

pub(crate) async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequestBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(payload) = payload.map_err(map_json_rejection)?;
    validate_query_vector(&payload.vector, &state.config)?;

    let top_k = payload.top_k.unwrap_or(state.config.default_top_k);
    if top_k == 0 || top_k > state.config.max_topk_limit {
        return Err(ApiError::invalid_argument(format!(
            "top_k must be between 1 and {}",
            state.config.max_topk_limit
        )));
    }

    let metric = match payload.metric {
        MetricParam::L2 => Metric::L2,
        MetricParam::Cosine => Metric::Cosine,
    };

    state
        .metrics
        .search_queries_total
        .fetch_add(1, Ordering::Relaxed);

    match state.engine.search(
        &payload.vector,
        top_k,
        metric,
        payload.use_index,
        payload.use_agent,
    ) {
        Ok(outcome) => Ok(Json(SearchResponse {
            query_id: payload.id,
            results: outcome
                .hits
                .into_iter()
                .map(|hit| SearchHitResponse {
                    id: hit.id,
                    score: hit.score,
                })
                .collect(),
            latency_ms: outcome.latency_ms,
            strategy: outcome.arm_used,
        })),
        Err(error) => {
            if matches!(error, nanoindex_core::EngineError::Search(SearchError::EmptyStore)) {
                return Ok(Json(SearchResponse {
                    query_id: payload.id,
                    results: Vec::new(),
                    latency_ms: 0.0,
                    strategy: None,
                }));
            }
            Err(map_engine_error(error))
        }
    }
}

pub(crate) async fn index_add(
    State(state): State<AppState>,
    payload: Result<Json<IndexAddRequest>, JsonRejection>,
) -> Result<Json<IndexAddResponse>, ApiError> {
    let Json(payload) = payload.map_err(map_json_rejection)?;

    if payload.vectors.is_empty() {
        return Err(ApiError::invalid_argument("vectors must not be empty"));
    }
    let dimension = payload.vectors[0].len();
    if dimension == 0 {
        return Err(ApiError::invalid_argument("vectors must be 2-D"));
    }
    if payload.vectors.iter().any(|row| row.len() != dimension) {
        return Err(ApiError::invalid_argument(
            "every row must have the same dimension",
        ));
    }

    let flattened: Vec<f32> = payload.vectors.into_iter().flatten().collect();
    let count = flattened.len() / dimension;

    state
        .metrics
        .index_add_requests_total
        .fetch_add(1, Ordering::Relaxed);

    state
        .engine
        .add_vectors(dimension, &flattened, payload.ids.as_deref())
        .map_err(map_engine_error)?;

    let total_count = state.engine.vector_count();
    Ok(Json(IndexAddResponse {
        count,
        total_count,
        message: format!("added {count} vectors"),
    }))
}

pub(crate) async fn index_train(
    State(state): State<AppState>,
    Query(params): Query<IndexTrainParams>,
) -> Result<Json<IndexTrainResponse>, ApiError> {
    let n_cells = params.n_cells.unwrap_or(state.config.default_n_cells);
    if n_cells == 0 {
        return Err(ApiError::invalid_argument("n_cells must be > 0"));
    }

    state
        .metrics
        .index_train_requests_total
        .fetch_add(1, Ordering::Relaxed);

    state.engine.train_index(n_cells).map_err(map_engine_error)?;

    Ok(Json(IndexTrainResponse {
        n_cells,
        total_count: state.engine.vector_count(),
        message: "index trained".to_string(),
    }))
}

pub(crate) async fn index_reset(
    State(state): State<AppState>,
) -> Result<Json<IndexResetResponse>, ApiError> {
    state.engine.reset_store().map_err(map_engine_error)?;
    Ok(Json(IndexResetResponse {
        message: "store and index reset".to_string(),
    }))
}

pub(crate) async fn agent_stats(State(state): State<AppState>) -> Json<AgentStatsResponse> {
    let report = state.engine.agent_stats();
    let algorithm = match report.algorithm {
        nanoindex_core::SelectionAlgorithm::EpsilonGreedy => "epsilon_greedy",
        nanoindex_core::SelectionAlgorithm::Ucb1 => "ucb1",
    };
    let arms = report
        .arms
        .into_iter()
        .map(|arm| ArmStatsResponse {
            name: arm.name,
            pulls: arm.pulls,
            total_reward: arm.total_reward,
            avg_reward: arm.avg_reward,
            avg_latency_ms: arm.avg_latency_ms,
        })
        .collect();

    Json(AgentStatsResponse {
        algorithm,
        total_pulls: report.total_pulls,
        arms,
    })
}

pub(crate) async fn agent_reset(State(state): State<AppState>) -> Json<AgentResetResponse> {
    state.engine.reset_agent();
    Json(AgentResetResponse {
        message: "agent statistics reset".to_string(),
    })
}
