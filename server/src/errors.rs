use nanoindex_core::{EngineError, IndexError, SearchError, StoreError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_argument",
            message: message.into(),
        }
    }

    pub(crate) fn payload_too_large(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: "payload_too_large",
            message: message.into(),
        }
    }

    fn request_timeout() -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            code: "request_timeout",
            message: "request timed out".to_string(),
        }
    }

    pub(crate) fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "not_ready",
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

pub(crate) fn map_json_rejection(rejection: JsonRejection) -> ApiError {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::payload_too_large("request body exceeds configured size limit");
    }
    if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
        return ApiError::invalid_argument("content-type must be application/json");
    }
    ApiError::invalid_argument("invalid JSON payload")
}

pub(crate) fn map_engine_error(error: EngineError) -> ApiError {
    match error {
        EngineError::Store(error) => map_store_error(error),
        EngineError::Index(error) => map_index_error(error),
        EngineError::Search(error) => map_search_error(error),
    }
}

fn map_store_error(error: StoreError) -> ApiError {
    match error {
        StoreError::DimensionMismatch { expected, got } => ApiError::invalid_argument(format!(
            "vectors must have dimension {expected}, flattened input had length {got}"
        )),
        StoreError::EmptyBatch => ApiError::invalid_argument("vectors must not be empty"),
        StoreError::MismatchedIdCount { vectors, ids } => ApiError::invalid_argument(format!(
            "expected {vectors} ids, got {ids}"
        )),
        StoreError::NotInitialized => {
            ApiError::invalid_argument("vector store has not been initialized")
        }
        StoreError::Io(error) => ApiError::internal(format!("storage io error: {error}")),
    }
}

fn map_index_error(error: IndexError) -> ApiError {
    match error {
        IndexError::EmptyData => ApiError::invalid_argument("cannot train on an empty store"),
        IndexError::DimensionMismatch { expected, got } => ApiError::invalid_argument(format!(
            "index dimension mismatch: expected={expected}, got={got}"
        )),
        IndexError::NotTrained => ApiError::invalid_argument("index has not been trained"),
        IndexError::KMeans(error) => ApiError::invalid_argument(error.to_string()),
    }
}

fn map_search_error(error: SearchError) -> ApiError {
    match error {
        SearchError::EmptyStore => ApiError::invalid_argument("vector store contains no vectors"),
        SearchError::DimensionMismatch { expected, got } => ApiError::invalid_argument(format!(
            "query must have dimension {expected}, got {got}"
        )),
    }
}

pub(crate) async fn handle_middleware_error(error: BoxError) -> Response {
    if error.is::<tower::timeout::error::Elapsed>() {
        return ApiError::request_timeout().into_response();
    }

    tracing::error!(%error, "middleware error");
    ApiError::internal("internal middleware error").into_response()
}
