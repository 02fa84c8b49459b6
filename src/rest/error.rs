// rest/error.rs — API error type for all route handlers.
//
// Every error body carries a `msg` field; 500s add an `error` detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::relay::RelayError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// A Meta delivery failed. Terminal for that event — reported with the
    /// upstream detail, never retried.
    #[error("Meta event error")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "msg": msg })),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "msg": msg })),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "msg": msg })),
            ApiError::Upstream(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "msg": "Meta event error", "error": detail }),
            ),
            ApiError::Internal(e) => {
                tracing::error!(err = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "msg": "Internal server error", "error": e.to_string() }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        let msg = e.to_string();
        match e {
            RelayError::MissingContainerId => ApiError::BadRequest(msg),
            RelayError::TokenNotFound => ApiError::NotFound(msg),
            RelayError::TokenInactive => ApiError::Forbidden(msg),
            RelayError::Deliver(source) => ApiError::Upstream(source.to_string()),
            RelayError::Internal(source) => ApiError::Internal(source),
        }
    }
}
