use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::attendance::UpsertError;
use crate::db::is_constraint_violation;

/// Failure taxonomy for the whole API surface. Every variant maps to one
/// status code and the uniform `{success: false, error, message?}` envelope.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Unauthenticated(String),
    Forbidden(String),
    NotFound(String),
    Duplicate(String),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn internal(msg: impl Into<String>) -> ApiError {
        ApiError::Internal(anyhow::anyhow!(msg.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m, None),
            ApiError::Unauthenticated(m) => (StatusCode::UNAUTHORIZED, m, None),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m, None),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m, None),
            ApiError::Duplicate(m) => (StatusCode::CONFLICT, m, None),
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    Some(e.to_string()),
                )
            }
        };
        let mut body = json!({ "success": false, "error": error });
        if let Some(m) = message {
            body["message"] = json!(m);
        }
        (status, Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> ApiError {
        if is_constraint_violation(&e) {
            ApiError::Duplicate("unique constraint violated".to_string())
        } else {
            ApiError::Internal(e.into())
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> ApiError {
        ApiError::Internal(e)
    }
}

impl From<UpsertError> for ApiError {
    fn from(e: UpsertError) -> ApiError {
        match e {
            UpsertError::Validation(m) => ApiError::Validation(m),
            UpsertError::NotFound(m) => ApiError::NotFound(m),
            UpsertError::Duplicate(m) => ApiError::Duplicate(m),
            UpsertError::Db(e) => ApiError::from(e),
        }
    }
}
