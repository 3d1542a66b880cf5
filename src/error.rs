//! HTTP error type and its JSON `IntoResponse` rendering.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::RepoError;

/// ErrorBody
///
/// Every error response has this shape: a machine-readable `status` code and a
/// human-readable `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    #[schema(example = "user_is_not_enabled")]
    pub status: String,
    #[schema(example = "User is not enabled")]
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user is not enabled")]
    UserNotEnabled,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("activation records are immutable")]
    ImmutableRecord,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("tag read queue unavailable")]
    QueueUnavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::UserNotEnabled => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ImmutableRecord => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::QueueUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (status, message) = match self {
            AppError::Unauthenticated => ("unauthenticated", "Unauthenticated".to_string()),
            AppError::InvalidCredentials => {
                ("invalid_credentials", "Invalid credentials".to_string())
            }
            AppError::UserNotEnabled => ("user_is_not_enabled", "User is not enabled".to_string()),
            AppError::NotFound(what) => ("not_found", format!("{what} not found")),
            AppError::ImmutableRecord => (
                "activation_records_are_immutable",
                "Activation records cannot be modified or deleted".to_string(),
            ),
            AppError::Conflict(m) => ("conflict", m.clone()),
            AppError::Validation(m) => ("validation_failed", m.clone()),
            AppError::QueueUnavailable => (
                "queue_unavailable",
                "Tag read queue is unavailable".to_string(),
            ),
            // Internal details stay in the logs.
            AppError::Internal(_) => ("server_error", "Internal server error".to_string()),
        };
        ErrorBody {
            status: status.to_string(),
            message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            tracing::error!("internal error: {}", detail);
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UniqueViolation(field) => {
                AppError::Conflict(format!("{field} is already taken"))
            }
            RepoError::ForeignKeyViolation(what) => {
                AppError::Validation(format!("referenced {what} does not exist"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

// Extractor rejections. The body text names the offending field or parameter.

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
