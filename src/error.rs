use std::fmt;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    engine::{assignment::AssignmentError, resolution::ResolutionError},
    state::{room::UnknownPhase, state_machine::InvalidTransition},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// A host-only action was attempted by another player.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Another request changed the room between our read and our write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Stored data broke an invariant the service relies on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl<P, E> From<InvalidTransition<P, E>> for ServiceError
where
    P: fmt::Debug + fmt::Display,
    E: fmt::Debug,
{
    fn from(err: InvalidTransition<P, E>) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<UnknownPhase> for ServiceError {
    fn from(err: UnknownPhase) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<AssignmentError> for ServiceError {
    fn from(err: AssignmentError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ResolutionError> for ServiceError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::NoVotes => ServiceError::InvalidState(err.to_string()),
            ResolutionError::UnknownPlayer(_) | ResolutionError::MissingAssignment(_) => {
                ServiceError::Internal(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input or a wrong phase.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Host-only action attempted by a non-host.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Lost a race against a concurrent modification; safe to retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error. The detail is logged, never returned.
    #[error("internal error")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => {
                if source.is_conflict() {
                    AppError::Conflict(source.to_string())
                } else {
                    AppError::Internal(source.to_string())
                }
            }
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(detail) => {
                error!(error = %detail, "request failed with an internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
