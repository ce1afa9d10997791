use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::round_machine::InvalidTransition};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The caller is not allowed to perform this action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current session or round phase.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested session, round or player was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Concurrent writers kept overwriting the change until the retry budget ran out.
    #[error("concurrent modification: gave up after {attempts} attempt(s), try again")]
    ConcurrentModification {
        /// Number of write/verify attempts performed.
        attempts: u32,
    },
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
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
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller lacks the role required by the action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Action does not fit the current phase.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Write lost too many races; the client may retry.
    #[error("try again: {0}")]
    TryAgain(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Stable machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "validation_failed",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "wrong_phase",
            AppError::TryAgain(_) => "concurrent_modification",
            AppError::ServiceUnavailable(_) => "storage_unavailable",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TryAgain(_) | AppError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            err @ ServiceError::ConcurrentModification { .. } => AppError::TryAgain(err.to_string()),
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable error code (`not_found`, `wrong_phase`, `validation_failed`, `unauthorized`,
    /// `concurrent_modification`, `storage_unavailable`).
    pub code: String,
    /// Human readable description.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        });

        (self.status(), payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_stable_codes() {
        let cases = [
            (ServiceError::NotFound("x".into()), "not_found", StatusCode::NOT_FOUND),
            (ServiceError::InvalidState("x".into()), "wrong_phase", StatusCode::CONFLICT),
            (ServiceError::InvalidInput("x".into()), "validation_failed", StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("x".into()), "unauthorized", StatusCode::FORBIDDEN),
            (
                ServiceError::ConcurrentModification { attempts: 10 },
                "concurrent_modification",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ServiceError::Degraded, "storage_unavailable", StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, code, status) in cases {
            let app: AppError = err.into();
            assert_eq!(app.code(), code);
            assert_eq!(app.status(), status);
        }
    }
}
