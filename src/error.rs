use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::{ErrorClass, RegistryError, RoomError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The room refused the operation.
    #[error(transparent)]
    Room(#[from] RoomError),
    /// The registry could not open a room.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Server-side failure unrelated to the request.
    #[error("internal error: {0}")]
    Internal(String),
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
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable, retry later.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Room(RoomError::NotHost) => {
                AppError::Unauthorized(RoomError::NotHost.to_string())
            }
            ServiceError::Room(err) => match err.class() {
                ErrorClass::Rejected => AppError::Conflict(err.to_string()),
                ErrorClass::NotFound => AppError::NotFound(err.to_string()),
                ErrorClass::Transient => AppError::ServiceUnavailable(err.to_string()),
                ErrorClass::Fatal => AppError::Internal(err.to_string()),
            },
            ServiceError::Registry(err @ RegistryError::InvalidQuestions(_)) => {
                AppError::BadRequest(err.to_string())
            }
            ServiceError::Registry(err) => AppError::Internal(err.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
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
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn room_errors_map_by_class() {
        assert_eq!(
            status_of(RoomError::AlreadyAnswered.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RoomError::RoomNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(RoomError::RoomBusy.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(RoomError::NotHost.into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn registry_errors_map_to_server_or_client_errors() {
        assert_eq!(
            status_of(RegistryError::CodeSpaceExhausted { attempts: 32 }.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(RegistryError::InvalidQuestions("duplicate question id `1`".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }
}
