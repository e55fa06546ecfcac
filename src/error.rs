use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};
use validator::ValidationErrors;

use crate::dao::{models::InvalidStatusTransition, storage::StorageError};

const INVALID_JSON_BODY: &str = "Invalid JSON body";
const INVALID_QUERY: &str = "Invalid query string";
const INVALID_REQUEST: &str = "Invalid request";
const INTERNAL_ERROR: &str = "Internal server error";
const CONCURRENT_UPDATE: &str = "Resource was modified concurrently";
const INVALID_IDENTIFIER: &str = "Invalid identifier";

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed or is unreachable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::PreconditionFailed { .. } => {
                debug!(error = %err, "conditional write lost a race");
                ServiceError::InvalidState(CONCURRENT_UPDATE.to_owned())
            }
            StorageError::InvalidKey { .. } => {
                debug!(error = %err, "rejected document key");
                ServiceError::InvalidInput(INVALID_IDENTIFIER.to_owned())
            }
            err => ServiceError::Unavailable(err),
        }
    }
}

impl From<InvalidStatusTransition> for ServiceError {
    fn from(err: InvalidStatusTransition) -> Self {
        match err {
            InvalidStatusTransition::AlreadyFinished { .. } => {
                ServiceError::InvalidState(err.to_string())
            }
            InvalidStatusTransition::BackToStarted
            | InvalidStatusTransition::MissingWinner
            | InvalidStatusTransition::UnexpectedWinner => {
                ServiceError::InvalidInput(err.to_string())
            }
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
///
/// The carried message is what the client sees in the `error` field.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal server error; the message never carries backend details.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a service failure for a route, answering `message` for internal failures.
    ///
    /// Client errors keep their own message; the underlying failure is logged.
    pub fn from_service(message: &'static str) -> impl FnOnce(ServiceError) -> AppError {
        move |err| match err {
            ServiceError::InvalidInput(detail) => AppError::BadRequest(detail),
            ServiceError::NotFound(detail) => AppError::NotFound(detail),
            ServiceError::InvalidState(detail) => AppError::Conflict(detail),
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                error!(error = ?err, "{message}");
                AppError::Internal(message.to_owned())
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            AppError::BadRequest(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::Internal(message) => message,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::from_service(INTERNAL_ERROR)(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let message = err
            .field_errors()
            .into_values()
            .flat_map(|errors| errors.iter())
            .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
            .unwrap_or_else(|| INVALID_REQUEST.to_owned());
        AppError::BadRequest(message)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected request body");
        AppError::BadRequest(INVALID_JSON_BODY.to_owned())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected query string");
        AppError::BadRequest(INVALID_QUERY.to_owned())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            error: self.into_message(),
        });

        (status, payload).into_response()
    }
}
