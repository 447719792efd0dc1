use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

/// Caller-visible error taxonomy.
///
/// Analytics and geo failures are deliberately *not* part of this enum:
/// they are best-effort, logged where they happen, and never escalate
/// into a response the client can observe.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Gone(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Gone(_) => StatusCode::GONE,
            ServiceError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "Validation Error",
            ServiceError::NotFound(_) => "Not Found",
            ServiceError::Conflict(_) => "Conflict",
            ServiceError::Gone(_) => "Gone",
            ServiceError::QuotaExceeded(_) => "Forbidden",
            ServiceError::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => {
                ServiceError::Conflict("Short code already exists.".to_string())
            }
            StorageError::Other(e) => ServiceError::Internal(e),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Internal(err.into())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Full detail stays in the server log, callers get a generic message
            ServiceError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "An unexpected error occurred. Please try again later.".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ServiceError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ServiceError::Gone("x".into()).status(), StatusCode::GONE);
        assert_eq!(
            ServiceError::QuotaExceeded("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_conflict_maps_to_conflict() {
        let err: ServiceError = StorageError::Conflict.into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
