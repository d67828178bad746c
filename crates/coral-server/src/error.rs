use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coral_shared::{UserId, ValidationError};
use coral_store::StoreError;
use thiserror::Error;

/// Failures of the contribution service.
#[derive(Debug, Error)]
pub enum ContributionError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("No contributions recorded for user {0}")]
    NotFound(UserId),

    #[error("Ledger write conflict: {0}")]
    Conflict(String),

    #[error("Ledger storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Durable and in-memory state disagree; replay the ledger to recover.
    #[error("Integrity fault: {0}")]
    Integrity(String),
}

impl From<StoreError> for ContributionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => ContributionError::Validation(e),
            StoreError::Conflict(msg) => ContributionError::Conflict(msg),
            StoreError::Corrupt(msg) => ContributionError::Integrity(msg),
            other => ContributionError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Errors returned by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Contribution(#[from] ContributionError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Contribution(err) => match err {
                ContributionError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
                ContributionError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
                ContributionError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
                ContributionError::StorageUnavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Ledger storage unavailable, retry with the same idempotency key".to_string(),
                ),
                ContributionError::Integrity(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                ),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_taxonomy() {
        let conflict: ContributionError = StoreError::Conflict("dup".into()).into();
        assert!(matches!(conflict, ContributionError::Conflict(_)));

        let invalid: ContributionError = StoreError::Validation(ValidationError::ZeroAmount).into();
        assert!(matches!(invalid, ContributionError::Validation(_)));

        let io: ContributionError =
            StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")).into();
        assert!(matches!(io, ContributionError::StorageUnavailable(_)));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::from(ContributionError::Validation(ValidationError::ZeroAmount)),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(ContributionError::NotFound(UserId::parse("u").unwrap())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(ContributionError::StorageUnavailable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (ApiError::Forbidden("no".into()), StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
