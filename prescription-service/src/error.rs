//! Request-level outcome of a prescription operation and its HTTP mapping.

use crate::services::StoreError;
use axum::response::{IntoResponse, Response};
use service_core::error::AppError;
use thiserror::Error;

pub const MISSING_FIELDS_MESSAGE: &str = "Patient data and medicines are required";
pub const NOT_FOUND_MESSAGE: &str = "Prescription not found";
pub const MALFORMED_BODY_MESSAGE: &str = "Malformed JSON body";

/// The five operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Fetch,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Generic message returned to the client on infrastructure failure.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::List => "Failed to fetch prescriptions",
            Operation::Fetch => "Failed to fetch prescription",
            Operation::Create => "Failed to create prescription",
            Operation::Update => "Failed to update prescription",
            Operation::Delete => "Failed to delete prescription",
        }
    }
}

#[derive(Debug, Error)]
pub enum PrescriptionError {
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    MissingRequiredFields,

    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,

    #[error("{}: {source}", .operation.failure_message())]
    Infrastructure {
        operation: Operation,
        #[source]
        source: StoreError,
    },
}

impl PrescriptionError {
    /// Classifies a store failure raised while running `operation`.
    pub fn from_store(operation: Operation, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => PrescriptionError::NotFound,
            source => PrescriptionError::Infrastructure { operation, source },
        }
    }

    /// Label for the outcome metric.
    pub fn outcome(&self) -> &'static str {
        match self {
            PrescriptionError::MissingRequiredFields | PrescriptionError::MalformedBody(_) => {
                "invalid"
            }
            PrescriptionError::NotFound => "not_found",
            PrescriptionError::Infrastructure { .. } => "error",
        }
    }
}

impl From<PrescriptionError> for AppError {
    fn from(err: PrescriptionError) -> Self {
        match err {
            PrescriptionError::MissingRequiredFields => {
                AppError::BadRequest(MISSING_FIELDS_MESSAGE.to_string())
            }
            PrescriptionError::MalformedBody(reason) => {
                tracing::warn!(reason = %reason, "Rejected malformed request body");
                AppError::BadRequest(MALFORMED_BODY_MESSAGE.to_string())
            }
            PrescriptionError::NotFound => AppError::NotFound(NOT_FOUND_MESSAGE.to_string()),
            PrescriptionError::Infrastructure { operation, source } => {
                AppError::internal(operation.failure_message(), source)
            }
        }
    }
}

impl IntoResponse for PrescriptionError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn render(err: PrescriptionError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn maps_every_variant_to_its_status() {
        assert_eq!(
            render(PrescriptionError::MissingRequiredFields).await,
            (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Patient data and medicines are required" })
            )
        );
        assert_eq!(
            render(PrescriptionError::MalformedBody("eof".into())).await,
            (StatusCode::BAD_REQUEST, json!({ "error": "Malformed JSON body" }))
        );
        assert_eq!(
            render(PrescriptionError::NotFound).await,
            (StatusCode::NOT_FOUND, json!({ "error": "Prescription not found" }))
        );
    }

    #[tokio::test]
    async fn infrastructure_failures_use_operation_message() {
        let err = PrescriptionError::Infrastructure {
            operation: Operation::Delete,
            source: StoreError::Unavailable("pool closed".into()),
        };

        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to delete prescription" }));
    }

    #[test]
    fn store_not_found_is_not_an_infrastructure_error() {
        let err = PrescriptionError::from_store(Operation::Update, StoreError::NotFound);
        assert!(matches!(err, PrescriptionError::NotFound));
        assert_eq!(err.outcome(), "not_found");

        let err = PrescriptionError::from_store(
            Operation::List,
            StoreError::Unavailable("timeout".into()),
        );
        assert!(matches!(
            err,
            PrescriptionError::Infrastructure {
                operation: Operation::List,
                ..
            }
        ));
        assert_eq!(err.to_string(), "Failed to fetch prescriptions: Store unavailable: timeout");
    }

    #[tokio::test]
    async fn cast_failures_are_reported_as_the_operation_failing() {
        let err = PrescriptionError::from_store(
            Operation::Create,
            StoreError::Cast("patientData.date: invalid date".into()),
        );
        assert_eq!(err.outcome(), "error");

        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to create prescription" }));
    }
}
