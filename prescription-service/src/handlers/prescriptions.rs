use crate::dtos::{PrescriptionPayload, PrescriptionResponse};
use crate::error::{Operation, PrescriptionError};
use crate::services::record_operation;
use crate::startup::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};

/// Counts the outcome of `operation` and passes the result through.
fn observe<T>(
    operation: Operation,
    result: Result<T, PrescriptionError>,
) -> Result<T, PrescriptionError> {
    match &result {
        Ok(_) => record_operation(operation, "ok"),
        Err(e) => record_operation(operation, e.outcome()),
    }
    result
}

pub async fn list_prescriptions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PrescriptionResponse>>, PrescriptionError> {
    let result = state
        .store
        .find_all()
        .await
        .map(|prescriptions| {
            prescriptions
                .into_iter()
                .map(PrescriptionResponse::from)
                .collect::<Vec<_>>()
        })
        .map_err(|e| PrescriptionError::from_store(Operation::List, e));

    observe(Operation::List, result).map(Json)
}

pub async fn get_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PrescriptionResponse>, PrescriptionError> {
    let result = state
        .store
        .find_by_id(&id)
        .await
        .map(PrescriptionResponse::from)
        .map_err(|e| PrescriptionError::from_store(Operation::Fetch, e));

    observe(Operation::Fetch, result).map(Json)
}

pub async fn create_prescription(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<PrescriptionResponse>), PrescriptionError> {
    let result = async {
        let draft = PrescriptionPayload::from_body(&body)?.into_draft(Operation::Create)?;
        let prescription = state
            .store
            .create(draft)
            .await
            .map_err(|e| PrescriptionError::from_store(Operation::Create, e))?;

        tracing::info!(prescription_id = %prescription.id, "Prescription created");
        Ok::<_, PrescriptionError>(PrescriptionResponse::from(prescription))
    }
    .await;

    observe(Operation::Create, result).map(|created| (StatusCode::CREATED, Json(created)))
}

pub async fn update_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<PrescriptionResponse>, PrescriptionError> {
    let result = async {
        let draft = PrescriptionPayload::from_body(&body)?.into_draft(Operation::Update)?;
        let prescription = state
            .store
            .update(&id, draft)
            .await
            .map_err(|e| PrescriptionError::from_store(Operation::Update, e))?;

        tracing::info!(prescription_id = %prescription.id, "Prescription updated");
        Ok::<_, PrescriptionError>(PrescriptionResponse::from(prescription))
    }
    .await;

    observe(Operation::Update, result).map(Json)
}

pub async fn delete_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, PrescriptionError> {
    let result = match state.store.delete_by_id(&id).await {
        Ok(true) => {
            tracing::info!(prescription_id = %id, "Prescription deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(PrescriptionError::NotFound),
        Err(e) => Err(PrescriptionError::from_store(Operation::Delete, e)),
    };

    observe(Operation::Delete, result)
}
