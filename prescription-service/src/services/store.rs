use crate::models::{Prescription, PrescriptionDraft};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No document has the requested id. Ids that are not valid ObjectIds
    /// also end up here.
    #[error("Prescription not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Failed to encode document: {0}")]
    Encoding(#[from] mongodb::bson::ser::Error),

    /// A request value could not be cast to the stored field type.
    #[error("Cast failed: {0}")]
    Cast(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for prescriptions.
///
/// Implementations assign ids and timestamps; callers only ever supply a
/// [`PrescriptionDraft`].
#[async_trait]
pub trait PrescriptionStore: Send + Sync {
    /// Every stored prescription, in the backend's natural order.
    async fn find_all(&self) -> Result<Vec<Prescription>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Prescription, StoreError>;

    /// Persists a new prescription with a fresh id and `createdAt == updatedAt`.
    async fn create(&self, draft: PrescriptionDraft) -> Result<Prescription, StoreError>;

    /// Replaces `patientData`, `medicines` and `note`, refreshes `updatedAt`
    /// and returns the new state.
    async fn update(&self, id: &str, draft: PrescriptionDraft)
        -> Result<Prescription, StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
