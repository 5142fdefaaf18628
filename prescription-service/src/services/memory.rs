use crate::models::{Prescription, PrescriptionDraft};
use crate::services::store::{PrescriptionStore, StoreError};
use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local store keeping prescriptions in insertion order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    prescriptions: Arc<RwLock<Vec<Prescription>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.prescriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.prescriptions.read().await.is_empty()
    }
}

/// `updatedAt` strictly advances even when two writes land in the same
/// millisecond.
fn next_timestamp(previous: DateTime) -> DateTime {
    let now = DateTime::now();
    if now > previous {
        now
    } else {
        DateTime::from_millis(previous.timestamp_millis() + 1)
    }
}

#[async_trait]
impl PrescriptionStore for InMemoryStore {
    async fn find_all(&self) -> Result<Vec<Prescription>, StoreError> {
        Ok(self.prescriptions.read().await.clone())
    }

    async fn find_by_id(&self, id: &str) -> Result<Prescription, StoreError> {
        let oid = ObjectId::parse_str(id).map_err(|_| StoreError::NotFound)?;
        self.prescriptions
            .read()
            .await
            .iter()
            .find(|p| p.id == oid)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, draft: PrescriptionDraft) -> Result<Prescription, StoreError> {
        let prescription = Prescription::new(draft, DateTime::now());
        self.prescriptions.write().await.push(prescription.clone());
        Ok(prescription)
    }

    async fn update(
        &self,
        id: &str,
        draft: PrescriptionDraft,
    ) -> Result<Prescription, StoreError> {
        let oid = ObjectId::parse_str(id).map_err(|_| StoreError::NotFound)?;
        let mut prescriptions = self.prescriptions.write().await;
        let prescription = prescriptions
            .iter_mut()
            .find(|p| p.id == oid)
            .ok_or(StoreError::NotFound)?;

        let now = next_timestamp(prescription.updated_at);
        prescription.apply(draft, now);
        Ok(prescription.clone())
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(false);
        };
        let mut prescriptions = self.prescriptions.write().await;
        let before = prescriptions.len();
        prescriptions.retain(|p| p.id != oid);
        Ok(prescriptions.len() < before)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Medicine, PatientData};

    fn draft(name: &str) -> PrescriptionDraft {
        PrescriptionDraft {
            patient_data: PatientData {
                name: Some(name.to_string()),
                ..Default::default()
            },
            medicines: vec![Medicine {
                id: Some(1.0),
                name: Some("Paracetamol".into()),
                dose: Some("500mg".into()),
            }],
            note: String::new(),
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let store = InMemoryStore::new();
        let created = store.create(draft("Jane Doe")).await.unwrap();

        assert_eq!(created.created_at, created.updated_at);
        let found = store.find_by_id(&created.id.to_hex()).await.unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn find_all_keeps_insertion_order() {
        let store = InMemoryStore::new();
        let first = store.create(draft("first")).await.unwrap();
        let second = store.create(draft("second")).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn update_replaces_fields_and_advances_updated_at() {
        let store = InMemoryStore::new();
        let created = store.create(draft("Jane Doe")).await.unwrap();
        let id = created.id.to_hex();

        let replacement = PrescriptionDraft {
            patient_data: PatientData {
                name: Some("John Roe".into()),
                ..Default::default()
            },
            medicines: Vec::new(),
            note: "review in a week".into(),
        };
        let updated = store.update(&id, replacement.clone()).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(updated.patient_data, replacement.patient_data);
        assert!(updated.medicines.is_empty());
        assert_eq!(updated.note, "review in a week");
        assert_eq!(store.find_by_id(&id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let store = InMemoryStore::new();
        let created = store.create(draft("Jane Doe")).await.unwrap();
        let id = created.id.to_hex();

        assert!(store.delete_by_id(&id).await.unwrap());
        assert!(matches!(
            store.find_by_id(&id).await,
            Err(StoreError::NotFound)
        ));
        assert!(!store.delete_by_id(&id).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let store = InMemoryStore::new();
        store.create(draft("Jane Doe")).await.unwrap();
        let missing = ObjectId::new().to_hex();

        for id in [missing.as_str(), "not-an-object-id", ""] {
            assert!(matches!(
                store.find_by_id(id).await,
                Err(StoreError::NotFound)
            ));
            assert!(matches!(
                store.update(id, draft("x")).await,
                Err(StoreError::NotFound)
            ));
            assert!(!store.delete_by_id(id).await.unwrap());
        }
        assert_eq!(store.len().await, 1);
    }
}
