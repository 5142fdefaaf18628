use crate::models::{Prescription, PrescriptionDraft};
use crate::services::store::{PrescriptionStore, StoreError};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{self, doc, oid::ObjectId, DateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Client as MongoClient, Collection, Database,
};
use service_core::error::AppError;

/// Collection name the original deployment's `Prescription` model maps to.
pub const PRESCRIPTIONS_COLLECTION: &str = "prescriptions";

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    /// Connects once at startup. `database` overrides the one named in the
    /// connection string; `fallback_database` is used when neither names one.
    pub async fn connect(
        uri: &str,
        database: Option<&str>,
        fallback_database: &str,
    ) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;

        let db = match database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(fallback_database)),
        };
        tracing::info!(database = %db.name(), "Successfully connected to MongoDB database");

        Ok(Self { client, db })
    }

    pub fn prescriptions(&self) -> Collection<Prescription> {
        self.db.collection(PRESCRIPTIONS_COLLECTION)
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::NotFound)
}

#[async_trait]
impl PrescriptionStore for MongoDb {
    async fn find_all(&self) -> Result<Vec<Prescription>, StoreError> {
        let cursor = self.prescriptions().find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Prescription, StoreError> {
        let oid = parse_id(id)?;
        self.prescriptions()
            .find_one(doc! { "_id": oid }, None)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn create(&self, draft: PrescriptionDraft) -> Result<Prescription, StoreError> {
        let prescription = Prescription::new(draft, DateTime::now());
        self.prescriptions()
            .insert_one(&prescription, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    prescription_id = %prescription.id,
                    "Failed to insert prescription: {}",
                    e
                );
                StoreError::from(e)
            })?;
        Ok(prescription)
    }

    async fn update(
        &self,
        id: &str,
        draft: PrescriptionDraft,
    ) -> Result<Prescription, StoreError> {
        let oid = parse_id(id)?;
        // updatedAt always moves past the stored value; $literal keeps
        // "$"-prefixed caller text from being read as field paths.
        let update = vec![doc! {
            "$set": {
                "patientData": { "$literal": bson::to_bson(&draft.patient_data)? },
                "medicines": { "$literal": bson::to_bson(&draft.medicines)? },
                "note": { "$literal": draft.note },
                "updatedAt": {
                    "$max": [DateTime::now(), { "$add": ["$updatedAt", 1_i64] }]
                },
            }
        }];
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.prescriptions()
            .find_one_and_update(doc! { "_id": oid }, update, options)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let oid = match ObjectId::parse_str(id) {
            Ok(oid) => oid,
            Err(_) => return Ok(false),
        };
        let result = self
            .prescriptions()
            .delete_one(doc! { "_id": oid }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let reply = self
            .client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::from(e)
            })?;

        let ok = reply
            .get("ok")
            .and_then(|value| value.as_f64().or_else(|| value.as_i32().map(f64::from)))
            .unwrap_or(0.0);
        if ok != 1.0 {
            return Err(StoreError::Unavailable(format!("ping replied {}", reply)));
        }
        Ok(())
    }
}
