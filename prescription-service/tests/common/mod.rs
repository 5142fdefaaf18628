#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use prescription_service::config::{PrescriptionConfig, DEFAULT_DATABASE};
use prescription_service::models::{Prescription, PrescriptionDraft};
use prescription_service::services::{InMemoryStore, MongoDb, PrescriptionStore, StoreError};
use prescription_service::startup::{build_router, AppState, Application};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Router over a fresh in-memory store. The store handle is returned so
/// tests can inspect persistence directly.
pub fn memory_app() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    (router_with(Arc::new(store.clone())), store)
}

pub fn router_with(store: Arc<dyn PrescriptionStore>) -> Router {
    build_router(AppState {
        config: PrescriptionConfig::in_memory(0),
        store,
    })
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Sends one request through the router. Empty response bodies read as
/// `Value::Null`.
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    send_request(router, request).await
}

pub async fn send_request(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn jane_doe() -> Value {
    json!({
        "patientData": {
            "name": "Jane Doe",
            "age": "34",
            "gender": "F",
            "diagnosis": "Flu",
            "date": "2024-01-01",
            "place": "Clinic A"
        },
        "medicines": [{ "id": 1, "name": "Paracetamol", "dose": "500mg" }],
        "note": ""
    })
}

/// Store whose every call fails as if the database were unreachable.
pub struct FailingStore;

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl PrescriptionStore for FailingStore {
    async fn find_all(&self) -> Result<Vec<Prescription>, StoreError> {
        Err(unavailable())
    }

    async fn find_by_id(&self, _id: &str) -> Result<Prescription, StoreError> {
        Err(unavailable())
    }

    async fn create(&self, _draft: PrescriptionDraft) -> Result<Prescription, StoreError> {
        Err(unavailable())
    }

    async fn update(
        &self,
        _id: &str,
        _draft: PrescriptionDraft,
    ) -> Result<Prescription, StoreError> {
        Err(unavailable())
    }

    async fn delete_by_id(&self, _id: &str) -> Result<bool, StoreError> {
        Err(unavailable())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(unavailable())
    }
}

/// A running server backed by a throwaway MongoDB database.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: MongoDb,
    pub db_name: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let uri = std::env::var("MONGO_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name = format!("prescription_test_{}", Uuid::new_v4().simple());

        let db = MongoDb::connect(&uri, Some(&db_name), DEFAULT_DATABASE)
            .await
            .expect("Failed to connect to MongoDB");

        let mut config = PrescriptionConfig::in_memory(0); // Random port for testing
        config.store.backend = prescription_service::config::StoreBackend::Mongodb;

        let app = Application::build_with_store(config, Arc::new(db.clone()))
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Drop the per-test database.
    pub async fn cleanup(&self) {
        let _ = self.db.client().database(&self.db_name).drop(None).await;
    }
}
