use serde::Deserialize;
use service_core::config::{self as core_config, get_env, is_production};
use service_core::error::AppError;
use std::env;

/// Database used when neither `MONGODB_DATABASE` nor the connection string names one.
pub const DEFAULT_DATABASE: &str = "prescription_db";

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongodb: Option<MongoConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    /// Overrides the database named in `uri`.
    pub database: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongodb,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::Mongodb),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

impl PrescriptionConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env, APP__ prefix and PORT)
        let common_config = core_config::Config::load()?;
        let is_prod = is_production();

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("mongodb"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        if is_prod && backend == StoreBackend::Memory {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_BACKEND=memory is not allowed in production"
            )));
        }

        let mongodb = match backend {
            StoreBackend::Mongodb => Some(MongoConfig {
                uri: mongo_uri()?,
                database: env::var("MONGODB_DATABASE").ok(),
            }),
            StoreBackend::Memory => None,
        };

        Ok(PrescriptionConfig {
            common: common_config,
            store: StoreConfig { backend, mongodb },
        })
    }

    /// Configuration for the in-memory store, used by tests and local runs.
    pub fn in_memory(port: u16) -> Self {
        PrescriptionConfig {
            common: core_config::Config { port },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                mongodb: None,
            },
        }
    }
}

/// `MONGO_URI` wins over `MONGODB_URI`; one of them must be set.
fn mongo_uri() -> Result<String, AppError> {
    env::var("MONGO_URI")
        .or_else(|_| env::var("MONGODB_URI"))
        .map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!(
                "MONGO_URI (or MONGODB_URI) is required but not set"
            ))
        })
}
