//! The tracking system the ledger registers publishes with and reads shot
//! data from.
//!
//! The ledger only needs three capabilities, captured by [`TrackingSystem`].
//! [`Database`] provides them from the local SQLite store, [`TrackingClient`]
//! from a remote `shotl serve` instance. [`Tracker`] picks one at startup.

mod client;
mod local;

pub use client::TrackingClient;

use thiserror::Error;
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::db::Database;
use crate::models::{NewRecord, Record};

#[derive(Debug, Error)]
pub enum TrackingError {
    /// The tracker could not be reached.
    #[error("tracking service unavailable: {0}")]
    Unavailable(String),

    #[error("tracking service rejected the request: {0}")]
    Rejected(String),

    #[error("tracking service requires a valid API key")]
    Unauthorized,

    #[error("tracking record not found: {0}")]
    NotFound(String),

    #[error("tracking storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for TrackingError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<anyhow::Error> for TrackingError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", e))
    }
}

/// Record-oriented access to the tracking system.
pub trait TrackingSystem {
    fn create_record(&self, record: NewRecord) -> Result<Record, TrackingError>;

    /// Look up a record by entity type and code, keeping only `fields`.
    /// An empty `fields` slice keeps every field.
    fn read_fields(
        &self,
        entity_type: &str,
        code: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, TrackingError>;

    /// Remove a record created by this session. Used to undo a publish that
    /// could not be completed.
    fn retire_record(&self, entity_type: &str, id: Uuid) -> Result<(), TrackingError>;
}

/// Keep only the requested fields of a record.
pub(crate) fn select_fields(mut record: Record, fields: &[&str]) -> Record {
    if !fields.is_empty() {
        record.fields.retain(|key, _| fields.contains(&key.as_str()));
    }
    record
}

/// The tracker chosen from configuration.
#[derive(Clone)]
pub enum Tracker {
    Local(Database),
    Remote(TrackingClient),
}

impl Tracker {
    /// Remote when a service URL is configured, the local store otherwise.
    pub fn from_config(config: &TrackingConfig, db: &Database) -> Self {
        match &config.url {
            Some(url) => {
                tracing::debug!("Using remote tracking service at {}", url);
                Self::Remote(TrackingClient::new(url.clone(), config.api_key.clone()))
            }
            None => Self::Local(db.clone()),
        }
    }
}

impl TrackingSystem for Tracker {
    fn create_record(&self, record: NewRecord) -> Result<Record, TrackingError> {
        match self {
            Self::Local(db) => db.create_record(record).map_err(Into::into),
            Self::Remote(client) => client.create_record(record),
        }
    }

    fn read_fields(
        &self,
        entity_type: &str,
        code: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, TrackingError> {
        match self {
            Self::Local(db) => TrackingSystem::read_fields(db, entity_type, code, fields),
            Self::Remote(client) => client.read_fields(entity_type, code, fields),
        }
    }

    fn retire_record(&self, entity_type: &str, id: Uuid) -> Result<(), TrackingError> {
        match self {
            Self::Local(db) => TrackingSystem::retire_record(db, entity_type, id),
            Self::Remote(client) => client.retire_record(entity_type, id),
        }
    }
}
