use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Entity type of shot records.
pub const SHOT_ENTITY: &str = "Shot";
/// Entity type of publish registrations.
pub const PUBLISHED_FILE_ENTITY: &str = "PublishedFile";
/// Entity type of review versions created for published renders.
pub const VERSION_ENTITY: &str = "Version";

/// A record in the tracking system.
///
/// Records are schemaless: `fields` holds whatever the entity type carries,
/// e.g. `cut_in`/`cut_out` on shots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub entity_type: String,
    /// Human readable identifier, unique per entity type for shots.
    pub code: String,
    pub fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Read an integer field. Numbers stored as strings are accepted.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        match self.fields.get(field)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Input for creating a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub entity_type: String,
    pub code: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl NewRecord {
    pub fn new(entity_type: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            code: code.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// Reference to a tracking entity, e.g. `Shot shot042`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub entity_type: String,
    pub code: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            code: code.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.entity_type, self.code)
    }
}
