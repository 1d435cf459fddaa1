use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named unit of editable content living in the work area.
///
/// Work items are created on first save with version 1. Ordinary edits only
/// touch the file at `location`; the version moves exclusively through a
/// publish, which bumps it by one and points `location` at the next work file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub id: Uuid,
    pub name: String,
    /// Current version. Never decreases.
    pub version: u32,
    /// Path of the current work file.
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a new work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkItemInput {
    pub name: String,
    pub location: String,
}

/// A work item with its append-only history, used for detailed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemHistory {
    #[serde(flatten)]
    pub work_item: WorkItem,
    pub snapshots: Vec<super::Snapshot>,
    pub publishes: Vec<super::Publish>,
}
