use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An immutable, timestamped copy of a work file.
///
/// Snapshots live in the snapshot area, apart from the work files, and are
/// never shared with the tracker. Taking one does not change the work item's
/// version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub id: Uuid,
    pub work_item_id: Uuid,
    /// Work item version at the time the snapshot was taken.
    pub source_version: u32,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}
