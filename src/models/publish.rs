use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityRef, RenderOutput, WorkItem};

/// A shared, immutable copy of a work file at a given version.
///
/// The version equals the work item version right before the publish. No two
/// publishes of the same work item share a version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Publish {
    pub id: Uuid,
    pub work_item_id: Uuid,
    /// Publish name as registered with the tracker.
    pub name: String,
    pub version: u32,
    /// Location of the copy in the publish area.
    pub path: String,
    pub entity: EntityRef,
    pub task: Option<String>,
    pub description: String,
    pub publish_type: String,
    /// Input paths the published scene depends on.
    pub dependency_paths: Vec<String>,
    /// Id of the `PublishedFile` record in the tracker.
    pub record_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// What to publish and how to describe it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub description: String,
    /// Overrides the task from the configured context.
    #[serde(default)]
    pub task: Option<String>,
    /// Published file type. Defaults to `"Nuke Script"`.
    #[serde(default)]
    pub publish_type: Option<String>,
    /// Also publish every render at the publishing version.
    #[serde(default = "default_true")]
    pub include_renders: bool,
}

fn default_true() -> bool {
    true
}

impl PublishRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            task: None,
            publish_type: None,
            include_renders: true,
        }
    }
}

/// Result of a successful publish.
///
/// `work_item` already carries the incremented version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResult {
    pub publish: Publish,
    pub renders: Vec<RenderOutput>,
    pub work_item: WorkItem,
}
