use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames written by a render node of a work item.
///
/// The version is captured from the work item when the render is submitted
/// and is never set on its own. Once published, `published_path` and
/// `record_id` are filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderOutput {
    pub id: Uuid,
    pub work_item_id: Uuid,
    /// Name of the render node in the scene.
    pub node: String,
    /// Output channel, unique per work item (`main`, `main1`, ...).
    pub channel: String,
    pub version: u32,
    /// Frame path pattern in the render area, e.g. `comp_main.v003.%04d.exr`.
    pub path_pattern: String,
    /// Optional note appended to the publish description.
    pub comment: Option<String>,
    pub published_path: Option<String>,
    pub record_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for submitting a render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRenderInput {
    pub node: String,
    /// Requested channel. `None` picks the first free `main` variant.
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}
