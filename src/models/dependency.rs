use serde::{Deserialize, Serialize};

/// Breakdown row for one input node of the scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyStatus {
    /// Node name in the scene, e.g. `Read1`.
    pub node_path: String,
    /// The path the node currently reads.
    pub path: String,
    pub current_version: u32,
    /// Highest version found in the area the path belongs to.
    pub latest_available_version: u32,
    pub is_up_to_date: bool,
}
