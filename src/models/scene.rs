use serde::{Deserialize, Serialize};

/// The frame range of a scene, inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameRange {
    pub first: i64,
    pub last: i64,
    /// Locked ranges cannot be edited in the host until unlocked.
    #[serde(default)]
    pub locked: bool,
}

impl FrameRange {
    pub fn new(first: i64, last: i64) -> Self {
        Self {
            first,
            last,
            locked: false,
        }
    }

    /// Whether the in/out points match, ignoring the lock.
    pub fn same_points(&self, other: &FrameRange) -> bool {
        self.first == other.first && self.last == other.last
    }
}

impl Default for FrameRange {
    fn default() -> Self {
        Self::new(1, 100)
    }
}

/// Outcome of syncing the scene frame range with the tracker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameRangeSync {
    pub previous: FrameRange,
    pub current: FrameRange,
    /// `false` when the scene was already in sync.
    pub changed: bool,
}

/// A node of the scene that reads files from disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputNode {
    pub name: String,
    /// Node class, e.g. `Read` or `ReadGeo2`.
    pub class: String,
    pub file: String,
}
