//! The host application the ledger drives.
//!
//! The ledger never talks to the compositing package directly. It goes
//! through [`HostScene`], which exposes just enough of the open scene to save
//! it, read and set its frame range, and inspect or repoint its input nodes.
//! [`SceneFile`] implements it over a JSON scene document.

mod compat;
mod scene;

pub use compat::*;
pub use scene::*;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{FrameRange, InputNode};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("scene I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scene document {} is invalid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scene {} does not exist", .0.display())]
    SceneMissing(PathBuf),

    #[error("no input node named {0}")]
    NodeNotFound(String),

    #[error("the frame range is locked")]
    RangeLocked,

    #[error("frame range {first}-{last} is invalid")]
    InvalidFrameRange { first: i64, last: i64 },
}

/// Operations the ledger needs from the open scene.
pub trait HostScene {
    /// Where the scene was last saved. `None` for an untitled scene.
    fn scene_path(&self) -> Option<&Path>;

    /// Write the current content to `path` and make it the scene path.
    fn save_as(&mut self, path: &Path) -> Result<(), HostError>;

    fn current_frame_range(&self) -> FrameRange;

    fn set_frame_range(&mut self, range: FrameRange) -> Result<(), HostError>;

    /// Every node that reads files, in scene order.
    fn list_input_nodes(&self) -> Vec<InputNode>;

    /// Point one input node at a new path.
    fn rewrite_input_path(&mut self, node: &str, path: &str) -> Result<(), HostError>;
}
