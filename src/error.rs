//! Error types for ledger operations.
//!
//! Every failure is scoped to the single action that raised it and is shown
//! to the user as a message. Nothing is retried automatically.

use std::path::PathBuf;

use thiserror::Error;

use crate::host::HostError;
use crate::templates::TemplateError;
use crate::tracking::TrackingError;

/// Errors surfaced by [`crate::ledger::VersionLedger`] and the menu actions.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A target path is already taken by something the ledger did not create.
    #[error("path already exists: {}", .0.display())]
    PathConflict(PathBuf),

    /// The tracker rejected or could not store a publish record. Nothing from
    /// the attempted publish is kept.
    #[error("could not register publish: {0}")]
    RegistrationFailure(#[source] TrackingError),

    /// The tracker could not answer a lookup.
    #[error("tracking lookup failed: {0}")]
    Tracking(#[source] TrackingError),

    #[error("shot not found in tracker: {0}")]
    ShotNotFound(String),

    /// The tracker knows the shot but has no in/out frames for it yet.
    #[error("tracker has no in and out frame data for shot {0}")]
    FrameRangeMissing(String),

    #[error("{node} already reads the latest version (v{version:03})")]
    AlreadyCurrent { node: String, version: u32 },

    #[error("invalid work item name: {0:?}")]
    InvalidName(String),

    #[error("unknown work item: {0}")]
    UnknownWorkItem(String),

    /// The open scene is untitled or lives outside the work area.
    #[error("the current scene is not a work file, save it with snapshot-as first")]
    NotAWorkFile,

    /// The open scene is an older version than the work item's current one.
    #[error("the open scene is {name} v{opened:03} but the current version is v{current:03}")]
    StaleWorkFile {
        name: String,
        opened: u32,
        current: u32,
    },

    #[error("no input node named {0}")]
    NodeNotFound(String),

    /// The node reads a path none of the input templates recognize.
    #[error("{node} reads an unrecognized path: {path}")]
    UnrecognizedInput { node: String, path: String },

    #[error("action {0} requires a selection")]
    SelectionRequired(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// Errors caused by user input or external state rather than a fault in
    /// the ledger itself.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_faults_are_not_user_facing() {
        assert!(LedgerError::ShotNotFound("shot042".to_string()).is_user_facing());
        assert!(LedgerError::PathConflict(PathBuf::from("/proj/a.nk")).is_user_facing());

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!LedgerError::Io(io).is_user_facing());
        assert!(!LedgerError::Storage(anyhow::anyhow!("database lock poisoned")).is_user_facing());
    }
}
