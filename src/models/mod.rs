//! Domain models for the shot ledger.
//!
//! # Core Concepts
//!
//! ## Versioned Entities
//!
//! - [`WorkItem`]: A named unit of editable content with exactly one current version.
//! - [`Snapshot`]: Immutable timestamped backup of a work file (private history).
//! - [`Publish`]: Immutable shared copy of a work file, registered with the tracker.
//! - [`RenderOutput`]: Rendered frames whose version follows the work item.
//!
//! ## Scene State
//!
//! - [`FrameRange`]: The first/last frame of the open scene.
//! - [`DependencyStatus`]: Breakdown row for one input node.
//!
//! ## Tracking
//!
//! - [`Record`]: An entity in the external tracking system (shots, published files).

mod dependency;
mod publish;
mod render;
mod scene;
mod snapshot;
mod tracking;
mod work_item;

pub use dependency::*;
pub use publish::*;
pub use render::*;
pub use scene::*;
pub use snapshot::*;
pub use tracking::*;
pub use work_item::*;
