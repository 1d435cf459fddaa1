use tracing::{info, warn};

use super::VersionLedger;
use crate::error::LedgerError;
use crate::host::HostScene;
use crate::models::*;
use crate::tracking::TrackingSystem;

pub const CUT_IN_FIELD: &str = "cut_in";
pub const CUT_OUT_FIELD: &str = "cut_out";

impl<T: TrackingSystem, H: HostScene> VersionLedger<T, H> {
    /// Set the scene frame range to the cut of `shot` in the tracker.
    ///
    /// A locked range is unlocked for the change and locked again after.
    /// The scene is left alone when the lookup fails.
    pub fn sync_frame_range(&mut self, shot: &str) -> Result<FrameRangeSync, LedgerError> {
        let record = self
            .tracker
            .read_fields(SHOT_ENTITY, shot, &[CUT_IN_FIELD, CUT_OUT_FIELD])
            .map_err(LedgerError::Tracking)?
            .ok_or_else(|| LedgerError::ShotNotFound(shot.to_string()))?;

        let cut = (record.get_i64(CUT_IN_FIELD), record.get_i64(CUT_OUT_FIELD));
        let (Some(first), Some(last)) = cut else {
            return Err(LedgerError::FrameRangeMissing(shot.to_string()));
        };

        let previous = self.host.current_frame_range();
        let target = FrameRange {
            first,
            last,
            locked: previous.locked,
        };
        if previous.same_points(&target) {
            info!("Frame range of {} already matches {}-{}", shot, first, last);
            return Ok(FrameRangeSync {
                previous,
                current: previous,
                changed: false,
            });
        }

        if previous.locked {
            self.host.set_frame_range(FrameRange {
                locked: false,
                ..previous
            })?;
        }
        if let Err(e) = self.host.set_frame_range(FrameRange::new(first, last)) {
            if previous.locked {
                if let Err(relock) = self.host.set_frame_range(previous) {
                    warn!("Could not relock the frame range: {}", relock);
                }
            }
            return Err(e.into());
        }
        if target.locked {
            self.host.set_frame_range(target)?;
        }

        let current = self.host.current_frame_range();
        info!(
            "Frame range set from {}-{} to {}-{} for {}",
            previous.first, previous.last, current.first, current.last, shot
        );
        Ok(FrameRangeSync {
            previous,
            current,
            changed: true,
        })
    }
}
