//! The work/publish version ledger.
//!
//! A work item moves through three areas. Its current work file lives in the
//! work area and is overwritten by ordinary saves. Snapshots are private,
//! timestamped copies of the work file. Publishes are shared copies
//! registered with the tracker, and they are the only thing that moves the
//! version: each publish takes the current version and bumps the work item
//! to the next one.

mod breakdown;
mod frame_range;
mod publish;
mod render;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::config::{Area, LedgerConfig};
use crate::db::Database;
use crate::error::LedgerError;
use crate::host::HostScene;
use crate::models::*;
use crate::templates::{Fields, PathTemplate, TIMESTAMP_FORMAT, TIMESTAMP_KEY};
use crate::tracking::TrackingSystem;

/// Templates resolved against their area roots.
#[derive(Debug, Clone)]
pub struct LedgerTemplates {
    pub work: PathTemplate,
    pub snapshot: PathTemplate,
    pub publish: PathTemplate,
    pub publish_name: PathTemplate,
    pub render: PathTemplate,
    pub render_publish: PathTemplate,
    pub inputs: Vec<PathTemplate>,
}

impl LedgerTemplates {
    pub fn resolve(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let areas = &config.areas;
        let templates = &config.templates;

        let inputs = templates
            .inputs
            .iter()
            .map(|input| PathTemplate::new(areas.root(input.area), &input.pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            work: PathTemplate::new(areas.root(Area::Work), &templates.work)?,
            snapshot: PathTemplate::new(areas.root(Area::Snapshot), &templates.snapshot)?,
            publish: PathTemplate::new(areas.root(Area::Publish), &templates.publish)?,
            publish_name: PathTemplate::new("", &templates.publish_name)?,
            render: PathTemplate::new(areas.root(Area::Render), &templates.render)?,
            render_publish: PathTemplate::new(
                areas.root(Area::Publish),
                &templates.render_publish,
            )?,
            inputs,
        })
    }
}

pub struct VersionLedger<T, H> {
    db: Database,
    tracker: T,
    host: H,
    config: LedgerConfig,
    templates: LedgerTemplates,
}

impl<T: TrackingSystem, H: HostScene> VersionLedger<T, H> {
    pub fn new(
        db: Database,
        tracker: T,
        host: H,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let templates = LedgerTemplates::resolve(&config)?;
        Ok(Self {
            db,
            tracker,
            host,
            config,
            templates,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn templates(&self) -> &LedgerTemplates {
        &self.templates
    }

    // ============================================================
    // Saving and snapshots
    // ============================================================

    /// Save the scene as the current work file of `name`.
    ///
    /// Creates the work item at version 1 on first save. Never changes the
    /// version and never takes a snapshot.
    pub fn save(&mut self, name: &str) -> Result<WorkItem, LedgerError> {
        validate_name(name)?;

        match self.db.get_work_item(name)? {
            Some(item) => {
                self.host.save_as(Path::new(&item.location))?;
                self.db.touch_work_item(item.id)?;
                debug!("Saved {} v{:03} to {}", item.name, item.version, item.location);
                Ok(item)
            }
            None => self.create_work_item(name),
        }
    }

    /// Save the scene as `name` and keep a timestamped copy in the snapshot
    /// area.
    pub fn snapshot_as(&mut self, name: &str) -> Result<Snapshot, LedgerError> {
        let item = self.save(name)?;
        self.write_snapshot(&item)
    }

    /// Snapshot the work item the open scene belongs to.
    pub fn snapshot(&mut self) -> Result<Snapshot, LedgerError> {
        let item = self.current_work_item()?;
        self.host.save_as(Path::new(&item.location))?;
        self.db.touch_work_item(item.id)?;
        self.write_snapshot(&item)
    }

    /// The work item whose current work file is open in the scene.
    pub fn current_work_item(&self) -> Result<WorkItem, LedgerError> {
        let path = self.host.scene_path().ok_or(LedgerError::NotAWorkFile)?;
        let fields = self
            .templates
            .work
            .get_fields(path)
            .ok_or(LedgerError::NotAWorkFile)?;
        let name = fields.get("name").ok_or(LedgerError::NotAWorkFile)?;
        let item = self
            .db
            .get_work_item(name)?
            .ok_or(LedgerError::NotAWorkFile)?;

        match fields.version() {
            Some(opened) if opened != item.version => Err(LedgerError::StaleWorkFile {
                name: item.name,
                opened,
                current: item.version,
            }),
            _ => Ok(item),
        }
    }

    fn create_work_item(&mut self, name: &str) -> Result<WorkItem, LedgerError> {
        let path = self.work_path(name, 1)?;
        if path.exists() {
            return Err(LedgerError::PathConflict(path));
        }

        self.host.save_as(&path)?;
        let input = CreateWorkItemInput {
            name: name.to_string(),
            location: path_string(&path),
        };
        match self.db.create_work_item(input) {
            Ok(item) => {
                info!("Created work item {} at {}", item.name, item.location);
                Ok(item)
            }
            Err(e) => {
                let _ = fs::remove_file(&path);
                Err(e.into())
            }
        }
    }

    fn write_snapshot(&self, item: &WorkItem) -> Result<Snapshot, LedgerError> {
        let mut timestamp = Utc::now();
        let path = loop {
            let fields = Fields::new()
                .with("name", item.name.as_str())
                .with(TIMESTAMP_KEY, timestamp.format(TIMESTAMP_FORMAT).to_string())
                .with("version", item.version.to_string());
            let path = self.templates.snapshot.apply_fields(&fields)?;

            if !path.exists() {
                break path;
            }
            // Two snapshots within the same millisecond
            if self.db.snapshot_exists_at(&path_string(&path))? {
                timestamp += Duration::milliseconds(1);
                continue;
            }
            return Err(LedgerError::PathConflict(path));
        };

        copy_file(Path::new(&item.location), &path)?;
        let recorded = self
            .db
            .create_snapshot(item.id, item.version, &path_string(&path), timestamp);
        let snapshot = match recorded {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
        };

        info!("Snapshot of {} v{:03} saved to {}", item.name, item.version, snapshot.path);
        Ok(snapshot)
    }

    // ============================================================
    // Views
    // ============================================================

    pub fn work_item(&self, name: &str) -> Result<WorkItem, LedgerError> {
        self.db
            .get_work_item(name)?
            .ok_or_else(|| LedgerError::UnknownWorkItem(name.to_string()))
    }

    pub fn work_items(&self) -> Result<Vec<WorkItem>, LedgerError> {
        Ok(self.db.get_all_work_items()?)
    }

    pub fn publishes(&self, name: &str) -> Result<Vec<Publish>, LedgerError> {
        let item = self.work_item(name)?;
        Ok(self.db.get_publishes(item.id)?)
    }

    pub fn snapshots(&self, name: &str) -> Result<Vec<Snapshot>, LedgerError> {
        let item = self.work_item(name)?;
        Ok(self.db.get_snapshots(item.id)?)
    }

    pub fn renders(&self, name: &str) -> Result<Vec<RenderOutput>, LedgerError> {
        let item = self.work_item(name)?;
        Ok(self.db.get_render_outputs(item.id)?)
    }

    // ============================================================
    // Paths
    // ============================================================

    pub fn work_path(&self, name: &str, version: u32) -> Result<PathBuf, LedgerError> {
        Ok(self.templates.work.apply_fields(&name_fields(name, version))?)
    }

    pub fn publish_path(&self, name: &str, version: u32) -> Result<PathBuf, LedgerError> {
        Ok(self.templates.publish.apply_fields(&name_fields(name, version))?)
    }

    fn publish_name(&self, name: &str, version: u32) -> Result<String, LedgerError> {
        let rendered = self
            .templates
            .publish_name
            .apply_fields(&name_fields(name, version))?;
        Ok(path_string(&rendered))
    }
}

/// Work item names become file names, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_name(name: &str) -> Result<(), LedgerError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(LedgerError::InvalidName(name.to_string()))
    }
}

fn name_fields(name: &str, version: u32) -> Fields {
    Fields::new()
        .with("name", name)
        .with("version", version.to_string())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Copy `from` to `to`, creating the destination directory.
fn copy_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("shotA_comp").is_ok());
        assert!(validate_name("bg-plate_02").is_ok());
        for bad in ["", "shot A", "../up", "shot.v001", "ünï"] {
            assert!(
                matches!(validate_name(bad), Err(LedgerError::InvalidName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
