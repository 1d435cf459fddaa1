use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{path_string, VersionLedger};
use crate::db::PublishCommit;
use crate::error::LedgerError;
use crate::host::HostScene;
use crate::models::*;
use crate::templates::{Fields, SEQ_KEY};
use crate::tracking::TrackingSystem;

/// Frames of one render and where they go when published.
struct RenderPlan {
    render: RenderOutput,
    /// Source frame and publish target, per frame.
    frames: Vec<(PathBuf, PathBuf)>,
    /// Frame pattern of the published sequence.
    publish_pattern: String,
}

/// Undoes the side effects of a publish that did not commit.
///
/// Files, directories and tracking records are registered as they are
/// created. Unless [`PublishRollback::commit`] is called, dropping the guard
/// removes them in reverse order.
struct PublishRollback<'a, T: TrackingSystem> {
    tracker: &'a T,
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    records: Vec<(&'static str, Uuid)>,
    committed: bool,
}

impl<'a, T: TrackingSystem> PublishRollback<'a, T> {
    fn new(tracker: &'a T) -> Self {
        Self {
            tracker,
            files: Vec::new(),
            dirs: Vec::new(),
            records: Vec::new(),
            committed: false,
        }
    }

    /// Copy `from` to `to`, remembering the file and any directory created
    /// for it.
    fn copy(&mut self, from: &Path, to: &Path) -> std::io::Result<()> {
        if let Some(parent) = to.parent() {
            let mut missing: Vec<PathBuf> = parent
                .ancestors()
                .take_while(|dir| !dir.as_os_str().is_empty() && !dir.exists())
                .map(Path::to_path_buf)
                .collect();
            fs::create_dir_all(parent)?;
            // Outermost first, the order they are created in
            missing.reverse();
            self.dirs.extend(missing);
        }
        fs::copy(from, to)?;
        self.files.push(to.to_path_buf());
        Ok(())
    }

    fn record(&mut self, entity_type: &'static str, id: Uuid) {
        self.records.push((entity_type, id));
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<T: TrackingSystem> Drop for PublishRollback<'_, T> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        for (entity_type, id) in self.records.iter().rev() {
            if let Err(e) = self.tracker.retire_record(entity_type, *id) {
                error!("Failed to retire {} record {}: {}", entity_type, id, e);
            }
        }
        for file in self.files.iter().rev() {
            if let Err(e) = fs::remove_file(file) {
                warn!("Failed to remove {}: {}", file.display(), e);
            }
        }
        for dir in self.dirs.iter().rev() {
            // Only empty directories go; anything else was not ours
            let _ = fs::remove_dir(dir);
        }

        warn!(
            "Rolled back publish: {} file(s), {} record(s)",
            self.files.len(),
            self.records.len()
        );
    }
}

impl<T: TrackingSystem, H: HostScene> VersionLedger<T, H> {
    /// Publish the current version of `name`.
    ///
    /// Copies the work file (and optionally the renders at this version) to
    /// the publish area, registers them with the tracker and moves the work
    /// item to the next version. Each published render also gets a review
    /// version record. Either all of it happens or none of it.
    pub fn publish(
        &mut self,
        name: &str,
        request: PublishRequest,
    ) -> Result<PublishResult, LedgerError> {
        let item = self.work_item(name)?;
        let version = item.version;
        let work_path = PathBuf::from(&item.location);
        let publish_path = self.publish_path(name, version)?;
        let next_work_path = self.work_path(name, version + 1)?;

        for target in [&publish_path, &next_work_path] {
            if target.exists() {
                return Err(LedgerError::PathConflict(target.clone()));
            }
        }

        let plans = if request.include_renders {
            self.render_plans(&item)?
        } else {
            Vec::new()
        };
        for (_, target) in plans.iter().flat_map(|plan| &plan.frames) {
            if target.exists() {
                return Err(LedgerError::PathConflict(target.clone()));
            }
        }

        let publish_name = self.publish_name(name, version)?;
        let dependency_paths = self.dependency_paths();
        let entity = self.config.context.entity();
        let task = request.task.or_else(|| self.config.context.task.clone());
        let publish_type = request
            .publish_type
            .unwrap_or_else(|| self.config.publish_type.clone());

        info!("Publishing {} v{:03}", name, version);
        self.host.save_as(&work_path)?;

        let mut rollback = PublishRollback::new(&self.tracker);
        rollback.copy(&work_path, &publish_path)?;
        for (source, target) in plans.iter().flat_map(|plan| &plan.frames) {
            rollback.copy(source, target)?;
        }

        let script = NewRecord::new(PUBLISHED_FILE_ENTITY, publish_name.as_str())
            .field("path", path_string(&publish_path))
            .field("version_number", version)
            .field("description", request.description.as_str())
            .field("published_file_type", publish_type.as_str())
            .field("entity", entity_json(&entity))
            .field("task", task.clone())
            .field("dependency_paths", dependency_paths.clone());
        let script_record = self
            .tracker
            .create_record(script)
            .map_err(LedgerError::RegistrationFailure)?;
        rollback.record(PUBLISHED_FILE_ENTITY, script_record.id);

        let mut renders = Vec::with_capacity(plans.len());
        for plan in plans {
            let description = match plan.render.comment.as_deref() {
                Some(comment) if !comment.trim().is_empty() => {
                    format!("{} - {}", request.description, comment)
                }
                _ => request.description.clone(),
            };
            let record = NewRecord::new(
                PUBLISHED_FILE_ENTITY,
                format!("{}_{}", name, plan.render.channel),
            )
            .field("path", plan.publish_pattern.as_str())
            .field("version_number", plan.render.version)
            .field("description", description.as_str())
            .field("published_file_type", self.config.render_publish_type.as_str())
            .field("entity", entity_json(&entity))
            .field("task", task.clone())
            .field("dependency_paths", vec![path_string(&publish_path)]);
            let record = self
                .tracker
                .create_record(record)
                .map_err(LedgerError::RegistrationFailure)?;
            rollback.record(PUBLISHED_FILE_ENTITY, record.id);

            let review = NewRecord::new(
                VERSION_ENTITY,
                format!("{}_{}.v{:03}", name, plan.render.channel, plan.render.version),
            )
            .field("description", description)
            .field("entity", entity_json(&entity))
            .field("task", task.clone())
            .field("published_file", record.id.to_string())
            .field("path_to_frames", plan.publish_pattern.as_str());
            let review = self
                .tracker
                .create_record(review)
                .map_err(LedgerError::RegistrationFailure)?;
            rollback.record(VERSION_ENTITY, review.id);

            renders.push(RenderOutput {
                published_path: Some(plan.publish_pattern),
                record_id: Some(record.id),
                ..plan.render
            });
        }

        rollback.copy(&work_path, &next_work_path)?;

        let publish = Publish {
            id: Uuid::new_v4(),
            work_item_id: item.id,
            name: publish_name,
            version,
            path: path_string(&publish_path),
            entity,
            task,
            description: request.description,
            publish_type,
            dependency_paths,
            record_id: script_record.id,
            created_at: Utc::now(),
        };
        let next_location = path_string(&next_work_path);
        let work_item = self.db.commit_publish(PublishCommit {
            publish: &publish,
            next_location: &next_location,
            renders: &renders,
        })?;
        rollback.commit();

        // The next work file is already on disk, the scene only follows it
        if let Err(e) = self.host.save_as(&next_work_path) {
            warn!(
                "Published, but could not reopen the scene as {}: {}",
                next_location, e
            );
        }

        info!(
            "Published {} v{:03} to {}, now at v{:03}",
            name, version, publish.path, work_item.version
        );
        Ok(PublishResult {
            publish,
            renders,
            work_item,
        })
    }

    /// Renders at the item's current version that have frames on disk.
    fn render_plans(&self, item: &WorkItem) -> Result<Vec<RenderPlan>, LedgerError> {
        let mut plans = Vec::new();

        for render in self.db.get_render_outputs_at(item.id, item.version)? {
            let pattern = Path::new(&render.path_pattern);
            let Some(fields) = self.templates.render.get_fields(pattern) else {
                warn!(
                    "Render {} of {} no longer matches the render template, skipping",
                    render.node, item.name
                );
                continue;
            };

            let mut frames = Vec::new();
            for (source, frame_fields) in self.templates.render.find_files(&fields, &[SEQ_KEY]) {
                let target = self.templates.render_publish.apply_fields(&frame_fields)?;
                frames.push((source, target));
            }
            if frames.is_empty() {
                warn!(
                    "Render {} of {} has no frames on disk, skipping",
                    render.node, item.name
                );
                continue;
            }

            let publish_pattern = self
                .templates
                .render_publish
                .apply_fields(&with_seq_token(fields))?;
            plans.push(RenderPlan {
                render,
                frames,
                publish_pattern: path_string(&publish_pattern),
            });
        }

        Ok(plans)
    }
}

fn entity_json(entity: &EntityRef) -> serde_json::Value {
    json!({ "type": entity.entity_type, "code": entity.code })
}

pub(super) fn with_seq_token(mut fields: Fields) -> Fields {
    if fields.get(SEQ_KEY).is_some() {
        fields.set(SEQ_KEY, "%04d");
    }
    fields
}
