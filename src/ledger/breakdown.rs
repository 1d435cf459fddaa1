use std::path::Path;

use tracing::{debug, info};

use super::publish::with_seq_token;
use super::{path_string, VersionLedger};
use crate::error::LedgerError;
use crate::host::HostScene;
use crate::models::*;
use crate::templates::{Fields, PathTemplate};
use crate::tracking::TrackingSystem;

impl<T: TrackingSystem, H: HostScene> VersionLedger<T, H> {
    /// Version status of every input node whose path an input template
    /// recognizes. Other nodes are left out.
    pub fn list_dependencies(&self) -> Result<Vec<DependencyStatus>, LedgerError> {
        let mut statuses = Vec::new();
        for node in self.host.list_input_nodes() {
            match self.resolve_input(&node.file) {
                Some((template, fields)) => {
                    if let Some(status) = dependency_status(&node, template, &fields) {
                        statuses.push(status);
                    }
                }
                None => debug!("{} reads {}, not a known area", node.name, node.file),
            }
        }
        Ok(statuses)
    }

    /// Point `node_path` at the latest version available on disk.
    pub fn update_dependency(&mut self, node_path: &str) -> Result<DependencyStatus, LedgerError> {
        let node = self
            .host
            .list_input_nodes()
            .into_iter()
            .find(|n| n.name == node_path)
            .ok_or_else(|| LedgerError::NodeNotFound(node_path.to_string()))?;

        let unrecognized = || LedgerError::UnrecognizedInput {
            node: node.name.clone(),
            path: node.file.clone(),
        };
        let (template, mut fields) = self.resolve_input(&node.file).ok_or_else(unrecognized)?;
        let status = dependency_status(&node, template, &fields).ok_or_else(unrecognized)?;

        if status.is_up_to_date {
            return Err(LedgerError::AlreadyCurrent {
                node: node.name,
                version: status.current_version,
            });
        }

        fields.set_version(status.latest_available_version);
        let path = path_string(&template.apply_fields(&fields)?);
        self.host.rewrite_input_path(&node.name, &path)?;

        info!(
            "{} updated from v{:03} to v{:03}",
            node.name, status.current_version, status.latest_available_version
        );
        Ok(DependencyStatus {
            node_path: node.name,
            path,
            current_version: status.latest_available_version,
            latest_available_version: status.latest_available_version,
            is_up_to_date: true,
        })
    }

    /// Recognized input paths of the scene, frame tokens normalized to
    /// `%04d`.
    pub(super) fn dependency_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for node in self.host.list_input_nodes() {
            let Some((template, fields)) = self.resolve_input(&node.file) else {
                continue;
            };
            if let Ok(path) = template.apply_fields(&with_seq_token(fields)) {
                let path = path_string(&path);
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// The first input template that parses `file` with a version.
    fn resolve_input(&self, file: &str) -> Option<(&PathTemplate, Fields)> {
        self.templates.inputs.iter().find_map(|template| {
            let fields = template.get_fields(Path::new(file))?;
            fields.version()?;
            Some((template, fields))
        })
    }
}

fn dependency_status(
    node: &InputNode,
    template: &PathTemplate,
    fields: &Fields,
) -> Option<DependencyStatus> {
    let current = fields.version()?;
    let latest = template
        .find_versions(fields)
        .into_iter()
        .max()
        .map_or(current, |found| found.max(current));

    Some(DependencyStatus {
        node_path: node.name.clone(),
        path: node.file.clone(),
        current_version: current,
        latest_available_version: latest,
        is_up_to_date: latest <= current,
    })
}
