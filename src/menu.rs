//! Menu actions.
//!
//! Every command the ledger offers has a stable [`ActionId`]. The menu
//! configuration refers to commands by display name and app instance;
//! [`MenuRegistry::resolve`] turns it into favourites, context-menu entries
//! and one submenu per app instance, and dispatches invocations to the
//! action handlers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{LedgerConfig, MenuEntry};
use crate::error::LedgerError;
use crate::host::HostScene;
use crate::ledger::VersionLedger;
use crate::models::{PublishRequest, SHOT_ENTITY};
use crate::tracking::TrackingSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionId {
    SnapshotAs,
    Snapshot,
    Save,
    Publish,
    SyncFrameRange,
    SceneBreakdown,
    UpdateDependency,
}

impl ActionId {
    pub const ALL: [ActionId; 7] = [
        Self::SnapshotAs,
        Self::Snapshot,
        Self::Save,
        Self::Publish,
        Self::SyncFrameRange,
        Self::SceneBreakdown,
        Self::UpdateDependency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnapshotAs => "snapshot_as",
            Self::Snapshot => "snapshot",
            Self::Save => "save",
            Self::Publish => "publish",
            Self::SyncFrameRange => "sync_frame_range",
            Self::SceneBreakdown => "scene_breakdown",
            Self::UpdateDependency => "update_dependency",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }

    /// Menu label, as referenced by the menu configuration.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SnapshotAs => "Snapshot As...",
            Self::Snapshot => "Snapshot",
            Self::Save => "Save",
            Self::Publish => "Publish...",
            Self::SyncFrameRange => "Sync Frame Range",
            Self::SceneBreakdown => "Scene Breakdown...",
            Self::UpdateDependency => "Update Dependency",
        }
    }

    pub fn app_instance(&self) -> &'static str {
        match self {
            Self::SnapshotAs | Self::Snapshot | Self::Save => "workfiles",
            Self::Publish => "publish",
            Self::SyncFrameRange => "setframerange",
            Self::SceneBreakdown | Self::UpdateDependency => "breakdown",
        }
    }

    /// Actions that cannot run without a target: a work item name or a node.
    fn needs_target(&self) -> bool {
        matches!(self, Self::SnapshotAs | Self::UpdateDependency)
    }

    fn for_entry(entry: &MenuEntry) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.display_name() == entry.name && id.app_instance() == entry.app_instance)
    }

    pub fn handler<T: TrackingSystem, H: HostScene>(&self) -> Handler<T, H> {
        match self {
            Self::SnapshotAs => snapshot_as::<T, H>,
            Self::Snapshot => snapshot::<T, H>,
            Self::Save => save::<T, H>,
            Self::Publish => publish::<T, H>,
            Self::SyncFrameRange => sync_frame_range::<T, H>,
            Self::SceneBreakdown => scene_breakdown::<T, H>,
            Self::UpdateDependency => update_dependency::<T, H>,
        }
    }
}

/// An action handler. Returns the message shown to the user.
pub type Handler<T, H> = fn(&mut VersionLedger<T, H>, &Invocation) -> Result<String, LedgerError>;

/// Arguments of one menu invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invocation {
    /// The selected target: a work item, a shot or a node, depending on the
    /// action.
    pub selection: Option<String>,
    /// Publish description.
    pub description: Option<String>,
}

impl Invocation {
    pub fn with_selection(selection: impl Into<String>) -> Self {
        Self {
            selection: Some(selection.into()),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuCommand {
    pub action: ActionId,
    pub name: String,
    pub app_instance: String,
    pub requires_selection: bool,
}

impl MenuCommand {
    fn new(action: ActionId, requires_selection: bool) -> Self {
        Self {
            action,
            name: action.display_name().to_string(),
            app_instance: action.app_instance().to_string(),
            requires_selection: requires_selection || action.needs_target(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppMenu {
    pub app_instance: String,
    pub commands: Vec<MenuCommand>,
}

/// A shortcut directory offered next to the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryShortcut {
    pub name: String,
    pub path: PathBuf,
}

/// The resolved menu.
#[derive(Debug, Clone, Serialize)]
pub struct MenuRegistry {
    pub context_label: String,
    pub favourites: Vec<MenuCommand>,
    pub context_menu: Vec<MenuCommand>,
    /// The project root first, then the configured favourite directories.
    pub directories: Vec<DirectoryShortcut>,
    /// Submenus sorted by app instance.
    pub apps: Vec<AppMenu>,
    #[serde(skip)]
    selection_required: BTreeSet<ActionId>,
}

impl MenuRegistry {
    pub fn resolve(config: &LedgerConfig) -> Self {
        let mut selection_required: BTreeSet<ActionId> =
            ActionId::ALL.into_iter().filter(ActionId::needs_target).collect();
        let mut favourites_only = BTreeSet::new();

        let mut resolve_entries = |entries: &[MenuEntry], section: &str| -> Vec<MenuCommand> {
            let mut commands = Vec::new();
            for entry in entries {
                let Some(action) = ActionId::for_entry(entry) else {
                    warn!(
                        "Unknown {} entry {:?} of app {:?}, skipping",
                        section, entry.name, entry.app_instance
                    );
                    continue;
                };
                if entry.requires_selection {
                    selection_required.insert(action);
                }
                commands.push(MenuCommand::new(action, entry.requires_selection));
            }
            commands
        };

        let favourites = resolve_entries(&config.menu_favourites, "favourite");
        let context_menu = resolve_entries(&config.context_menu, "context menu");

        for (entry, command) in config
            .menu_favourites
            .iter()
            .filter(|entry| ActionId::for_entry(entry).is_some())
            .zip(&favourites)
        {
            if !entry.keep_in_menu {
                favourites_only.insert(command.action);
            }
        }

        let mut grouped: BTreeMap<&str, Vec<MenuCommand>> = BTreeMap::new();
        for action in ActionId::ALL {
            if favourites_only.contains(&action) {
                continue;
            }
            grouped
                .entry(action.app_instance())
                .or_default()
                .push(MenuCommand::new(action, selection_required.contains(&action)));
        }
        let apps = grouped
            .into_iter()
            .map(|(app_instance, commands)| AppMenu {
                app_instance: app_instance.to_string(),
                commands,
            })
            .collect();

        let directories = config
            .resolved_favourites()
            .into_iter()
            .map(|(name, path)| DirectoryShortcut { name, path })
            .collect();

        Self {
            context_label: config.context.label(),
            favourites,
            context_menu,
            directories,
            apps,
            selection_required,
        }
    }

    pub fn requires_selection(&self, action: ActionId) -> bool {
        self.selection_required.contains(&action)
    }

    /// Run the action registered as `id`.
    pub fn invoke<T: TrackingSystem, H: HostScene>(
        &self,
        ledger: &mut VersionLedger<T, H>,
        id: &str,
        invocation: &Invocation,
    ) -> Result<String, LedgerError> {
        let action =
            ActionId::from_str(id).ok_or_else(|| LedgerError::UnknownAction(id.to_string()))?;

        if self.requires_selection(action) && selection(invocation).is_none() {
            return Err(LedgerError::SelectionRequired(id.to_string()));
        }

        tracing::debug!("Invoking {}", id);
        (action.handler::<T, H>())(ledger, invocation)
    }

    /// Text rendering of the menu.
    ///
    /// ```text
    /// [Shot shot042]
    /// ├── ★ Snapshot As...
    /// ├── ★ Publish...
    /// ├── Directories
    /// │   └── Current Project: project
    /// └── workfiles
    ///     ├── Snapshot As...
    ///     └── Save
    /// ```
    pub fn render(&self) -> String {
        let mut items: Vec<(String, Vec<String>)> = Vec::new();
        for command in &self.favourites {
            items.push((format!("★ {}", command_label(command)), Vec::new()));
        }
        if !self.context_menu.is_empty() {
            let labels = self.context_menu.iter().map(command_label).collect();
            items.push(("Context".to_string(), labels));
        }
        if !self.directories.is_empty() {
            let labels = self
                .directories
                .iter()
                .map(|dir| format!("{}: {}", dir.name, dir.path.display()))
                .collect();
            items.push(("Directories".to_string(), labels));
        }
        for app in &self.apps {
            let labels = app.commands.iter().map(command_label).collect();
            items.push((app.app_instance.clone(), labels));
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", self.context_label);
        for (i, (label, children)) in items.iter().enumerate() {
            let is_last = i == items.len() - 1;
            let branch = if is_last { "└── " } else { "├── " };
            let _ = writeln!(output, "{}{}", branch, label);

            let prefix = if is_last { "    " } else { "│   " };
            for (j, child) in children.iter().enumerate() {
                let child_branch = if j == children.len() - 1 { "└── " } else { "├── " };
                let _ = writeln!(output, "{}{}{}", prefix, child_branch, child);
            }
        }
        output
    }
}

fn command_label(command: &MenuCommand) -> String {
    format!("{} ({})", command.name, command.action.as_str())
}

fn selection(invocation: &Invocation) -> Option<&str> {
    invocation
        .selection
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn require_selection<'a>(
    invocation: &'a Invocation,
    action: ActionId,
) -> Result<&'a str, LedgerError> {
    selection(invocation)
        .ok_or_else(|| LedgerError::SelectionRequired(action.as_str().to_string()))
}

/// The selected work item, or the one open in the scene.
fn target_item<T: TrackingSystem, H: HostScene>(
    ledger: &VersionLedger<T, H>,
    invocation: &Invocation,
) -> Result<String, LedgerError> {
    match selection(invocation) {
        Some(name) => Ok(name.to_string()),
        None => Ok(ledger.current_work_item()?.name),
    }
}

// ============================================================
// Handlers
// ============================================================

fn snapshot_as<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    invocation: &Invocation,
) -> Result<String, LedgerError> {
    let name = require_selection(invocation, ActionId::SnapshotAs)?;
    let snapshot = ledger.snapshot_as(name)?;
    Ok(format!("Snapshot saved to {}", snapshot.path))
}

fn snapshot<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    _invocation: &Invocation,
) -> Result<String, LedgerError> {
    let snapshot = ledger.snapshot()?;
    Ok(format!("Snapshot saved to {}", snapshot.path))
}

fn save<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    invocation: &Invocation,
) -> Result<String, LedgerError> {
    let name = target_item(ledger, invocation)?;
    let item = ledger.save(&name)?;
    Ok(format!("Saved {} v{:03} to {}", item.name, item.version, item.location))
}

fn publish<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    invocation: &Invocation,
) -> Result<String, LedgerError> {
    let name = target_item(ledger, invocation)?;
    let description = invocation.description.clone().unwrap_or_default();
    let result = ledger.publish(&name, PublishRequest::new(description))?;

    let mut message = format!(
        "Published {} v{:03} to {}, now working on v{:03}",
        name, result.publish.version, result.publish.path, result.work_item.version
    );
    if !result.renders.is_empty() {
        let _ = write!(message, " ({} render(s) published)", result.renders.len());
    }
    Ok(message)
}

fn sync_frame_range<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    invocation: &Invocation,
) -> Result<String, LedgerError> {
    let context = &ledger.config().context;
    let context_shot = match (&context.entity_type, &context.entity_code) {
        (Some(entity_type), Some(code)) if entity_type == SHOT_ENTITY => Some(code.clone()),
        _ => None,
    };
    let shot = match selection(invocation) {
        Some(shot) => shot.to_string(),
        None => context_shot.ok_or_else(|| {
            LedgerError::SelectionRequired(ActionId::SyncFrameRange.as_str().to_string())
        })?,
    };

    let sync = ledger.sync_frame_range(&shot)?;
    if sync.changed {
        Ok(format!(
            "Frame range changed from {}-{} to {}-{}",
            sync.previous.first, sync.previous.last, sync.current.first, sync.current.last
        ))
    } else {
        Ok(format!(
            "Frame range already matches {}: {}-{}",
            shot, sync.current.first, sync.current.last
        ))
    }
}

fn scene_breakdown<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    _invocation: &Invocation,
) -> Result<String, LedgerError> {
    let statuses = ledger.list_dependencies()?;
    if statuses.is_empty() {
        return Ok("No versioned inputs in the scene".to_string());
    }

    let mut message = String::new();
    for status in &statuses {
        let state = if status.is_up_to_date {
            "up to date".to_string()
        } else {
            format!("v{:03} available", status.latest_available_version)
        };
        let _ = writeln!(
            message,
            "{}  v{:03}  {}  {}",
            status.node_path, status.current_version, state, status.path
        );
    }
    Ok(message.trim_end().to_string())
}

fn update_dependency<T: TrackingSystem, H: HostScene>(
    ledger: &mut VersionLedger<T, H>,
    invocation: &Invocation,
) -> Result<String, LedgerError> {
    let node = require_selection(invocation, ActionId::UpdateDependency)?;
    let status = ledger.update_dependency(node)?;
    Ok(format!(
        "{} now reads v{:03}: {}",
        status.node_path, status.current_version, status.path
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Area, FavouriteDirectory};

    #[test]
    fn test_action_ids_round_trip() {
        for action in ActionId::ALL {
            assert_eq!(ActionId::from_str(action.as_str()), Some(action));
        }
        assert_eq!(ActionId::from_str("version_up"), None);
    }

    #[test]
    fn test_default_menu() {
        let registry = MenuRegistry::resolve(&LedgerConfig::default());

        let favourites: Vec<ActionId> = registry.favourites.iter().map(|c| c.action).collect();
        assert_eq!(favourites, vec![ActionId::SnapshotAs, ActionId::Publish]);
        assert_eq!(registry.context_label, "[demo]");

        let apps: Vec<&str> = registry.apps.iter().map(|a| a.app_instance.as_str()).collect();
        assert_eq!(apps, vec!["breakdown", "publish", "setframerange", "workfiles"]);
    }

    #[test]
    fn test_unknown_entries_are_skipped() {
        let mut config = LedgerConfig::default();
        config.menu_favourites.push(MenuEntry::new("Launch Photoshop", "photoshop"));
        config.context_menu.push(MenuEntry::new("Scene Breakdown...", "breakdown"));

        let registry = MenuRegistry::resolve(&config);
        assert_eq!(registry.favourites.len(), 2);
        assert_eq!(registry.context_menu.len(), 1);
        assert_eq!(registry.context_menu[0].action, ActionId::SceneBreakdown);
    }

    #[test]
    fn test_favourites_can_leave_the_app_menu() {
        let mut config = LedgerConfig::default();
        config.menu_favourites = vec![MenuEntry {
            keep_in_menu: false,
            ..MenuEntry::new("Publish...", "publish")
        }];

        let registry = MenuRegistry::resolve(&config);
        assert_eq!(registry.favourites.len(), 1);
        assert!(registry.apps.iter().all(|a| a.app_instance != "publish"));
    }

    #[test]
    fn test_selection_flags() {
        let mut config = LedgerConfig::default();
        config.context_menu = vec![MenuEntry {
            requires_selection: true,
            ..MenuEntry::new("Save", "workfiles")
        }];

        let registry = MenuRegistry::resolve(&config);
        assert!(registry.requires_selection(ActionId::Save));
        assert!(registry.requires_selection(ActionId::UpdateDependency));
        assert!(!registry.requires_selection(ActionId::Snapshot));
    }

    #[test]
    fn test_render_lists_every_section() {
        let registry = MenuRegistry::resolve(&LedgerConfig::default());
        let text = registry.render();

        assert!(text.starts_with("[demo]\n"));
        assert!(text.contains("├── ★ Snapshot As... (snapshot_as)"));
        assert!(text.contains("└── workfiles"));
        assert!(text.contains("    └── Save (save)"));
        assert!(text.contains("├── Directories\n│   └── Current Project: project\n"));
    }

    #[test]
    fn test_directories_start_with_the_project_root() {
        let mut config = LedgerConfig::default();
        config.favourite_directories.push(FavouriteDirectory {
            display_name: "Publishes".to_string(),
            template_directory: Area::Publish,
            icon: None,
        });

        let registry = MenuRegistry::resolve(&config);
        let names: Vec<&str> = registry.directories.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Current Project", "Publishes"]);
        assert_eq!(registry.directories[1].path, PathBuf::from("project/publish"));
        assert!(registry.render().contains("│   └── Publishes: project/publish\n"));
    }
}
