//! Ledger configuration.
//!
//! Read from `<config dir>/shot-ledger/config.yml` unless a path is given.
//! Every option has a default, so a missing file yields a working setup
//! rooted at `./project`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::EntityRef;

const APP_NAME: &str = "shot-ledger";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    pub debug_logging: bool,
    /// Commands pinned to the top of the main menu.
    pub menu_favourites: Vec<MenuEntry>,
    /// Commands listed under the context menu.
    pub context_menu: Vec<MenuEntry>,
    /// Shortcut directories shown in file dialogs.
    pub favourite_directories: Vec<FavouriteDirectory>,
    /// Display name of the project root shortcut.
    pub project_favourite_name: String,
    /// Host major version from which untested-version warnings become dialogs.
    pub compatibility_dialog_min_version: u32,
    /// Version of the running host, e.g. `13.2v4`.
    pub host_version: Option<String>,
    pub areas: Areas,
    pub templates: Templates,
    pub context: ContextConfig,
    pub tracking: TrackingConfig,
    /// Published file type of scene publishes.
    pub publish_type: String,
    /// Published file type of render publishes.
    pub render_publish_type: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            menu_favourites: vec![
                MenuEntry::new("Snapshot As...", "workfiles"),
                MenuEntry::new("Publish...", "publish"),
            ],
            context_menu: Vec::new(),
            favourite_directories: Vec::new(),
            project_favourite_name: "Current Project".to_string(),
            compatibility_dialog_min_version: 16,
            host_version: None,
            areas: Areas::default(),
            templates: Templates::default(),
            context: ContextConfig::default(),
            tracking: TrackingConfig::default(),
            publish_type: "Nuke Script".to_string(),
            render_publish_type: "Rendered Image".to_string(),
        }
    }
}

/// A command reference in the menu configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuEntry {
    /// Display name of the command, e.g. `Publish...`.
    pub name: String,
    /// App instance the command belongs to, e.g. `publish`.
    pub app_instance: String,
    /// Also list the command in its app submenu.
    #[serde(default = "default_true")]
    pub keep_in_menu: bool,
    /// The command operates on a selected node or shot.
    #[serde(default)]
    pub requires_selection: bool,
}

impl MenuEntry {
    pub fn new(name: impl Into<String>, app_instance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            app_instance: app_instance.into(),
            keep_in_menu: true,
            requires_selection: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavouriteDirectory {
    pub display_name: String,
    /// Area the shortcut points at.
    pub template_directory: Area,
    #[serde(default)]
    pub icon: Option<String>,
}

/// The storage areas of a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Project,
    Work,
    Snapshot,
    Publish,
    Render,
}

/// Area roots. Unset roots live below `project_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Areas {
    pub project_root: PathBuf,
    pub work_root: Option<PathBuf>,
    pub snapshot_root: Option<PathBuf>,
    pub publish_root: Option<PathBuf>,
    pub render_root: Option<PathBuf>,
}

impl Default for Areas {
    fn default() -> Self {
        Self::under(PathBuf::from("project"))
    }
}

impl Areas {
    /// All areas in their default place below `project_root`.
    pub fn under(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            work_root: None,
            snapshot_root: None,
            publish_root: None,
            render_root: None,
        }
    }

    pub fn root(&self, area: Area) -> PathBuf {
        let (explicit, dir) = match area {
            Area::Project => return self.project_root.clone(),
            Area::Work => (&self.work_root, "work"),
            Area::Snapshot => (&self.snapshot_root, "snapshots"),
            Area::Publish => (&self.publish_root, "publish"),
            Area::Render => (&self.render_root, "renders"),
        };
        explicit
            .clone()
            .unwrap_or_else(|| self.project_root.join(dir))
    }
}

/// Path patterns, relative to their area root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub work: String,
    pub snapshot: String,
    pub publish: String,
    /// Code of the publish record.
    pub publish_name: String,
    pub render: String,
    pub render_publish: String,
    /// Patterns the scene breakdown recognizes input paths by.
    pub inputs: Vec<InputTemplate>,
}

impl Default for Templates {
    fn default() -> Self {
        let render_publish =
            "renders/{name}/{channel}/v{version}/{name}_{channel}.v{version}.{SEQ}.exr";
        Self {
            work: "{name}/{name}.v{version}.nk".to_string(),
            snapshot: "{name}/{name}.v{version}.{timestamp}.nk".to_string(),
            publish: "scenes/{name}.v{version}.nk".to_string(),
            publish_name: "{name}".to_string(),
            render: "{name}/{channel}/v{version}/{name}_{channel}.v{version}.{SEQ}.exr".to_string(),
            render_publish: render_publish.to_string(),
            inputs: vec![
                InputTemplate {
                    area: Area::Publish,
                    pattern: render_publish.to_string(),
                },
                InputTemplate {
                    area: Area::Publish,
                    pattern: "elements/{element}/v{version}/{element}.{SEQ}.exr".to_string(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputTemplate {
    pub area: Area,
    pub pattern: String,
}

/// The tracking context work happens in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub project: String,
    pub entity_type: Option<String>,
    pub entity_code: Option<String>,
    pub task: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            project: "demo".to_string(),
            entity_type: None,
            entity_code: None,
            task: None,
        }
    }
}

impl ContextConfig {
    /// The entity publishes link to. Falls back to the project.
    pub fn entity(&self) -> EntityRef {
        match (&self.entity_type, &self.entity_code) {
            (Some(t), Some(c)) => EntityRef::new(t.clone(), c.clone()),
            _ => EntityRef::new("Project", self.project.clone()),
        }
    }

    /// Menu label: `[project]`, `[Shot shot042]` or `Comp, Shot shot042`.
    pub fn label(&self) -> String {
        match (&self.entity_type, &self.entity_code, &self.task) {
            (Some(t), Some(c), Some(task)) => format!("{}, {} {}", task, t, c),
            (Some(t), Some(c), None) => format!("[{} {}]", t, c),
            _ => format!("[{}]", self.project),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Base URL of a remote tracking service. Unset uses the local database.
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Ledger database path. Unset uses the platform data directory.
    pub database: Option<PathBuf>,
}

impl LedgerConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (get_config_path()?, false),
        };

        if !config_path.exists() {
            if explicit {
                anyhow::bail!("Config file {} does not exist", config_path.display());
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// File dialog shortcuts: the project root first, then the configured
    /// directories.
    pub fn resolved_favourites(&self) -> Vec<(String, PathBuf)> {
        let mut favourites = vec![(
            self.project_favourite_name.clone(),
            self.areas.root(Area::Project),
        )];
        favourites.extend(
            self.favourite_directories
                .iter()
                .map(|f| (f.display_name.clone(), self.areas.root(f.template_directory))),
        );
        favourites
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let mut path =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = LedgerConfig::from_yaml("{}").unwrap();
        assert!(!config.debug_logging);
        assert_eq!(config.menu_favourites.len(), 2);
        assert_eq!(config.compatibility_dialog_min_version, 16);
        assert_eq!(config.areas.root(Area::Work), PathBuf::from("project/work"));
    }

    #[test]
    fn test_menu_entries_default_flags() {
        let config = LedgerConfig::from_yaml(
            "menu_favourites:\n  - name: Publish...\n    app_instance: publish\n",
        )
        .unwrap();
        let entry = &config.menu_favourites[0];
        assert!(entry.keep_in_menu);
        assert!(!entry.requires_selection);
    }

    #[test]
    fn test_explicit_area_roots_win() {
        let config = LedgerConfig::from_yaml(
            "areas:\n  project_root: /mnt/show\n  publish_root: /mnt/publish\n",
        )
        .unwrap();
        assert_eq!(config.areas.root(Area::Publish), PathBuf::from("/mnt/publish"));
        assert_eq!(config.areas.root(Area::Render), PathBuf::from("/mnt/show/renders"));
    }

    #[test]
    fn test_context_labels() {
        let mut context = ContextConfig::default();
        assert_eq!(context.label(), "[demo]");
        context.entity_type = Some("Shot".to_string());
        context.entity_code = Some("shot042".to_string());
        assert_eq!(context.label(), "[Shot shot042]");
        context.task = Some("Comp".to_string());
        assert_eq!(context.label(), "Comp, Shot shot042");
        assert_eq!(context.entity(), EntityRef::new("Shot", "shot042"));
    }

    #[test]
    fn test_favourites_start_with_project() {
        let mut config = LedgerConfig::default();
        config.favourite_directories.push(FavouriteDirectory {
            display_name: "Publishes".to_string(),
            template_directory: Area::Publish,
            icon: None,
        });
        let favourites = config.resolved_favourites();
        assert_eq!(favourites[0].0, "Current Project");
        assert_eq!(favourites[1], ("Publishes".to_string(), PathBuf::from("project/publish")));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");
        let mut config = LedgerConfig::default();
        config.debug_logging = true;
        config.save(&path).unwrap();

        let loaded = LedgerConfig::load(Some(&path)).unwrap();
        assert!(loaded.debug_logging);
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LedgerConfig::load(Some(&dir.path().join("missing.yml"))).is_err());
    }
}
