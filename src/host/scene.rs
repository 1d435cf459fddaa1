use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{HostError, HostScene};
use crate::models::{FrameRange, InputNode};

/// Node classes whose `file` is an input dependency.
pub const INPUT_NODE_CLASSES: &[&str] = &["Read", "ReadGeo2", "Camera2", "DeepRead"];

/// A node in a scene document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneNode {
    pub name: String,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl SceneNode {
    pub fn read(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: "Read".to_string(),
            file: Some(file.into()),
        }
    }

    pub fn write(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: "Write".to_string(),
            file: None,
        }
    }

    fn is_input(&self) -> bool {
        self.file.is_some() && INPUT_NODE_CLASSES.contains(&self.class.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct SceneDocument {
    #[serde(default)]
    frame_range: FrameRange,
    #[serde(default)]
    nodes: Vec<SceneNode>,
}

/// A scene kept as a JSON document on disk.
///
/// Edits happen in memory; [`HostScene::save_as`] writes the document out.
#[derive(Debug, Clone, Default)]
pub struct SceneFile {
    path: Option<PathBuf>,
    doc: SceneDocument,
    /// Edited since it was opened or last saved.
    modified: bool,
}

impl SceneFile {
    /// An untitled, empty scene.
    pub fn untitled() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        let content = fs::read_to_string(&path).map_err(|source| HostError::Io {
            path: path.clone(),
            source,
        })?;
        let doc = serde_json::from_str(&content).map_err(|source| HostError::Parse {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path: Some(path),
            doc,
            modified: false,
        })
    }

    /// The scene a command works on.
    ///
    /// An explicit path must exist. Without one, the work file at
    /// `work_location` is opened when there is one, so saving over it keeps
    /// its content. Only when neither exists does the command start from an
    /// untitled scene.
    pub fn resolve(
        explicit: Option<PathBuf>,
        work_location: Option<&Path>,
    ) -> Result<Self, HostError> {
        match (explicit, work_location) {
            (Some(path), _) if !path.exists() => Err(HostError::SceneMissing(path)),
            (Some(path), _) => Self::open(path),
            (None, Some(location)) if location.exists() => Self::open(location),
            _ => Ok(Self::untitled()),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.doc.nodes
    }

    pub fn add_node(&mut self, node: SceneNode) {
        self.doc.nodes.push(node);
    }

    pub fn with_node(mut self, node: SceneNode) -> Self {
        self.add_node(node);
        self
    }

    pub fn with_frame_range(mut self, range: FrameRange) -> Self {
        self.doc.frame_range = range;
        self
    }
}

impl HostScene for SceneFile {
    fn scene_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn save_as(&mut self, path: &Path) -> Result<(), HostError> {
        let io_err = |source| HostError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(&self.doc).map_err(|source| HostError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)?;

        tracing::debug!("Saved scene to {}", path.display());
        self.path = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    fn current_frame_range(&self) -> FrameRange {
        self.doc.frame_range
    }

    fn set_frame_range(&mut self, range: FrameRange) -> Result<(), HostError> {
        if range.first > range.last {
            return Err(HostError::InvalidFrameRange {
                first: range.first,
                last: range.last,
            });
        }
        let current = self.doc.frame_range;
        if current.locked && range.locked && !current.same_points(&range) {
            return Err(HostError::RangeLocked);
        }
        self.doc.frame_range = range;
        self.modified = true;
        Ok(())
    }

    fn list_input_nodes(&self) -> Vec<InputNode> {
        self.doc
            .nodes
            .iter()
            .filter(|n| n.is_input())
            .map(|n| InputNode {
                name: n.name.clone(),
                class: n.class.clone(),
                file: n.file.clone().unwrap_or_default(),
            })
            .collect()
    }

    fn rewrite_input_path(&mut self, node: &str, path: &str) -> Result<(), HostError> {
        let target = self
            .doc
            .nodes
            .iter_mut()
            .find(|n| n.name == node && n.is_input())
            .ok_or_else(|| HostError::NodeNotFound(node.to_string()))?;
        target.file = Some(path.to_string());
        self.modified = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comp").join("comp.v001.nk");

        let mut scene = SceneFile::untitled()
            .with_frame_range(FrameRange::new(1001, 1050))
            .with_node(SceneNode::read("Read1", "/plates/bg.%04d.exr"));
        scene.save_as(&path).unwrap();
        assert_eq!(scene.scene_path(), Some(path.as_path()));

        let reopened = SceneFile::open(&path).unwrap();
        assert_eq!(reopened.current_frame_range(), FrameRange::new(1001, 1050));
        assert_eq!(reopened.nodes().len(), 1);
    }

    #[test]
    fn test_only_reading_nodes_are_inputs() {
        let scene = SceneFile::untitled()
            .with_node(SceneNode::read("Read1", "/plates/bg.%04d.exr"))
            .with_node(SceneNode::write("Write1"));

        let inputs = scene.list_input_nodes();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "Read1");
    }

    #[test]
    fn test_rewrite_unknown_node_fails() {
        let mut scene = SceneFile::untitled().with_node(SceneNode::write("Write1"));
        let err = scene.rewrite_input_path("Write1", "/x.exr").unwrap_err();
        assert!(matches!(err, HostError::NodeNotFound(_)));
    }

    #[test]
    fn test_locked_range_needs_unlocking() {
        let locked = FrameRange {
            first: 1,
            last: 10,
            locked: true,
        };
        let mut scene = SceneFile::untitled().with_frame_range(locked);

        let moved = FrameRange { first: 5, ..locked };
        assert!(matches!(scene.set_frame_range(moved), Err(HostError::RangeLocked)));

        scene.set_frame_range(FrameRange { locked: false, ..locked }).unwrap();
        scene.set_frame_range(FrameRange::new(5, 10)).unwrap();
        assert_eq!(scene.current_frame_range().first, 5);
    }

    #[test]
    fn test_resolve_requires_explicit_scene_to_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.nk");

        let err = SceneFile::resolve(Some(missing.clone()), None).unwrap_err();
        assert!(matches!(err, HostError::SceneMissing(path) if path == missing));
    }

    #[test]
    fn test_resolve_opens_the_work_file() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("comp.v001.nk");
        SceneFile::untitled()
            .with_frame_range(FrameRange::new(1001, 1100))
            .with_node(SceneNode::read("Read1", "/plates/bg.%04d.exr"))
            .save_as(&work)
            .unwrap();

        let scene = SceneFile::resolve(None, Some(work.as_path())).unwrap();
        assert_eq!(scene.scene_path(), Some(work.as_path()));
        assert_eq!(scene.current_frame_range(), FrameRange::new(1001, 1100));
        assert_eq!(scene.nodes().len(), 1);

        let gone = dir.path().join("gone.nk");
        let untitled = SceneFile::resolve(None, Some(gone.as_path())).unwrap();
        assert!(untitled.scene_path().is_none());
    }

    #[test]
    fn test_edits_mark_the_scene_modified_until_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = SceneFile::untitled().with_node(SceneNode::read("Read1", "/a.exr"));
        assert!(!scene.is_modified());

        scene.rewrite_input_path("Read1", "/b.exr").unwrap();
        assert!(scene.is_modified());

        scene.save_as(&dir.path().join("comp.nk")).unwrap();
        assert!(!scene.is_modified());

        scene.set_frame_range(FrameRange::new(1, 50)).unwrap();
        assert!(scene.is_modified());
    }

    #[test]
    fn test_inverted_frame_range_is_rejected() {
        let mut scene = SceneFile::untitled();
        assert!(scene.set_frame_range(FrameRange::new(20, 10)).is_err());
        assert_eq!(scene.current_frame_range(), FrameRange::default());
    }
}
