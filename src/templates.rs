//! Path templates.
//!
//! A template binds an area root to a pattern such as
//! `{name}/{name}.v{version}.nk`. It turns a set of fields into a path and a
//! path back into fields, which is how the ledger tells work files, publishes
//! and renders apart and how the breakdown finds newer versions on disk.
//!
//! Keys with special formatting:
//! - `version`: zero padded to three digits (`v003`), parsed from any digits
//! - `timestamp`: `YYYY-MM-DD-HH-MM-SS-mmm`
//! - `SEQ`: a frame token, `%04d`, `####` or a frame number, kept verbatim
//!
//! Every other key matches `[A-Za-z0-9_-]+`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

pub const VERSION_KEY: &str = "version";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const SEQ_KEY: &str = "SEQ";

/// Timestamp format used by the `timestamp` key.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

/// Keys that vary between otherwise identical files of one version family.
const FAMILY_KEYS: &[&str] = &[VERSION_KEY, SEQ_KEY, TIMESTAMP_KEY];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {template:?} is missing field {key}")]
    MissingField { template: String, key: String },

    #[error("invalid value {value:?} for template key {key}")]
    InvalidValue { key: String, value: String },

    #[error("invalid template pattern {0:?}")]
    InvalidPattern(String),
}

/// Field values extracted from, or applied to, a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn version(&self) -> Option<u32> {
        self.get(VERSION_KEY)?.parse().ok()
    }

    pub fn set_version(&mut self, version: u32) {
        self.set(VERSION_KEY, version.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Key(String),
}

/// A pattern anchored at an area root.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    root: PathBuf,
    pattern: String,
    segments: Vec<Segment>,
    regex: Regex,
    /// Key name for each capture group, in group order.
    group_keys: Vec<String>,
}

impl PathTemplate {
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> Result<Self, TemplateError> {
        let key_re = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|_| TemplateError::InvalidPattern(pattern.to_string()))?;

        let mut segments = Vec::new();
        let mut last = 0;
        for caps in key_re.captures_iter(pattern) {
            let Some(whole) = caps.get(0) else { continue };
            if whole.start() > last {
                segments.push(Segment::Literal(pattern[last..whole.start()].to_string()));
            }
            segments.push(Segment::Key(caps[1].to_string()));
            last = whole.end();
        }
        if last < pattern.len() {
            segments.push(Segment::Literal(pattern[last..].to_string()));
        }

        let rest = pattern.replace(['{', '}'], "");
        let has_stray_braces = key_re.replace_all(pattern, "").contains(['{', '}']);
        if rest.is_empty() || has_stray_braces || pattern.starts_with('/') {
            return Err(TemplateError::InvalidPattern(pattern.to_string()));
        }

        let mut expr = String::from("^");
        let mut group_keys = Vec::new();
        for segment in &segments {
            match segment {
                Segment::Literal(text) => expr.push_str(&regex::escape(text)),
                Segment::Key(key) => {
                    expr.push_str(&format!("(?P<k{}>{})", group_keys.len(), key_expr(key)));
                    group_keys.push(key.clone());
                }
            }
        }
        expr.push('$');

        let regex =
            Regex::new(&expr).map_err(|_| TemplateError::InvalidPattern(pattern.to_string()))?;

        Ok(Self {
            root: root.into(),
            pattern: pattern.to_string(),
            segments,
            regex,
            group_keys,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render a path from fields.
    pub fn apply_fields(&self, fields: &Fields) -> Result<PathBuf, TemplateError> {
        let mut relative = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => relative.push_str(text),
                Segment::Key(key) => {
                    let value = fields.get(key).ok_or_else(|| TemplateError::MissingField {
                        template: self.pattern.clone(),
                        key: key.clone(),
                    })?;
                    relative.push_str(&render_value(key, value)?);
                }
            }
        }

        let mut path = self.root.clone();
        path.extend(relative.split('/').filter(|part| !part.is_empty()));
        Ok(path)
    }

    /// Extract fields from a path under this template's root.
    ///
    /// Returns `None` when the path lies outside the root, does not match the
    /// pattern, or repeats a key with different values.
    pub fn get_fields(&self, path: &Path) -> Option<Fields> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let relative = normalize(relative)?;
        let caps = self.regex.captures(&relative)?;

        let mut fields = Fields::new();
        for (idx, key) in self.group_keys.iter().enumerate() {
            let value = caps.name(&format!("k{}", idx))?.as_str();
            let value = if key == VERSION_KEY {
                value.parse::<u32>().ok()?.to_string()
            } else {
                value.to_string()
            };
            match fields.get(key) {
                Some(existing) if existing != value => return None,
                _ => fields.set(key, value),
            }
        }
        Some(fields)
    }

    /// Versions present on disk for the family `fields` belongs to.
    ///
    /// Keeps every file whose fields agree with `fields` on all keys except
    /// version, frame and timestamp. Sorted and deduplicated.
    pub fn find_versions(&self, fields: &Fields) -> Vec<u32> {
        let mut versions: Vec<u32> = self
            .find_files(fields, FAMILY_KEYS)
            .into_iter()
            .filter_map(|(_, found)| found.version())
            .collect();

        versions.sort_unstable();
        versions.dedup();
        versions
    }

    /// Files under the template root that match the pattern and agree with
    /// `fields` on every key not listed in `vary`. Sorted by path.
    pub fn find_files(&self, fields: &Fields, vary: &[&str]) -> Vec<(PathBuf, Fields)> {
        if !self.root.is_dir() {
            return Vec::new();
        }

        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let found = self.get_fields(entry.path())?;
                agrees(&found, fields, vary).then(|| (entry.into_path(), found))
            })
            .collect()
    }
}

fn key_expr(key: &str) -> &'static str {
    match key {
        VERSION_KEY => r"\d+",
        TIMESTAMP_KEY => r"\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}-\d{3}",
        SEQ_KEY => r"(?:%0\d+d|#+|\d+)",
        _ => r"[A-Za-z0-9_\-]+",
    }
}

fn render_value(key: &str, value: &str) -> Result<String, TemplateError> {
    let invalid = || TemplateError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };

    match key {
        VERSION_KEY => {
            let version: u32 = value.parse().map_err(|_| invalid())?;
            Ok(format!("{:03}", version))
        }
        _ => {
            let matcher = Regex::new(&format!("^{}$", key_expr(key))).map_err(|_| invalid())?;
            if matcher.is_match(value) {
                Ok(value.to_string())
            } else {
                Err(invalid())
            }
        }
    }
}

/// Join the normal components of a relative path with `/`.
fn normalize(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

fn agrees(found: &Fields, wanted: &Fields, vary: &[&str]) -> bool {
    wanted
        .iter()
        .filter(|(key, _)| !vary.contains(key))
        .all(|(key, value)| found.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_template() -> PathTemplate {
        PathTemplate::new("/proj/work", "{name}/{name}.v{version}.nk").unwrap()
    }

    #[test]
    fn test_apply_pads_version() {
        let fields = Fields::new().with("name", "shotA_comp").with("version", "7");
        let path = work_template().apply_fields(&fields).unwrap();
        assert_eq!(path, PathBuf::from("/proj/work/shotA_comp/shotA_comp.v007.nk"));
    }

    #[test]
    fn test_get_fields_round_trip() {
        let path = Path::new("/proj/work/shotA_comp/shotA_comp.v012.nk");
        let fields = work_template().get_fields(path).unwrap();
        assert_eq!(fields.get("name"), Some("shotA_comp"));
        assert_eq!(fields.version(), Some(12));
    }

    #[test]
    fn test_repeated_key_must_agree() {
        let path = Path::new("/proj/work/shotA_comp/shotB_comp.v001.nk");
        assert!(work_template().get_fields(path).is_none());
    }

    #[test]
    fn test_paths_outside_root_do_not_match() {
        let path = Path::new("/elsewhere/shotA_comp/shotA_comp.v001.nk");
        assert!(work_template().get_fields(path).is_none());
    }

    #[test]
    fn test_missing_field_is_reported() {
        let fields = Fields::new().with("name", "shotA_comp");
        let err = work_template().apply_fields(&fields).unwrap_err();
        assert!(matches!(err, TemplateError::MissingField { key, .. } if key == "version"));
    }

    #[test]
    fn test_rejects_values_with_separators() {
        let fields = Fields::new().with("name", "../escape").with("version", "1");
        assert!(work_template().apply_fields(&fields).is_err());
    }

    #[test]
    fn test_sequence_tokens_are_kept_verbatim() {
        let template =
            PathTemplate::new("/proj/publish", "renders/{name}/v{version}/{name}.{SEQ}.exr")
                .unwrap();
        for token in ["%04d", "####", "1001"] {
            let path = format!("/proj/publish/renders/plate/v002/plate.{}.exr", token);
            let fields = template.get_fields(Path::new(&path)).unwrap();
            assert_eq!(fields.get(SEQ_KEY), Some(token));
            assert_eq!(fields.version(), Some(2));
        }
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        assert!(PathTemplate::new("/r", "").is_err());
        assert!(PathTemplate::new("/r", "{name").is_err());
        assert!(PathTemplate::new("/r", "/abs/{name}").is_err());
    }

    #[test]
    fn test_find_versions_scans_family() {
        let dir = tempfile::tempdir().unwrap();
        let template = PathTemplate::new(dir.path(), "{name}/v{version}/{name}.{SEQ}.exr").unwrap();

        for (name, version) in [("plate", 1), ("plate", 3), ("other", 9)] {
            let fields = Fields::new()
                .with("name", name)
                .with("version", version.to_string())
                .with(SEQ_KEY, "1001");
            let path = template.apply_fields(&fields).unwrap();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"frame").unwrap();
        }

        let wanted = Fields::new()
            .with("name", "plate")
            .with("version", "1")
            .with(SEQ_KEY, "%04d");
        assert_eq!(template.find_versions(&wanted), vec![1, 3]);
    }

    #[test]
    fn test_find_files_lists_frames_of_one_version() {
        let dir = tempfile::tempdir().unwrap();
        let template = PathTemplate::new(dir.path(), "{name}/v{version}/{name}.{SEQ}.exr").unwrap();

        for (version, frame) in [(2, "1001"), (2, "1002"), (3, "1001")] {
            let fields = Fields::new()
                .with("name", "plate")
                .with("version", version.to_string())
                .with(SEQ_KEY, frame);
            let path = template.apply_fields(&fields).unwrap();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"frame").unwrap();
        }

        let wanted = Fields::new()
            .with("name", "plate")
            .with("version", "2")
            .with(SEQ_KEY, "%04d");
        let frames: Vec<String> = template
            .find_files(&wanted, &[SEQ_KEY])
            .into_iter()
            .filter_map(|(_, fields)| fields.get(SEQ_KEY).map(str::to_string))
            .collect();
        assert_eq!(frames, vec!["1001", "1002"]);
    }
}
