//! Per-space template source metadata.
//!
//! # Storage layout
//!
//! ```text
//! ~/.concord/
//!   spaces/
//!     <space>.yaml    (one file per space — mode 0600)
//!   mirrors/
//!     <space>/        (local clone of the template repository)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MirrorError;

/// The persisted template source record for one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSource {
    /// The space this source belongs to.
    pub space: String,
    /// Clone URL of the template repository.
    pub repository: String,
    pub branch: String,
    /// Subdirectory of the repository holding the template, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    /// Commit hash of the last successful fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateSource {
    /// A fresh record that has never been fetched.
    pub fn new(space: impl Into<String>, repository: impl Into<String>, branch: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            space: space.into(),
            repository: repository.into(),
            branch: branch.into(),
            subdir: None,
            last_commit: None,
            fetched_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.concord/spaces/` — pure, no I/O.
pub fn spaces_dir_at(home: &Path) -> PathBuf {
    home.join(".concord").join("spaces")
}

/// `<home>/.concord/spaces/<space>.yaml` — pure, no I/O.
pub fn source_path_at(home: &Path, space: &str) -> PathBuf {
    spaces_dir_at(home).join(format!("{space}.yaml"))
}

/// `<home>/.concord/mirrors/<space>/` — pure, no I/O.
pub fn mirror_dir_at(home: &Path, space: &str) -> PathBuf {
    home.join(".concord").join("mirrors").join(space)
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the source record for `space`.
///
/// Returns `MirrorError::SourceNotConfigured` if absent,
/// `MirrorError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path, space: &str) -> Result<TemplateSource, MirrorError> {
    let path = source_path_at(home, space);
    if !path.exists() {
        return Err(MirrorError::SourceNotConfigured {
            space: space.to_string(),
        });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| MirrorError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load(space: &str) -> Result<TemplateSource, MirrorError> {
    load_at(&home()?, space)
}

/// List every configured source, sorted by space name.
pub fn list_at(home: &Path) -> Result<Vec<TemplateSource>, MirrorError> {
    let dir = spaces_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut entries: Vec<_> = std::fs::read_dir(&dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    let mut sources = Vec::new();
    for entry in entries {
        let fname = entry.file_name();
        let name = fname.to_string_lossy();
        if !name.ends_with(".yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(entry.path())?;
        let source: TemplateSource = serde_yaml::from_str(&contents).map_err(|e| {
            MirrorError::Parse {
                path: entry.path(),
                source: e,
            }
        })?;
        sources.push(source);
    }
    Ok(sources)
}

/// `list_at` convenience wrapper.
pub fn list() -> Result<Vec<TemplateSource>, MirrorError> {
    list_at(&home()?)
}

// ---------------------------------------------------------------------------
// Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a source record.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// The `.tmp` lives in the same directory as the target, so the rename
/// never crosses filesystems.
pub fn save_at(home: &Path, source: &TemplateSource) -> Result<(), MirrorError> {
    let dir = spaces_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    let path = source_path_at(home, &source.space);
    let tmp = path.with_file_name(format!("{}.yaml.tmp", source.space));

    let yaml = serde_yaml::to_string(source)?;
    std::fs::write(&tmp, yaml)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(source: &TemplateSource) -> Result<(), MirrorError> {
    save_at(&home()?, source)
}

/// Remove the record for `space`, if present.
pub fn clear_at(home: &Path, space: &str) -> Result<(), MirrorError> {
    let path = source_path_at(home, space);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MirrorError::Io(e)),
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, MirrorError> {
    dirs::home_dir().ok_or(MirrorError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), MirrorError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), MirrorError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), MirrorError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), MirrorError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
