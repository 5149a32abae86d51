//! Template parsing.
//!
//! Two source forms normalize to the same [`LoadedTemplate`]:
//!
//! - a **consolidated document**: one YAML file declaring every category and
//!   channel inline;
//! - a **directory tree**: one directory per category holding a
//!   `category.yaml` (name + ordered channel list) and one `<channel>.yaml`
//!   per channel, with an optional root `template.yaml` carrying metadata.
//!
//! Unit-scoped defects (missing channel file, malformed unit, missing
//! required field, unrecognized kind) degrade to [`TemplateIssue`]s so the
//! rest of the template still loads; duplicate names within a scope abort
//! the load. The channel `kind` field accepts the legacy `type` spelling.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{io_err, TemplateError};
use crate::types::{
    CategoryName, CategorySpec, ChannelKind, ChannelName, ChannelSpec, LoadedTemplate,
    TemplateDocument, TemplateIssue, TemplateMeta,
};

/// File name marking a directory as a category unit.
pub const CATEGORY_FILE: &str = "category.yaml";

/// Optional metadata file at the root of a directory-form template.
pub const META_FILE: &str = "template.yaml";

// ---------------------------------------------------------------------------
// Raw (wire) shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: Option<String>,
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: Option<String>,
    #[serde(default)]
    channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    name: Option<String>,
    #[serde(alias = "type")]
    kind: Option<String>,
    topic: Option<String>,
    #[serde(default)]
    nsfw: bool,
}

#[derive(Debug, Deserialize)]
struct RawCategoryFile {
    name: Option<String>,
    #[serde(default)]
    channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawMetaFile {
    name: Option<String>,
    version: Option<serde_yaml::Value>,
}

fn version_string(value: Option<serde_yaml::Value>) -> Option<String> {
    match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Load a template from `path`, dispatching on source form: a directory is
/// parsed as a tree, anything else as a consolidated document.
pub fn load(path: &Path) -> Result<LoadedTemplate, TemplateError> {
    if path.is_dir() {
        load_dir(path)
    } else {
        load_file(path)
    }
}

/// Load a consolidated template document from a file.
pub fn load_file(path: &Path) -> Result<LoadedTemplate, TemplateError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse_with_origin(&contents, path)
}

/// Parse a consolidated template document from a string.
pub fn parse_str(source: &str) -> Result<LoadedTemplate, TemplateError> {
    parse_with_origin(source, Path::new("<inline>"))
}

fn parse_with_origin(source: &str, origin: &Path) -> Result<LoadedTemplate, TemplateError> {
    let raw: RawDocument = serde_yaml::from_str(source).map_err(|e| TemplateError::Parse {
        path: origin.to_path_buf(),
        source: e,
    })?;

    if raw.categories.is_empty() {
        return Err(TemplateError::Empty {
            path: origin.to_path_buf(),
        });
    }

    let meta = TemplateMeta {
        name: raw.name,
        version: version_string(raw.version),
    };

    let mut issues = Vec::new();
    let mut categories = Vec::new();
    let mut seen_categories = HashSet::new();

    for (idx, raw_cat) in raw.categories.into_iter().enumerate() {
        let name = match nonempty(raw_cat.name) {
            Some(name) => name,
            None => {
                issues.push(TemplateIssue {
                    unit: format!("categories[{idx}]"),
                    category: None,
                    reason: "missing required field: name".to_string(),
                });
                continue;
            }
        };
        if !seen_categories.insert(name.clone()) {
            return Err(TemplateError::Duplicate {
                scope: "template".to_string(),
                name,
            });
        }

        let category_name = CategoryName::from(name);
        let channels =
            collect_channels(raw_cat.channels, &category_name, &mut issues)?;

        categories.push(CategorySpec {
            name: category_name,
            order: categories.len(),
            channels,
        });
    }

    Ok(LoadedTemplate {
        document: TemplateDocument { meta, categories },
        issues,
    })
}

fn collect_channels(
    raw: Vec<RawChannel>,
    category: &CategoryName,
    issues: &mut Vec<TemplateIssue>,
) -> Result<Vec<ChannelSpec>, TemplateError> {
    let mut channels = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_ch) in raw.into_iter().enumerate() {
        let unit = raw_ch
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("{category}.channels[{idx}]"));

        match channel_spec(raw_ch, channels.len()) {
            Ok(spec) => {
                if !seen.insert(spec.name.0.clone()) {
                    return Err(TemplateError::Duplicate {
                        scope: format!("category '{category}'"),
                        name: spec.name.0,
                    });
                }
                channels.push(spec);
            }
            Err(reason) => issues.push(TemplateIssue {
                unit,
                category: Some(category.clone()),
                reason,
            }),
        }
    }
    Ok(channels)
}

/// Build a [`ChannelSpec`] from a raw unit, or return the reason it must be
/// skipped. `order` is the rank among the channels that actually parsed.
fn channel_spec(raw: RawChannel, order: usize) -> Result<ChannelSpec, String> {
    let name = nonempty(raw.name).ok_or("missing required field: name")?;
    let kind_label = nonempty(raw.kind).ok_or("missing required field: kind")?;
    let kind = ChannelKind::parse(&kind_label)
        .ok_or_else(|| format!("unknown channel kind '{kind_label}' (expected text or voice)"))?;

    Ok(ChannelSpec {
        name: ChannelName::from(name),
        kind,
        // A topic on a voice channel is declared noise; drop it here so the
        // reconciler never has to re-check applicability.
        topic: if kind.supports_topic() { raw.topic } else { None },
        nsfw: raw.nsfw,
        order,
    })
}

fn nonempty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Directory form
// ---------------------------------------------------------------------------

/// Load a directory-form template rooted at `root`.
///
/// Category order is the lexicographic order of the category file paths;
/// prefix directories (`01-general`, `02-dev`, …) to pin an order.
pub fn load_dir(root: &Path) -> Result<LoadedTemplate, TemplateError> {
    let category_files = find_category_files(root)?;
    if category_files.is_empty() {
        return Err(TemplateError::Empty {
            path: root.to_path_buf(),
        });
    }

    let meta = load_meta(root)?;

    let mut issues = Vec::new();
    let mut categories: Vec<CategorySpec> = Vec::new();
    let mut seen_categories = HashSet::new();

    for cat_path in category_files {
        let dir = cat_path.parent().unwrap_or(root).to_path_buf();
        let unit_label = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        let raw: RawCategoryFile = match read_yaml(&cat_path) {
            Ok(raw) => raw,
            Err(reason) => {
                issues.push(TemplateIssue {
                    unit: unit_label,
                    category: None,
                    reason,
                });
                continue;
            }
        };

        let name = match nonempty(raw.name) {
            Some(name) => name,
            None => {
                issues.push(TemplateIssue {
                    unit: unit_label,
                    category: None,
                    reason: format!("missing required field: name in {}", cat_path.display()),
                });
                continue;
            }
        };
        if !seen_categories.insert(name.clone()) {
            return Err(TemplateError::Duplicate {
                scope: "template".to_string(),
                name,
            });
        }

        let category_name = CategoryName::from(name);
        let channels = collect_channel_files(&dir, raw.channels, &category_name, &mut issues)?;

        categories.push(CategorySpec {
            name: category_name,
            order: categories.len(),
            channels,
        });
    }

    Ok(LoadedTemplate {
        document: TemplateDocument { meta, categories },
        issues,
    })
}

fn collect_channel_files(
    dir: &Path,
    stems: Vec<String>,
    category: &CategoryName,
    issues: &mut Vec<TemplateIssue>,
) -> Result<Vec<ChannelSpec>, TemplateError> {
    let mut channels = Vec::new();
    let mut seen = HashSet::new();

    for stem in stems {
        let path = dir.join(format!("{stem}.yaml"));
        let raw: RawChannel = match read_yaml(&path) {
            Ok(raw) => raw,
            Err(reason) => {
                issues.push(TemplateIssue {
                    unit: stem,
                    category: Some(category.clone()),
                    reason,
                });
                continue;
            }
        };

        match channel_spec(raw, channels.len()) {
            Ok(spec) => {
                if !seen.insert(spec.name.0.clone()) {
                    return Err(TemplateError::Duplicate {
                        scope: format!("category '{category}'"),
                        name: spec.name.0,
                    });
                }
                channels.push(spec);
            }
            Err(reason) => issues.push(TemplateIssue {
                unit: stem,
                category: Some(category.clone()),
                reason: format!("{reason} in {}", path.display()),
            }),
        }
    }
    Ok(channels)
}

/// Walk `root` and return every `category.yaml`, sorted by path.
fn find_category_files(root: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(io_err(&dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if path.file_name().and_then(|n| n.to_str()) == Some(CATEGORY_FILE) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn load_meta(root: &Path) -> Result<TemplateMeta, TemplateError> {
    let path = root.join(META_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TemplateMeta::default()),
        Err(e) => return Err(io_err(&path, e)),
    };
    let raw: RawMetaFile = serde_yaml::from_str(&contents).map_err(|e| TemplateError::Parse {
        path,
        source: e,
    })?;
    Ok(TemplateMeta {
        name: raw.name,
        version: version_string(raw.version),
    })
}

/// Read and deserialize one unit file, folding I/O and syntax problems into
/// a skip reason.
fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(format!("template file not found: {}", path.display()));
        }
        Err(e) => return Err(format!("cannot read {}: {e}", path.display())),
    };
    serde_yaml::from_str(&contents).map_err(|e| format!("invalid YAML in {}: {e}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const CONSOLIDATED: &str = r#"
name: community
version: 2
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
        topic: say hi
      - name: voice-chat
        kind: voice
  - name: Development
    channels:
      - name: rust
        type: text
        nsfw: false
"#;

    #[test]
    fn parse_consolidated_document() {
        let loaded = parse_str(CONSOLIDATED).expect("parse");
        assert!(loaded.issues.is_empty());

        let doc = &loaded.document;
        assert_eq!(doc.meta.name.as_deref(), Some("community"));
        assert_eq!(doc.meta.version.as_deref(), Some("2"));
        assert_eq!(doc.categories.len(), 2);

        let general = &doc.categories[0];
        assert_eq!(general.name, CategoryName::from("General"));
        assert_eq!(general.order, 0);
        assert_eq!(general.channels.len(), 2);
        assert_eq!(general.channels[0].name, ChannelName::from("welcome"));
        assert_eq!(general.channels[0].order, 0);
        assert_eq!(general.channels[1].kind, ChannelKind::Voice);
        assert_eq!(general.channels[1].order, 1);

        // `type` is accepted as an alias for `kind`.
        assert_eq!(doc.categories[1].channels[0].kind, ChannelKind::Text);
        assert_eq!(doc.categories[1].order, 1);
    }

    #[test]
    fn unknown_kind_degrades_to_issue() {
        let loaded = parse_str(
            r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
      - name: gallery
        kind: forum
"#,
        )
        .expect("parse");

        assert_eq!(loaded.document.categories[0].channels.len(), 1);
        assert_eq!(loaded.issues.len(), 1);
        let issue = &loaded.issues[0];
        assert_eq!(issue.unit, "gallery");
        assert_eq!(issue.category, Some(CategoryName::from("General")));
        assert!(issue.reason.contains("unknown channel kind 'forum'"));
    }

    #[test]
    fn missing_channel_field_degrades_to_issue() {
        let loaded = parse_str(
            r#"
categories:
  - name: General
    channels:
      - kind: text
"#,
        )
        .expect("parse");

        assert!(loaded.document.categories[0].channels.is_empty());
        assert_eq!(loaded.issues.len(), 1);
        assert!(loaded.issues[0].reason.contains("name"));
    }

    #[test]
    fn skipped_unit_does_not_leave_order_gap() {
        let loaded = parse_str(
            r#"
categories:
  - name: General
    channels:
      - name: first
        kind: text
      - name: broken
        kind: stage
      - name: last
        kind: text
"#,
        )
        .expect("parse");

        let channels = &loaded.document.categories[0].channels;
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].order, 0);
        assert_eq!(channels[1].order, 1);
    }

    #[test]
    fn duplicate_category_is_hard_error() {
        let err = parse_str(
            r#"
categories:
  - name: General
    channels: []
  - name: General
    channels: []
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::Duplicate { .. }));
    }

    #[test]
    fn duplicate_channel_within_category_is_hard_error() {
        let err = parse_str(
            r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
      - name: welcome
        kind: voice
"#,
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::Duplicate { .. }));
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = parse_str("name: nothing\n").unwrap_err();
        assert!(matches!(err, TemplateError::Empty { .. }));
    }

    #[test]
    fn voice_topic_is_dropped_at_parse_time() {
        let loaded = parse_str(
            r#"
categories:
  - name: General
    channels:
      - name: lounge
        kind: voice
        topic: not applicable
"#,
        )
        .expect("parse");
        assert_eq!(loaded.document.categories[0].channels[0].topic, None);
    }

    fn write_dir_template(root: &Path) {
        let general = root.join("01-general");
        fs::create_dir_all(&general).expect("mkdir");
        fs::write(
            general.join(CATEGORY_FILE),
            "name: General\nchannels:\n  - welcome\n  - voice-chat\n",
        )
        .expect("write");
        fs::write(
            general.join("welcome.yaml"),
            "name: welcome\nkind: text\ntopic: say hi\n",
        )
        .expect("write");
        fs::write(
            general.join("voice-chat.yaml"),
            "name: voice-chat\ntype: voice\n",
        )
        .expect("write");

        let dev = root.join("02-development");
        fs::create_dir_all(&dev).expect("mkdir");
        fs::write(dev.join(CATEGORY_FILE), "name: Development\nchannels:\n  - rust\n")
            .expect("write");
        fs::write(dev.join("rust.yaml"), "name: rust\nkind: text\n").expect("write");

        fs::write(root.join(META_FILE), "name: community\nversion: 2\n").expect("write");
    }

    #[test]
    fn directory_and_consolidated_forms_are_equivalent() {
        let tmp = TempDir::new().expect("tempdir");
        write_dir_template(tmp.path());

        let from_dir = load_dir(tmp.path()).expect("load dir");
        let from_doc = parse_str(CONSOLIDATED).expect("parse doc");

        assert!(from_dir.issues.is_empty());
        assert_eq!(from_dir.document, from_doc.document);
    }

    #[test]
    fn missing_channel_file_degrades_to_issue() {
        let tmp = TempDir::new().expect("tempdir");
        let general = tmp.path().join("general");
        fs::create_dir_all(&general).expect("mkdir");
        fs::write(
            general.join(CATEGORY_FILE),
            "name: General\nchannels:\n  - ghost\n",
        )
        .expect("write");

        let loaded = load_dir(tmp.path()).expect("load");
        assert!(loaded.document.categories[0].channels.is_empty());
        assert_eq!(loaded.issues.len(), 1);
        assert_eq!(loaded.issues[0].unit, "ghost");
        assert!(loaded.issues[0].reason.contains("not found"));
    }

    #[test]
    fn directory_without_categories_is_empty_error() {
        let tmp = TempDir::new().expect("tempdir");
        let err = load_dir(tmp.path()).unwrap_err();
        assert!(matches!(err, TemplateError::Empty { .. }));
    }

    #[test]
    fn load_dispatches_on_source_form() {
        let tmp = TempDir::new().expect("tempdir");
        write_dir_template(tmp.path());
        let consolidated = tmp.path().join("all.yaml");
        fs::write(&consolidated, CONSOLIDATED).expect("write");

        let from_dir = load(tmp.path()).expect("load dir");
        let from_file = load(&consolidated).expect("load file");
        assert_eq!(from_dir.document.categories, from_file.document.categories);
    }
}
