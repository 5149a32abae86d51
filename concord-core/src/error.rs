//! Error types for concord-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can abort loading a template.
///
/// Unit-scoped defects (a single unreadable channel file, an unknown kind)
/// do not land here — they degrade to [`crate::types::TemplateIssue`]
/// entries so the rest of the template still loads.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Underlying I/O failure reading a template source.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on a document the whole load depends on — includes
    /// file path and line context from serde_yaml.
    #[error("failed to parse template at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required field is absent from a document the whole load depends on.
    #[error("missing required field '{field}' in {path}")]
    MissingField { path: PathBuf, field: &'static str },

    /// The same name is declared twice within one scope. Never resolved
    /// implicitly — the template must be fixed.
    #[error("duplicate name '{name}' in {scope}")]
    Duplicate { scope: String, name: String },

    /// The template source exists but declares nothing.
    #[error("template at {path} declares no categories")]
    Empty { path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> TemplateError {
    TemplateError::Io {
        path: path.into(),
        source,
    }
}
