//! Error types for concord-mirror.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from metadata storage or mirror fetching.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context.
    #[error("failed to parse source metadata at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.concord/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No template source has been configured for the space.
    #[error("no template source configured for space '{space}'")]
    SourceNotConfigured { space: String },

    /// A `git` subprocess failed.
    #[error("git {op} failed ({status}): {stderr}")]
    Git {
        op: &'static str,
        status: String,
        stderr: String,
    },
}
