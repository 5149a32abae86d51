//! Template source mirroring for Concord.
//!
//! Owns the only persisted state in the system: per-space template source
//! metadata (repository URL, branch, optional subdirectory, last fetched
//! commit), stored as YAML under `~/.concord/`. The fetcher keeps a local
//! mirror clone per space and fast-forwards it on demand; the engine only
//! ever reads the resulting template directory.

pub mod error;
pub mod fetch;
pub mod metadata;

pub use error::MirrorError;
pub use fetch::{fetch_at, pull, pull_at, template_dir, MirrorOutcome};
pub use metadata::TemplateSource;
