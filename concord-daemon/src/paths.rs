//! Filesystem locations used by the daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Events for the same path inside this window collapse to one sync.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// How long a pending deletion confirmation stays alive before it expires.
pub const CONFIRMATION_TTL: Duration = Duration::from_secs(60);

/// `<home>/.concord/run/`
pub fn run_dir(home: &Path) -> PathBuf {
    home.join(".concord").join("run")
}

/// `<home>/.concord/run/daemon.sock`
pub fn socket_path(home: &Path) -> PathBuf {
    run_dir(home).join("daemon.sock")
}

/// `<home>/.concord/mirrors/` — watched for template changes.
pub fn mirrors_root(home: &Path) -> PathBuf {
    home.join(".concord").join("mirrors")
}
