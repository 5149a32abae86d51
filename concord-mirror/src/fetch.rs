//! Mirror fetching via `git` subprocess.
//!
//! The mirror for a space lives at `~/.concord/mirrors/<space>/`. A fetch
//! either clones it fresh (`git clone --branch <b> --depth 1`) or
//! fast-forwards an existing clone (`git fetch` + `git reset --hard`), then
//! records the resulting HEAD commit in the source metadata. The caller
//! saves the updated record.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::MirrorError;
use crate::metadata::{self, TemplateSource};

/// Outcome of one mirror fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOutcome {
    /// Directory holding the template (mirror root, or the configured
    /// subdirectory inside it).
    pub template_dir: PathBuf,
    pub commit: String,
    /// False when the fetch found the same commit as last time.
    pub changed: bool,
}

/// Resolve the template directory for a fetched source without fetching.
pub fn template_dir(home: &Path, source: &TemplateSource) -> PathBuf {
    let root = metadata::mirror_dir_at(home, &source.space);
    match &source.subdir {
        Some(subdir) => root.join(subdir),
        None => root,
    }
}

/// Fetch the mirror for `source`, updating its `last_commit`/`fetched_at`.
pub fn fetch_at(home: &Path, source: &mut TemplateSource) -> Result<MirrorOutcome, MirrorError> {
    let mirror = metadata::mirror_dir_at(home, &source.space);

    if mirror.join(".git").exists() {
        debug!(mirror = %mirror.display(), "fast-forwarding existing mirror");
        run_git(
            "fetch",
            Command::new("git")
                .arg("-C")
                .arg(&mirror)
                .args(["fetch", "origin", &source.branch]),
        )?;
        let upstream = format!("origin/{}", source.branch);
        run_git(
            "reset",
            Command::new("git")
                .arg("-C")
                .arg(&mirror)
                .args(["reset", "--hard", upstream.as_str()]),
        )?;
    } else {
        if let Some(parent) = mirror.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(repository = %source.repository, branch = %source.branch, "cloning template mirror");
        run_git(
            "clone",
            Command::new("git")
                .args(["clone", "--branch", source.branch.as_str(), "--depth", "1"])
                .arg(&source.repository)
                .arg(&mirror),
        )?;
    }

    let commit = run_git(
        "rev-parse",
        Command::new("git")
            .arg("-C")
            .arg(&mirror)
            .args(["rev-parse", "HEAD"]),
    )?;
    let commit = commit.trim().to_string();

    let changed = source.last_commit.as_deref() != Some(commit.as_str());
    let now = Utc::now();
    source.last_commit = Some(commit.clone());
    source.fetched_at = Some(now);
    source.updated_at = now;

    info!(space = %source.space, %commit, changed, "mirror fetched");
    Ok(MirrorOutcome {
        template_dir: template_dir(home, source),
        commit,
        changed,
    })
}

/// Fetch the mirror and persist the updated metadata in one step.
pub fn pull_at(home: &Path, space: &str) -> Result<(MirrorOutcome, TemplateSource), MirrorError> {
    let mut source = metadata::load_at(home, space)?;
    let outcome = fetch_at(home, &mut source)?;
    metadata::save_at(home, &source)?;
    Ok((outcome, source))
}

/// `pull_at` convenience wrapper.
pub fn pull(space: &str) -> Result<(MirrorOutcome, TemplateSource), MirrorError> {
    pull_at(&metadata::home()?, space)
}

fn run_git(op: &'static str, command: &mut Command) -> Result<String, MirrorError> {
    let output = command.output()?;
    if !output.status.success() {
        return Err(MirrorError::Git {
            op,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn template_dir_honors_subdir() {
        let home = TempDir::new().expect("tempdir");
        let mut source = TemplateSource::new("s-1", "https://git.example.net/t.git", "main");
        assert_eq!(
            template_dir(home.path(), &source),
            metadata::mirror_dir_at(home.path(), "s-1")
        );

        source.subdir = Some("community".to_string());
        assert!(template_dir(home.path(), &source).ends_with("mirrors/s-1/community"));
    }

    #[test]
    fn fetch_against_a_local_git_repository() {
        // Build a throwaway upstream repository with one template file.
        let upstream = TempDir::new().expect("upstream");
        let run = |args: &[&str]| {
            let output = Command::new("git")
                .arg("-C")
                .arg(upstream.path())
                .args(args)
                .env("GIT_AUTHOR_NAME", "t")
                .env("GIT_AUTHOR_EMAIL", "t@example.net")
                .env("GIT_COMMITTER_NAME", "t")
                .env("GIT_COMMITTER_EMAIL", "t@example.net")
                .output()
                .expect("git runs");
            assert!(
                output.status.success(),
                "git {args:?}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        };
        run(&["init", "--initial-branch=main"]);
        std::fs::write(upstream.path().join("template.yaml"), "name: community\n")
            .expect("write");
        run(&["add", "."]);
        run(&["commit", "-m", "seed"]);

        let home = TempDir::new().expect("home");
        let mut source = TemplateSource::new(
            "s-1",
            upstream.path().display().to_string(),
            "main",
        );

        let first = fetch_at(home.path(), &mut source).expect("first fetch");
        assert!(first.changed);
        assert!(first.template_dir.join("template.yaml").exists());
        assert_eq!(source.last_commit.as_deref(), Some(first.commit.as_str()));
        assert!(source.fetched_at.is_some());

        // A second fetch with no upstream change reports `changed: false`.
        let second = fetch_at(home.path(), &mut source).expect("second fetch");
        assert!(!second.changed);
        assert_eq!(second.commit, first.commit);
    }
}
