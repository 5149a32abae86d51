//! `concord apply` — reconcile a space against its template.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use concord_core::template;
use concord_core::types::{ChannelName, LoadedTemplate};
use concord_engine::{render, summarize, ReconcilePolicy, ReconciliationResult, Reconciler};

use super::remote::{block_on, print_lines, RemoteArgs};

/// Arguments for `concord apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// The target space.
    pub space: String,

    /// Template location override (directory tree or consolidated file).
    /// Defaults to the space's fetched mirror.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Uncategorized channel names that are never drift. Repeatable.
    #[arg(long = "allow-uncategorized")]
    pub allow_uncategorized: Vec<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl ApplyArgs {
    pub fn run(self) -> Result<()> {
        let template = load_template(&self.space, self.template.as_deref())?;
        let result = run_apply(&self.space, &template, &self.remote, &self.allow_uncategorized)?;
        print_result(&self.space, &result);

        if result.has_drift() {
            println!(
                "{}",
                format!(
                    "drift detected — run `concord prune {}` to review deletions",
                    self.space
                )
                .yellow()
            );
        }
        Ok(())
    }
}

/// Load the template for a space: explicit override, or its mirror.
pub fn load_template(space: &str, path_override: Option<&Path>) -> Result<LoadedTemplate> {
    let dir = match path_override {
        Some(path) => path.to_path_buf(),
        None => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            let source = concord_mirror::metadata::load_at(&home, space)
                .with_context(|| format!("no template configured for '{space}' — run `concord source set`"))?;
            concord_mirror::template_dir(&home, &source)
        }
    };
    template::load(&dir).with_context(|| format!("failed to load template from {}", dir.display()))
}

pub fn policy_from(allow_uncategorized: &[String]) -> ReconcilePolicy {
    ReconcilePolicy {
        allowed_uncategorized: allow_uncategorized
            .iter()
            .map(|name| ChannelName::from(name.as_str()))
            .collect(),
    }
}

pub fn run_apply(
    space: &str,
    template: &LoadedTemplate,
    remote: &RemoteArgs,
    allow_uncategorized: &[String],
) -> Result<ReconciliationResult> {
    let adapter = remote.adapter(space);
    let reconciler = Reconciler::new(policy_from(allow_uncategorized));
    block_on(reconciler.run(template, &adapter))?
        .with_context(|| format!("reconciliation failed for '{space}'"))
}

pub fn print_result(space: &str, result: &ReconciliationResult) {
    if result.is_converged() {
        println!("✓ '{space}' — already converged");
        return;
    }

    println!(
        "✓ '{space}' reconciled ({} created, {} updated, {} failed)",
        result.created_count(),
        result.updated_count(),
        result.failed_count(),
    );
    print_lines(&render(result));
    for line in summarize(result) {
        println!("  {line}");
    }
}
