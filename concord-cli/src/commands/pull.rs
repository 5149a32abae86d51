//! `concord pull` — fetch the template mirror, then apply it.

use anyhow::{Context, Result};
use clap::Args;

use super::apply::{load_template, print_result, run_apply};
use super::remote::RemoteArgs;

/// Arguments for `concord pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// The target space.
    pub space: String,

    /// Uncategorized channel names that are never drift. Repeatable.
    #[arg(long = "allow-uncategorized")]
    pub allow_uncategorized: Vec<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl PullArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let (outcome, source) = concord_mirror::pull_at(&home, &self.space)
            .with_context(|| format!("failed to fetch template for '{}'", self.space))?;

        println!(
            "fetched {}@{} ({}{})",
            source.repository,
            source.branch,
            &outcome.commit[..outcome.commit.len().min(10)],
            if outcome.changed { "" } else { ", unchanged" },
        );

        let template = load_template(&self.space, Some(&outcome.template_dir))?;
        let result = run_apply(&self.space, &template, &self.remote, &self.allow_uncategorized)?;
        print_result(&self.space, &result);
        Ok(())
    }
}
