//! `concord plan` — rehearse an apply without touching the space.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use concord_engine::memory::InMemorySpace;
use concord_engine::{render, LiveSnapshot, Reconciler};

use super::apply::{load_template, policy_from};
use super::remote::{block_on, print_lines, RemoteArgs};

/// Arguments for `concord plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// The target space.
    pub space: String,

    /// Template location override.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Uncategorized channel names that are never drift. Repeatable.
    #[arg(long = "allow-uncategorized")]
    pub allow_uncategorized: Vec<String>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl PlanArgs {
    pub fn run(self) -> Result<()> {
        let template = load_template(&self.space, self.template.as_deref())?;
        let adapter = self.remote.adapter(&self.space);

        // Read the live structure once, then reconcile a copy of it in
        // memory. Every line below is a prediction, not an applied change.
        let snapshot = block_on(LiveSnapshot::read(&adapter))?
            .with_context(|| format!("failed to read live state of '{}'", self.space))?;
        let rehearsal = InMemorySpace::from_snapshot(&snapshot);

        let reconciler = Reconciler::new(policy_from(&self.allow_uncategorized));
        let result = block_on(reconciler.run(&template, &rehearsal))?
            .with_context(|| format!("plan failed for '{}'", self.space))?;

        if result.is_converged() {
            println!("✓ '{}' — nothing to do", self.space);
            return Ok(());
        }

        println!(
            "[plan] '{}' would see {} creates, {} updates, {} failures",
            self.space,
            result.created_count(),
            result.updated_count(),
            result.failed_count(),
        );
        print_lines(&render(&result));
        Ok(())
    }
}
