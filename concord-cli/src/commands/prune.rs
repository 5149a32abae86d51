//! `concord prune` — review drift and delete it behind a two-phase
//! confirmation.
//!
//! This command is a presentation adapter over the engine's deletion
//! workflow: prompt 1 moves Offered → PendingConfirmation (after a fresh
//! capability check on the acting identity), prompt 2 moves
//! PendingConfirmation → Applied. Saying no, or an unanswered prompt, lands
//! in Cancelled with nothing mutated.

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use concord_core::types::ActorId;
use concord_engine::{
    find_drift, render_deletions, CancelReason, DeletionWorkflow, LiveSnapshot,
};

use super::apply::{load_template, policy_from};
use super::remote::{block_on, print_lines, RemoteArgs};

/// How long each confirmation prompt waits before cancelling.
const PROMPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Arguments for `concord prune`.
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// The target space.
    pub space: String,

    /// Template location override.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Uncategorized channel names that are never drift. Repeatable.
    #[arg(long = "allow-uncategorized")]
    pub allow_uncategorized: Vec<String>,

    /// Skip the prompts and answer yes to both. For scripted cleanup.
    #[arg(long)]
    pub yes: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl PruneArgs {
    pub fn run(self) -> Result<()> {
        let template = load_template(&self.space, self.template.as_deref())?;
        let adapter = self.remote.adapter(&self.space);

        let snapshot = block_on(LiveSnapshot::read(&adapter))?
            .with_context(|| format!("failed to read live state of '{}'", self.space))?;
        let drift = find_drift(
            &template.document,
            &snapshot,
            &policy_from(&self.allow_uncategorized),
        );
        if drift.is_empty() {
            println!("✓ '{}' — no drift", self.space);
            return Ok(());
        }

        let objects = drift.objects();
        println!("{} drift object(s) in '{}':", objects.len(), self.space);
        for object in &objects {
            println!("  {} {}", "?".magenta(), object.label());
        }

        let mut workflow =
            DeletionWorkflow::offer(objects, ActorId::from(self.remote.actor.as_str()));

        match self.confirm_prompt("Delete these objects? [y/N] ")? {
            Answer::Yes => {}
            answer => return cancel(&mut workflow, answer),
        }

        block_on(workflow.begin_confirmation(&adapter))?
            .context("confirmation rejected")?;

        match self.confirm_prompt("Really delete? This cannot be undone. [y/N] ")? {
            Answer::Yes => {}
            answer => return cancel(&mut workflow, answer),
        }

        let report = block_on(workflow.confirm(&adapter))?
            .context("deletion batch failed")?;

        println!(
            "deleted {} object(s), {} failed",
            report.deleted.len(),
            report.failed.len(),
        );
        print_lines(&render_deletions(&report));
        Ok(())
    }

    /// Ask on stdout, read one line from stdin with a bounded wait.
    fn confirm_prompt(&self, prompt: &str) -> Result<Answer> {
        if self.yes {
            return Ok(Answer::Yes);
        }

        use std::io::Write;
        print!("{prompt}");
        std::io::stdout().flush().context("flush stdout")?;

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line);
            let _ = tx.send(read.map(|_| line));
        });

        match rx.recv_timeout(PROMPT_TIMEOUT) {
            Ok(Ok(line)) => {
                if matches!(line.trim(), "y" | "Y" | "yes") {
                    Ok(Answer::Yes)
                } else {
                    Ok(Answer::No)
                }
            }
            Ok(Err(err)) => Err(err).context("failed to read stdin"),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                println!();
                println!(
                    "no answer after {}s — treating as no",
                    PROMPT_TIMEOUT.as_secs()
                );
                Ok(Answer::TimedOut)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Ok(Answer::No),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Yes,
    No,
    TimedOut,
}

fn cancel(workflow: &mut DeletionWorkflow, answer: Answer) -> Result<()> {
    let reason = match answer {
        Answer::TimedOut => CancelReason::Expired,
        _ => CancelReason::Dismissed,
    };
    workflow.cancel(reason)?;
    println!("cancelled — nothing deleted");
    Ok(())
}
