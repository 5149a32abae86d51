//! Concord — declarative structure management for collaboration spaces.
//!
//! # Usage
//!
//! ```text
//! concord source set <space> --url <repo> [--branch main] [--subdir path]
//! concord source show [<space>]
//! concord pull <space>
//! concord apply <space> [--template <path>]
//! concord plan <space> [--template <path>]
//! concord prune <space>
//! concord status [--json]
//! concord daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    apply::ApplyArgs, daemon::DaemonCommand, plan::PlanArgs, prune::PruneArgs, pull::PullArgs,
    source::SourceCommand, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "concord",
    version,
    about = "Reconcile a collaboration space's categories and channels against a git-hosted template",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the template source configured for a space.
    Source {
        #[command(subcommand)]
        command: SourceCommand,
    },

    /// Fetch the template mirror and apply it to the space.
    Pull(PullArgs),

    /// Apply a template to the space.
    Apply(ApplyArgs),

    /// Show what apply would do, without touching the space.
    Plan(PlanArgs),

    /// Review and delete structure not declared by the template.
    Prune(PruneArgs),

    /// Show configured spaces and daemon state.
    Status(StatusArgs),

    /// Manage the Concord background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Source { command } => commands::source::run(command),
        Commands::Pull(args) => args.run(),
        Commands::Apply(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Prune(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
