//! `concord status` — configured spaces and daemon visibility.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use concord_daemon::protocol::request_status;
use concord_daemon::DaemonError;
use concord_mirror::metadata;

/// Arguments for `concord status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct SpaceRow {
    space: String,
    repository: String,
    branch: String,
    #[tabled(rename = "last commit")]
    last_commit: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;

        let sources = metadata::list_at(&home).context("failed to read template sources")?;
        let rows: Vec<SpaceRow> = sources
            .iter()
            .map(|s| SpaceRow {
                space: s.space.clone(),
                repository: s.repository.clone(),
                branch: s.branch.clone(),
                last_commit: s
                    .last_commit
                    .as_deref()
                    .map(|c| c[..c.len().min(10)].to_string())
                    .unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        let daemon = match request_status(&home) {
            Ok(value) => Some(value),
            Err(DaemonError::NotRunning { .. }) => None,
            Err(err) => return Err(err).context("daemon status failed"),
        };

        if self.json {
            let payload = serde_json::json!({
                "spaces": rows,
                "daemon": daemon,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
            return Ok(());
        }

        if rows.is_empty() {
            println!("no template sources configured — run `concord source set`");
        } else {
            let mut table = Table::new(&rows);
            table.with(Style::sharp());
            println!("{table}");
        }

        match daemon {
            Some(value) => {
                let pending = value["pending_deletions"].as_u64().unwrap_or(0);
                println!(
                    "{} {}",
                    "daemon: running".green(),
                    if pending > 0 {
                        format!("({pending} pending deletion confirmation(s))")
                    } else {
                        String::new()
                    }
                );
            }
            None => println!("{}", "daemon: not running".dimmed()),
        }
        Ok(())
    }
}
