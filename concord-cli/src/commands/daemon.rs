//! `concord daemon` — background service lifecycle.

use anyhow::{Context, Result};
use clap::Subcommand;

use concord_daemon::protocol::{request_status, request_stop};
use concord_daemon::runtime::start_blocking;
use concord_daemon::{DaemonConfig, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (socket server + mirror watcher).
    Start,
    /// Request graceful daemon shutdown over the unix socket.
    Stop,
    /// Query daemon runtime status over the unix socket.
    Status,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start => {
            let config = DaemonConfig::from_env(home)
                .map_err(|missing| anyhow::anyhow!("{missing}"))?;
            start_blocking(config).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::NotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("daemon stop failed"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(DaemonError::NotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("daemon status failed"),
        },
    }
    Ok(())
}
