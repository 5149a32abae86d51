//! Shared remote-connection arguments and output helpers.

use std::future::Future;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use concord_engine::{ChangeLine, ChangeTag};
use concord_rest::{RestAdapter, RestConfig};

/// Connection settings for the remote structure API, shared by every
/// command that talks to a space.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Base URL of the structure API.
    #[arg(long, env = "CONCORD_API_URL")]
    pub api_url: String,

    /// Bearer token for the engine's credential.
    #[arg(long, env = "CONCORD_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Acting identity for capability checks and audit logs.
    #[arg(long, env = "CONCORD_ACTOR", default_value = "operator")]
    pub actor: String,
}

impl RemoteArgs {
    pub fn adapter(&self, space: &str) -> RestAdapter {
        RestAdapter::new(RestConfig::new(
            self.api_url.clone(),
            self.token.clone(),
            space,
        ))
    }
}

/// Run one async operation to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Print change lines with colored markers.
pub fn print_lines(lines: &[ChangeLine]) {
    for line in lines {
        let marker = match line.tag {
            ChangeTag::Create => "+".green().to_string(),
            ChangeTag::Update => "~".yellow().to_string(),
            ChangeTag::Skip => "·".dimmed().to_string(),
            ChangeTag::Fail => "✗".red().to_string(),
            ChangeTag::Extra => "?".magenta().to_string(),
            ChangeTag::Delete => "-".red().to_string(),
        };
        match &line.detail {
            Some(detail) => println!("  {marker}  {} ({})", line.entity, detail.dimmed()),
            None => println!("  {marker}  {}", line.entity),
        }
    }
}
