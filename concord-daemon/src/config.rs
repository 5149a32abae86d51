//! Daemon configuration.
//!
//! An explicit value built by the caller and passed into the runtime —
//! nothing here is read lazily from process-wide state while the daemon is
//! running.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use concord_core::types::ChannelName;
use concord_engine::ReconcilePolicy;

/// Environment variables consulted by [`DaemonConfig::from_env`].
pub const ENV_API_URL: &str = "CONCORD_API_URL";
pub const ENV_TOKEN: &str = "CONCORD_TOKEN";
pub const ENV_ALLOW_UNCATEGORIZED: &str = "CONCORD_ALLOW_UNCATEGORIZED";

/// Runtime configuration for one daemon instance.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Home directory anchoring `~/.concord/`.
    pub home: PathBuf,
    /// Base URL of the remote structure API.
    pub api_url: String,
    /// Bearer token for the engine's credential.
    pub token: String,
    /// Uncategorized channel names that are never drift.
    pub allowed_uncategorized: Vec<ChannelName>,
    /// Actors exempt from command rate limiting.
    pub exempt_actors: HashSet<String>,
    /// Sliding-window rate limit: at most `rate_max` commands per actor
    /// within `rate_window`.
    pub rate_window: Duration,
    pub rate_max: usize,
}

impl DaemonConfig {
    /// Build a configuration from the environment. Missing variables are an
    /// error message naming the variable, in the caller's hands.
    pub fn from_env(home: PathBuf) -> Result<Self, String> {
        let api_url =
            std::env::var(ENV_API_URL).map_err(|_| format!("{ENV_API_URL} is not set"))?;
        let token = std::env::var(ENV_TOKEN).map_err(|_| format!("{ENV_TOKEN} is not set"))?;
        let allowed_uncategorized = std::env::var(ENV_ALLOW_UNCATEGORIZED)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ChannelName::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            home,
            api_url,
            token,
            allowed_uncategorized,
            exempt_actors: HashSet::new(),
            rate_window: Duration::from_secs(60),
            rate_max: 5,
        })
    }

    pub fn policy(&self) -> ReconcilePolicy {
        ReconcilePolicy {
            allowed_uncategorized: self.allowed_uncategorized.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_carries_the_allow_list() {
        let config = DaemonConfig {
            home: PathBuf::from("/tmp"),
            api_url: "https://api.example.net".to_string(),
            token: "t".to_string(),
            allowed_uncategorized: vec![ChannelName::from("lobby")],
            exempt_actors: HashSet::new(),
            rate_window: Duration::from_secs(60),
            rate_max: 5,
        };
        assert!(config.policy().allows_uncategorized(&ChannelName::from("lobby")));
        assert!(!config.policy().allows_uncategorized(&ChannelName::from("other")));
    }
}
