//! Concord background daemon.
//!
//! Hosts the command surface as a long-running service: a JSON-lines
//! protocol over a unix socket (`apply`, `pull`, `plan`, `status`,
//! `confirm`, `cancel`, `stop`), a per-actor sliding-window rate limiter,
//! the pending deletion-confirmation registry with bounded expiry, and a
//! file watcher that re-applies a space's template when its mirror changes.

pub mod config;
pub mod error;
pub mod limiter;
pub mod paths;
pub mod pending;
pub mod protocol;
pub mod runtime;

pub use config::DaemonConfig;
pub use error::DaemonError;
