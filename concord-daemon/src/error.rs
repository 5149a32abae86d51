//! Error types for concord-daemon.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise inside the daemon runtime and its clients.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// I/O failure with the offending path or context attached.
    #[error("I/O error at {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The daemon socket is absent or refused the connection.
    #[error("daemon not running (socket {socket})")]
    NotRunning { socket: PathBuf },

    /// Malformed request/response traffic, or a task wiring failure.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An internal channel closed while the daemon was still running.
    #[error("internal channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),
}

pub(crate) fn io_err(context: impl std::fmt::Display, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        context: context.to_string(),
        source,
    }
}
