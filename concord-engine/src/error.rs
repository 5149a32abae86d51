//! Error types for concord-engine.
//!
//! Unit-scoped failures (a single rejected create, an unparseable template
//! unit, an unknown kind) are *not* errors at this level — they are folded
//! into the run result as [`crate::reconcile::UnitFailure`] entries. The
//! variants here are the ones that stop processing.

use thiserror::Error;

use crate::adapter::AdapterError;

/// Errors that abort an engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine's credential or the acting identity lacks the
    /// structural-management capability. Raised before any mutation for the
    /// affected scope, or when a workflow transition is rejected.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A non-permission adapter failure on a call the whole run depends on
    /// (reading the live snapshot).
    #[error("adapter error: {0}")]
    Adapter(#[source] AdapterError),

    /// A deletion-workflow transition was requested from the wrong state.
    #[error("invalid workflow transition: {0}")]
    Workflow(&'static str),
}

impl EngineError {
    /// Map an adapter failure, routing permission problems to
    /// [`EngineError::Permission`].
    pub(crate) fn from_adapter(err: AdapterError) -> Self {
        match err {
            AdapterError::Permission(msg) => EngineError::Permission(msg),
            other => EngineError::Adapter(other),
        }
    }
}
