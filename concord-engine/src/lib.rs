//! The Concord reconciliation engine.
//!
//! Consumes a parsed template and converges the live structure of a remote
//! space toward it: create/update diffing per category and per channel,
//! smart relative-position corrections, drift detection, and a two-phase
//! deletion-confirmation workflow for drift cleanup. All remote access goes
//! through the [`SpaceAdapter`] seam; every mutating call is independently
//! failable and unit failures never abort a run.

pub mod adapter;
pub mod confirm;
pub mod drift;
pub mod error;
pub mod memory;
pub mod reconcile;
pub mod report;

pub use adapter::{AdapterError, ChannelEdit, LiveSnapshot, NewChannel, SpaceAdapter};
pub use confirm::{ApplyReport, CancelReason, CapabilityProbe, DeletionWorkflow, WorkflowState};
pub use drift::{find_drift, Drift, DriftObject};
pub use error::EngineError;
pub use reconcile::{
    CategoryOutcome, ReconcilePolicy, ReconciliationResult, Reconciler, UnitFailure,
};
pub use report::{format_report, render, render_deletions, summarize, ChangeLine, ChangeTag};
