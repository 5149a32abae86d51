//! The deletion-confirmation workflow.
//!
//! Drift cleanup is guarded by an explicit two-phase state machine,
//! decoupled from any presentation layer: a CLI prompt or a daemon command
//! drives the transitions, it never owns the state.
//!
//! ```text
//! Offered ── begin_confirmation (capability re-checked) ──▶ PendingConfirmation
//!    │                                                          │        │
//!    └────────────── cancel ──────────────┐                 confirm   cancel
//!                                         ▼                     ▼        ▼
//!                                     Cancelled              Applied  Cancelled
//! ```
//!
//! Terminal states reject every further transition: the workflow is
//! single-shot per drift set. A later reconciliation run recomputes drift
//! from scratch and produces a new offer if drift persists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use concord_core::types::ActorId;

use crate::adapter::{AdapterError, SpaceAdapter};
use crate::drift::DriftObject;
use crate::error::EngineError;
use crate::reconcile::UnitFailure;

// ---------------------------------------------------------------------------
// Capability probe
// ---------------------------------------------------------------------------

/// Fresh authorization check for an acting identity, performed at the
/// moment of the Offered → PendingConfirmation transition.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn can_manage_structure(&self, actor: &ActorId) -> Result<bool, AdapterError>;
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Why a workflow ended in `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// Explicit user action.
    Dismissed,
    /// The bounded confirmation wait elapsed with no response.
    Expired,
}

/// Outcome of an applied deletion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub deleted: Vec<String>,
    pub failed: Vec<UnitFailure>,
}

/// Workflow state. `Applied` and `Cancelled` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    Offered,
    PendingConfirmation,
    Applied(ApplyReport),
    Cancelled(CancelReason),
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Applied(_) | WorkflowState::Cancelled(_))
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A single-shot guarded batch delete over one set of drift objects.
#[derive(Debug, Clone)]
pub struct DeletionWorkflow {
    objects: Vec<DriftObject>,
    requested_by: ActorId,
    state: WorkflowState,
}

impl DeletionWorkflow {
    /// Present a drift set for deletion. Entry point of the machine.
    pub fn offer(objects: Vec<DriftObject>, requested_by: ActorId) -> Self {
        Self {
            objects,
            requested_by,
            state: WorkflowState::Offered,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn objects(&self) -> &[DriftObject] {
        &self.objects
    }

    pub fn requested_by(&self) -> &ActorId {
        &self.requested_by
    }

    /// Offered → PendingConfirmation.
    ///
    /// Requires the acting identity to presently hold the
    /// structural-management capability; on a permission failure the state
    /// stays Offered and the error is returned to the caller.
    pub async fn begin_confirmation(
        &mut self,
        probe: &dyn CapabilityProbe,
    ) -> Result<(), EngineError> {
        if !matches!(self.state, WorkflowState::Offered) {
            return Err(EngineError::Workflow(
                "confirmation can only begin from the Offered state",
            ));
        }

        let allowed = probe
            .can_manage_structure(&self.requested_by)
            .await
            .map_err(EngineError::from_adapter)?;
        if !allowed {
            warn!(actor = %self.requested_by, "deletion confirmation rejected: missing capability");
            return Err(EngineError::Permission(format!(
                "'{}' lacks the structural-management capability",
                self.requested_by
            )));
        }

        self.state = WorkflowState::PendingConfirmation;
        Ok(())
    }

    /// PendingConfirmation → Applied.
    ///
    /// Deletes each offered object independently; one failed delete never
    /// blocks the rest. The report enumerates failed names with reasons.
    pub async fn confirm<A: SpaceAdapter + ?Sized>(
        &mut self,
        adapter: &A,
    ) -> Result<ApplyReport, EngineError> {
        if !matches!(self.state, WorkflowState::PendingConfirmation) {
            return Err(EngineError::Workflow(
                "confirm requires the PendingConfirmation state",
            ));
        }

        let mut report = ApplyReport::default();
        for object in &self.objects {
            let deleted = match object {
                DriftObject::Category(c) => adapter.delete_category(&c.id).await,
                DriftObject::Channel(c) => adapter.delete_channel(&c.id).await,
            };
            match deleted {
                Ok(()) => {
                    info!(object = %object.label(), "deleted drift object");
                    report.deleted.push(object.name().to_string());
                }
                Err(err) => {
                    warn!(object = %object.label(), error = %err, "drift delete failed");
                    report
                        .failed
                        .push(UnitFailure::new(object.name(), err.to_string()));
                }
            }
        }

        self.state = WorkflowState::Applied(report.clone());
        Ok(report)
    }

    /// Offered / PendingConfirmation → Cancelled. No mutation; an expired
    /// wait and an explicit dismissal land in the same terminal state.
    pub fn cancel(&mut self, reason: CancelReason) -> Result<(), EngineError> {
        if self.state.is_terminal() {
            return Err(EngineError::Workflow("workflow already completed"));
        }
        info!(reason = ?reason, "deletion workflow cancelled");
        self.state = WorkflowState::Cancelled(reason);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
