//! Registry of pending deletion-confirmation workflows.
//!
//! One workflow per space at a time. Entries carry a deadline; the runtime
//! sweeper cancels expired ones cooperatively — an in-flight confirm is
//! never interrupted, expiry only prevents starting one.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use concord_engine::{CancelReason, DeletionWorkflow};

/// One pending workflow with its expiry deadline.
#[derive(Debug)]
pub struct PendingEntry {
    pub workflow: DeletionWorkflow,
    pub deadline: Instant,
}

/// Pending workflows keyed by space.
#[derive(Debug, Default)]
pub struct PendingDeletions {
    entries: HashMap<String, PendingEntry>,
}

impl PendingDeletions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh offer for `space`, replacing any previous one (a
    /// newer reconciliation run recomputed drift from scratch).
    pub fn offer(&mut self, space: &str, workflow: DeletionWorkflow, ttl: Duration, now: Instant) {
        self.entries.insert(
            space.to_string(),
            PendingEntry {
                workflow,
                deadline: now + ttl,
            },
        );
    }

    pub fn get_mut(&mut self, space: &str) -> Option<&mut PendingEntry> {
        self.entries.get_mut(space)
    }

    /// Remove and return the entry for `space`.
    pub fn take(&mut self, space: &str) -> Option<PendingEntry> {
        self.entries.remove(space)
    }

    /// Put a taken entry back, keeping its original deadline.
    pub fn reinsert(&mut self, space: &str, entry: PendingEntry) {
        self.entries.insert(space.to_string(), entry);
    }

    pub fn contains(&self, space: &str) -> bool {
        self.entries.contains_key(space)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cancel and drop every entry whose deadline has passed. Returns the
    /// affected space names.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(space, _)| space.clone())
            .collect();

        for space in &expired {
            if let Some(mut entry) = self.entries.remove(space) {
                // Already-terminal workflows just get dropped.
                let _ = entry.workflow.cancel(CancelReason::Expired);
            }
        }
        expired
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
