//! The reconciliation algorithm.
//!
//! One run walks the template in declared order and converges the live
//! space toward it, applying side effects through the adapter as it
//! proceeds (never a deferred batch commit):
//!
//! 1. capability preflight — a permission failure aborts before any
//!    mutation;
//! 2. read the live snapshot once;
//! 3. per category: create missing ones (appended in template order), move
//!    present ones only when their rank among live categories differs from
//!    the declared rank;
//! 4. per channel, scoped to its category: same matching by name, plus a
//!    combined attribute edit for topic (text kind only) and nsfw;
//! 5. unmatched live objects feed the drift lists;
//! 6. every unit failure is recorded and processing continues.
//!
//! Ranks are computed once per scope from the snapshot and maintained
//! incrementally as creates and moves land, so a rank that already matches
//! is left untouched even when absolute position numbers differ.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use concord_core::types::{
    CategoryName, CategorySpec, ChannelName, ChannelSpec, LiveCategory, LiveChannel,
    LoadedTemplate, RemoteId,
};

use crate::adapter::{rank_order, ChannelEdit, LiveSnapshot, NewChannel, SpaceAdapter};
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tunable reconciliation policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilePolicy {
    /// Uncategorized live channels with these names are not drift.
    /// Empty by default: every uncategorized channel is flagged.
    #[serde(default)]
    pub allowed_uncategorized: Vec<ChannelName>,
}

impl ReconcilePolicy {
    pub fn allows_uncategorized(&self, name: &ChannelName) -> bool {
        self.allowed_uncategorized.contains(name)
    }
}

// ---------------------------------------------------------------------------
// Run result
// ---------------------------------------------------------------------------

/// A unit that could not be processed, with the reason preserved for the
/// report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub name: String,
    pub reason: String,
}

impl UnitFailure {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of reconciling one declared category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub name: CategoryName,
    /// The category itself was created this run.
    pub created: bool,
    /// The category itself was repositioned this run.
    pub moved: bool,
    pub created_channels: Vec<ChannelName>,
    pub updated_channels: Vec<ChannelName>,
    /// Matched channels with nothing to change.
    pub skipped_channels: Vec<ChannelName>,
    pub failed_units: Vec<UnitFailure>,
    /// Live channels in this category not declared by the template.
    pub extra_channels: Vec<LiveChannel>,
}

impl CategoryOutcome {
    fn new(name: CategoryName) -> Self {
        Self {
            name,
            created: false,
            moved: false,
            created_channels: Vec::new(),
            updated_channels: Vec::new(),
            skipped_channels: Vec::new(),
            failed_units: Vec::new(),
            extra_channels: Vec::new(),
        }
    }
}

/// Structured result of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Template metadata name, reporting only.
    pub template_name: Option<String>,
    pub categories: Vec<CategoryOutcome>,
    /// Declared categories that never got as far as a [`CategoryOutcome`]
    /// (category-level template issues).
    pub skipped_categories: Vec<UnitFailure>,
    /// Live categories not declared by the template.
    pub extra_categories: Vec<LiveCategory>,
    /// Uncategorized live channels not in the policy allow-list.
    pub extra_uncategorized: Vec<LiveChannel>,
}

impl ReconciliationResult {
    pub fn created_count(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.created_channels.len() + usize::from(c.created))
            .sum()
    }

    pub fn updated_count(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.updated_channels.len() + usize::from(c.moved))
            .sum()
    }

    pub fn failed_count(&self) -> usize {
        self.skipped_categories.len()
            + self
                .categories
                .iter()
                .map(|c| c.failed_units.len())
                .sum::<usize>()
    }

    /// True when the run found nothing to create, change, flag, or fail.
    pub fn is_converged(&self) -> bool {
        self.created_count() == 0
            && self.updated_count() == 0
            && self.failed_count() == 0
            && !self.has_drift()
    }

    pub fn has_drift(&self) -> bool {
        !self.extra_categories.is_empty()
            || !self.extra_uncategorized.is_empty()
            || self.categories.iter().any(|c| !c.extra_channels.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The reconciliation engine for one target space.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Run one reconciliation pass over `adapter`.
    ///
    /// Side effects are applied as the walk proceeds. Unit failures are
    /// folded into the result; only a failed capability preflight or a
    /// failed snapshot read abort the run.
    pub async fn run<A: SpaceAdapter + ?Sized>(
        &self,
        template: &LoadedTemplate,
        adapter: &A,
    ) -> Result<ReconciliationResult, EngineError> {
        adapter
            .check_capability()
            .await
            .map_err(EngineError::from_adapter)?;

        let snapshot = LiveSnapshot::read(adapter)
            .await
            .map_err(EngineError::from_adapter)?;
        let doc = &template.document;

        info!(
            template = doc.meta.name.as_deref().unwrap_or("unnamed"),
            declared = doc.categories.len(),
            live = snapshot.categories.len(),
            "starting reconciliation"
        );

        let mut result = ReconciliationResult {
            template_name: doc.meta.name.clone(),
            ..Default::default()
        };

        // Category-level template issues never produced a CategorySpec.
        for issue in template.issues.iter().filter(|i| i.category.is_none()) {
            result
                .skipped_categories
                .push(UnitFailure::new(&issue.unit, &issue.reason));
        }

        // Working rank order of live categories, updated as creates and
        // moves land so later iterations see the effect of earlier ones.
        let mut category_order = rank_order(
            snapshot
                .categories
                .iter()
                .map(|c| (c.id.clone(), c.position)),
        );
        let by_name: HashMap<&CategoryName, &LiveCategory> =
            snapshot.categories.iter().map(|c| (&c.name, c)).collect();

        // Number of declared categories placed so far this run; a created
        // category lands immediately after them.
        let mut placed = 0usize;

        for spec in &doc.categories {
            let mut outcome = CategoryOutcome::new(spec.name.clone());

            for issue in template
                .issues
                .iter()
                .filter(|i| i.category.as_ref() == Some(&spec.name))
            {
                outcome
                    .failed_units
                    .push(UnitFailure::new(&issue.unit, &issue.reason));
            }

            let category_id = match by_name.get(&spec.name) {
                Some(live) => {
                    self.reposition_category(adapter, spec, live, &mut category_order, &mut outcome)
                        .await;
                    placed += 1;
                    live.id.clone()
                }
                None => {
                    let rank = placed.min(category_order.len());
                    match adapter.create_category(&spec.name, rank).await {
                        Ok(created) => {
                            info!(category = %spec.name, rank, "created category");
                            category_order.insert(rank, created.id.clone());
                            outcome.created = true;
                            placed += 1;
                            created.id
                        }
                        Err(err) => {
                            warn!(category = %spec.name, error = %err, "category create failed");
                            outcome
                                .failed_units
                                .push(UnitFailure::new(&spec.name.0, err.to_string()));
                            result.categories.push(outcome);
                            continue;
                        }
                    }
                }
            };

            self.reconcile_channels(adapter, spec, &category_id, &snapshot, &mut outcome)
                .await;

            result.categories.push(outcome);
        }

        // Post-loop drift: live categories never matched, and uncategorized
        // channels outside the allow-list.
        let declared: HashSet<&CategoryName> = doc.categories.iter().map(|c| &c.name).collect();
        result.extra_categories = snapshot
            .categories
            .iter()
            .filter(|c| !declared.contains(&c.name))
            .cloned()
            .collect();
        result.extra_uncategorized = snapshot
            .uncategorized
            .iter()
            .filter(|ch| !self.policy.allows_uncategorized(&ch.name))
            .cloned()
            .collect();

        info!(
            created = result.created_count(),
            updated = result.updated_count(),
            failed = result.failed_count(),
            drift = result.has_drift(),
            "reconciliation complete"
        );

        Ok(result)
    }

    /// Move a present category only when its rank among live categories
    /// differs from the declared rank.
    async fn reposition_category<A: SpaceAdapter + ?Sized>(
        &self,
        adapter: &A,
        spec: &CategorySpec,
        live: &LiveCategory,
        category_order: &mut Vec<RemoteId>,
        outcome: &mut CategoryOutcome,
    ) {
        let current_rank = match category_order.iter().position(|id| id == &live.id) {
            Some(rank) => rank,
            None => {
                outcome.failed_units.push(UnitFailure::new(
                    &spec.name.0,
                    "category vanished from the live snapshot mid-run",
                ));
                return;
            }
        };
        let desired_rank = spec.order.min(category_order.len().saturating_sub(1));

        if current_rank == desired_rank {
            debug!(category = %spec.name, rank = current_rank, "category rank already matches");
            return;
        }

        match adapter.edit_category(&live.id, desired_rank).await {
            Ok(()) => {
                info!(category = %spec.name, from = current_rank, to = desired_rank, "moved category");
                category_order.remove(current_rank);
                category_order.insert(desired_rank, live.id.clone());
                outcome.moved = true;
            }
            Err(err) => {
                warn!(category = %spec.name, error = %err, "category move failed");
                outcome
                    .failed_units
                    .push(UnitFailure::new(&spec.name.0, err.to_string()));
            }
        }
    }

    /// Reconcile the declared channels of one category, then flag unmatched
    /// live channels as drift.
    async fn reconcile_channels<A: SpaceAdapter + ?Sized>(
        &self,
        adapter: &A,
        spec: &CategorySpec,
        category_id: &RemoteId,
        snapshot: &LiveSnapshot,
        outcome: &mut CategoryOutcome,
    ) {
        let live_channels = snapshot.channels_in(category_id);
        let mut channel_order = rank_order(
            live_channels
                .iter()
                .map(|ch| (ch.id.clone(), ch.position)),
        );
        let by_name: HashMap<&ChannelName, &LiveChannel> =
            live_channels.iter().map(|ch| (&ch.name, ch)).collect();
        let mut matched: HashSet<RemoteId> = HashSet::new();

        for channel in &spec.channels {
            match by_name.get(&channel.name) {
                None => {
                    let rank = channel.order.min(channel_order.len());
                    let new = NewChannel {
                        name: channel.name.clone(),
                        kind: channel.kind,
                        topic: channel.topic.clone(),
                        nsfw: channel.nsfw,
                        position: Some(rank),
                    };
                    match adapter.create_channel(category_id, new).await {
                        Ok(created) => {
                            info!(category = %spec.name, channel = %channel.name, kind = %channel.kind, "created channel");
                            matched.insert(created.id.clone());
                            channel_order.insert(rank, created.id);
                            outcome.created_channels.push(channel.name.clone());
                        }
                        Err(err) => {
                            warn!(category = %spec.name, channel = %channel.name, error = %err, "channel create failed");
                            outcome
                                .failed_units
                                .push(UnitFailure::new(&channel.name.0, err.to_string()));
                        }
                    }
                }
                Some(live) => {
                    matched.insert(live.id.clone());
                    self.reconcile_existing_channel(
                        adapter,
                        spec,
                        channel,
                        live,
                        &mut channel_order,
                        outcome,
                    )
                    .await;
                }
            }
        }

        for live in live_channels {
            if !matched.contains(&live.id) {
                debug!(category = %spec.name, channel = %live.name, "extra channel not in template");
                outcome.extra_channels.push(live.clone());
            }
        }
    }

    /// Compute and apply the combined attribute diff for a matched channel.
    async fn reconcile_existing_channel<A: SpaceAdapter + ?Sized>(
        &self,
        adapter: &A,
        spec: &CategorySpec,
        channel: &ChannelSpec,
        live: &LiveChannel,
        channel_order: &mut Vec<RemoteId>,
        outcome: &mut CategoryOutcome,
    ) {
        // Kind never changes in place on the remote system; a matched name
        // with a different live kind is a failed unit, not an edit.
        if live.kind != channel.kind {
            outcome.failed_units.push(UnitFailure::new(
                &channel.name.0,
                format!(
                    "declared kind {} but live channel is {}; kind cannot change in place",
                    channel.kind, live.kind
                ),
            ));
            return;
        }

        let mut edit = ChannelEdit::default();

        if channel.kind.supports_topic() {
            let desired = channel.topic.clone().unwrap_or_default();
            let current = live.topic.clone().unwrap_or_default();
            if desired != current {
                edit.topic = Some(desired);
            }
        }
        if live.nsfw != channel.nsfw {
            edit.nsfw = Some(channel.nsfw);
        }

        let current_rank = channel_order.iter().position(|id| id == &live.id);
        let desired_rank = channel.order.min(channel_order.len().saturating_sub(1));
        if let Some(current) = current_rank {
            if current != desired_rank {
                edit.position = Some(desired_rank);
            }
        }

        if edit.is_empty() {
            debug!(category = %spec.name, channel = %channel.name, "channel unchanged");
            outcome.skipped_channels.push(channel.name.clone());
            return;
        }

        let moved_to = edit.position;
        match adapter.edit_channel(&live.id, edit).await {
            Ok(()) => {
                info!(category = %spec.name, channel = %channel.name, "updated channel");
                if let (Some(current), Some(rank)) = (current_rank, moved_to) {
                    channel_order.remove(current);
                    channel_order.insert(rank, live.id.clone());
                }
                outcome.updated_channels.push(channel.name.clone());
            }
            Err(err) => {
                warn!(category = %spec.name, channel = %channel.name, error = %err, "channel update failed");
                outcome
                    .failed_units
                    .push(UnitFailure::new(&channel.name.0, err.to_string()));
            }
        }
    }
}
