//! The Live State Adapter seam.
//!
//! [`SpaceAdapter`] is the engine's only window onto the remote system.
//! Every call may fail or block independently; the reconciler issues them
//! one at a time in template order and awaits each before proceeding,
//! because remote mutation ordering (category created before its channels,
//! position edits in rank order) depends on prior calls completing.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use concord_core::types::{
    CategoryName, ChannelKind, ChannelName, LiveCategory, LiveChannel, RemoteId,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single adapter call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// The engine's credential lacks the capability for this call.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The referenced remote object does not exist (any more).
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote system rejected the operation.
    #[error("remote operation failed: {0}")]
    Remote(String),
}

// ---------------------------------------------------------------------------
// Mutation payloads
// ---------------------------------------------------------------------------

/// Arguments for creating a channel inside a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub name: ChannelName,
    pub kind: ChannelKind,
    /// Topic text; only meaningful for text channels.
    pub topic: Option<String>,
    pub nsfw: bool,
    /// Desired rank among the category's channels. `None` appends.
    pub position: Option<usize>,
}

/// A combined attribute edit for an existing channel. All changed
/// attributes travel in one call — never one call per attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelEdit {
    /// New topic text (empty string clears).
    pub topic: Option<String>,
    pub nsfw: Option<bool>,
    /// New rank among the category's channels.
    pub position: Option<usize>,
}

impl ChannelEdit {
    /// True when no attribute changed — no call should be issued.
    pub fn is_empty(&self) -> bool {
        self.topic.is_none() && self.nsfw.is_none() && self.position.is_none()
    }
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// Query/mutation interface to one target space.
///
/// Implementations: the HTTP client in `concord-rest`, and the in-memory
/// space in [`crate::memory`] used for dry-run planning and tests.
#[async_trait]
pub trait SpaceAdapter: Send + Sync {
    /// Verify that the engine's own credential holds the
    /// structural-management capability. Called once per run, before any
    /// mutation.
    async fn check_capability(&self) -> Result<(), AdapterError>;

    async fn list_categories(&self) -> Result<Vec<LiveCategory>, AdapterError>;

    /// Channels owned by one category.
    async fn list_channels(&self, category: &RemoteId) -> Result<Vec<LiveChannel>, AdapterError>;

    /// Channels outside any category.
    async fn list_uncategorized(&self) -> Result<Vec<LiveChannel>, AdapterError>;

    async fn create_category(
        &self,
        name: &CategoryName,
        position: usize,
    ) -> Result<LiveCategory, AdapterError>;

    async fn create_channel(
        &self,
        category: &RemoteId,
        channel: NewChannel,
    ) -> Result<LiveChannel, AdapterError>;

    async fn edit_category(&self, id: &RemoteId, position: usize) -> Result<(), AdapterError>;

    async fn edit_channel(&self, id: &RemoteId, edit: ChannelEdit) -> Result<(), AdapterError>;

    async fn delete_category(&self, id: &RemoteId) -> Result<(), AdapterError>;

    async fn delete_channel(&self, id: &RemoteId) -> Result<(), AdapterError>;
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Live state read once at run start. Never cached across runs — staleness
/// is accepted and corrected on the next run.
#[derive(Debug, Clone, Default)]
pub struct LiveSnapshot {
    pub categories: Vec<LiveCategory>,
    /// Channels keyed by owning category id.
    pub channels: HashMap<RemoteId, Vec<LiveChannel>>,
    pub uncategorized: Vec<LiveChannel>,
}

impl LiveSnapshot {
    /// Read the full structure of the space through `adapter`.
    pub async fn read<A: SpaceAdapter + ?Sized>(adapter: &A) -> Result<Self, AdapterError> {
        let categories = adapter.list_categories().await?;
        let mut channels = HashMap::new();
        for category in &categories {
            let listed = adapter.list_channels(&category.id).await?;
            channels.insert(category.id.clone(), listed);
        }
        let uncategorized = adapter.list_uncategorized().await?;
        Ok(Self {
            categories,
            channels,
            uncategorized,
        })
    }

    /// Channels of one category, empty when unknown.
    pub fn channels_in(&self, category: &RemoteId) -> &[LiveChannel] {
        self.channels
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find a live category by exact name.
    pub fn category_by_name(&self, name: &CategoryName) -> Option<&LiveCategory> {
        self.categories.iter().find(|c| &c.name == name)
    }
}

/// Ids of a scope ordered by the rank their absolute positions induce.
///
/// Ties break on id so the ordering is deterministic regardless of what the
/// remote system hands back.
pub(crate) fn rank_order(items: impl Iterator<Item = (RemoteId, i64)>) -> Vec<RemoteId> {
    let mut keyed: Vec<(i64, RemoteId)> = items.map(|(id, pos)| (pos, id)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1 .0.cmp(&b.1 .0)));
    keyed.into_iter().map(|(_, id)| id).collect()
}
