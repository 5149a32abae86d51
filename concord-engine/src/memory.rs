//! In-memory space adapter.
//!
//! Backs two things: the engine's test suite, and `concord plan`, which
//! rehearses a run against a seeded copy of live state so nothing touches
//! the remote system. Mutations are recorded so callers can assert exactly
//! which calls a run issued (the position-stability property depends on
//! proving the *absence* of an edit).
//!
//! Position semantics mirror the remote system loosely: seeded objects keep
//! whatever absolute positions they are given; any create or position edit
//! in a scope re-numbers that scope 0..n. Only ranks are meaningful.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use concord_core::types::{
    ActorId, CategoryName, ChannelKind, ChannelName, LiveCategory, LiveChannel, RemoteId,
};

use crate::adapter::{AdapterError, ChannelEdit, LiveSnapshot, NewChannel, SpaceAdapter};
use crate::confirm::CapabilityProbe;

// ---------------------------------------------------------------------------
// Recorded operations
// ---------------------------------------------------------------------------

/// One mutating adapter call, as issued by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateCategory { name: CategoryName, position: usize },
    EditCategory { id: RemoteId, position: usize },
    CreateChannel { category: RemoteId, name: ChannelName },
    EditChannel { id: RemoteId, edit: ChannelEdit },
    DeleteCategory { id: RemoteId },
    DeleteChannel { id: RemoteId },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemCategory {
    id: RemoteId,
    name: CategoryName,
    position: i64,
}

#[derive(Debug, Clone)]
struct MemChannel {
    id: RemoteId,
    name: ChannelName,
    kind: ChannelKind,
    topic: Option<String>,
    nsfw: bool,
    position: i64,
    parent: Option<RemoteId>,
}

#[derive(Debug, Default)]
struct State {
    categories: Vec<MemCategory>,
    channels: Vec<MemChannel>,
    next_id: u64,
    capability: bool,
    managers: HashSet<ActorId>,
    fail_creates: HashSet<String>,
    fail_edits: HashSet<String>,
    fail_deletes: HashSet<String>,
    ops: Vec<Operation>,
}

impl State {
    fn mint_id(&mut self) -> RemoteId {
        self.next_id += 1;
        RemoteId(self.next_id.to_string())
    }

    /// Re-number one scope to even positions 0, 2, 4, … after a mutation.
    /// The gaps let a rank-targeted insert land strictly between neighbors.
    fn renumber_categories(&mut self) {
        self.categories
            .sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
        for (idx, category) in self.categories.iter_mut().enumerate() {
            category.position = idx as i64 * 2;
        }
    }

    fn renumber_channels(&mut self, parent: &Option<RemoteId>) {
        let mut scoped: Vec<&mut MemChannel> = self
            .channels
            .iter_mut()
            .filter(|ch| &ch.parent == parent)
            .collect();
        scoped.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
        for (idx, channel) in scoped.into_iter().enumerate() {
            channel.position = idx as i64 * 2;
        }
    }

    /// Rank → a position value that sorts into that rank in a freshly
    /// renumbered scope.
    fn insertion_position(ordered_len: usize, rank: usize) -> i64 {
        if rank >= ordered_len {
            i64::MAX / 2
        } else {
            rank as i64 * 2 - 1
        }
    }

    /// Position that moves an existing item to `rank` among `others`
    /// (the sorted positions of the scope minus the item itself).
    fn move_position(others: &[i64], rank: usize) -> i64 {
        if rank >= others.len() {
            i64::MAX / 2
        } else {
            others[rank] - 1
        }
    }
}

/// An in-memory target space.
#[derive(Debug, Default)]
pub struct InMemorySpace {
    state: Mutex<State>,
}

impl InMemorySpace {
    /// An empty space whose credential holds the management capability.
    pub fn new() -> Self {
        let space = Self::default();
        space.lock().capability = true;
        space
    }

    /// Build a space mirroring `snapshot`, for side-effect-free rehearsal.
    pub fn from_snapshot(snapshot: &LiveSnapshot) -> Self {
        let space = Self::new();
        {
            let mut state = space.lock();
            for category in &snapshot.categories {
                state.categories.push(MemCategory {
                    id: category.id.clone(),
                    name: category.name.clone(),
                    position: category.position,
                });
            }
            let channels = snapshot
                .channels
                .values()
                .flatten()
                .chain(snapshot.uncategorized.iter());
            for channel in channels {
                state.channels.push(MemChannel {
                    id: channel.id.clone(),
                    name: channel.name.clone(),
                    kind: channel.kind,
                    topic: channel.topic.clone(),
                    nsfw: channel.nsfw,
                    position: channel.position,
                    parent: channel.parent.clone(),
                });
            }
            // Minted ids must not collide with mirrored ones.
            state.next_id = 1_000_000;
        }
        space
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -- seeding ------------------------------------------------------------

    /// Seed a category with an explicit absolute position. Not recorded as
    /// an operation.
    pub fn seed_category(&self, name: &str, position: i64) -> RemoteId {
        let mut state = self.lock();
        let id = state.mint_id();
        state.categories.push(MemCategory {
            id: id.clone(),
            name: CategoryName::from(name),
            position,
        });
        id
    }

    /// Seed a channel with an explicit absolute position. Not recorded.
    pub fn seed_channel(
        &self,
        parent: Option<&RemoteId>,
        name: &str,
        kind: ChannelKind,
        topic: Option<&str>,
        nsfw: bool,
        position: i64,
    ) -> RemoteId {
        let mut state = self.lock();
        let id = state.mint_id();
        state.channels.push(MemChannel {
            id: id.clone(),
            name: ChannelName::from(name),
            kind,
            topic: topic.map(str::to_owned),
            nsfw,
            position,
            parent: parent.cloned(),
        });
        id
    }

    // -- knobs --------------------------------------------------------------

    /// Drop the engine credential's management capability.
    pub fn revoke_capability(&self) {
        self.lock().capability = false;
    }

    /// Grant an acting identity the structural-management capability.
    pub fn grant_manage(&self, actor: &str) {
        self.lock().managers.insert(ActorId::from(actor));
    }

    /// Make every create of an object with this name fail.
    pub fn fail_create(&self, name: &str) {
        self.lock().fail_creates.insert(name.to_string());
    }

    /// Make every edit of the object with this name fail.
    pub fn fail_edit(&self, name: &str) {
        self.lock().fail_edits.insert(name.to_string());
    }

    /// Make every delete of the object with this name fail.
    pub fn fail_delete(&self, name: &str) {
        self.lock().fail_deletes.insert(name.to_string());
    }

    // -- inspection ---------------------------------------------------------

    /// Every mutating call issued so far, in order.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().ops.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock().ops.len()
    }

    /// Live categories ordered by position. Reading never renumbers.
    pub fn categories(&self) -> Vec<LiveCategory> {
        let state = self.lock();
        let mut listed: Vec<LiveCategory> = state
            .categories
            .iter()
            .map(|c| LiveCategory {
                id: c.id.clone(),
                name: c.name.clone(),
                position: c.position,
            })
            .collect();
        listed.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
        listed
    }

    /// Channels of one category ordered by position.
    pub fn channels_of(&self, category: &RemoteId) -> Vec<LiveChannel> {
        let state = self.lock();
        let mut scoped: Vec<LiveChannel> = state
            .channels
            .iter()
            .filter(|ch| ch.parent.as_ref() == Some(category))
            .map(to_live_channel)
            .collect();
        scoped.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
        scoped
    }

    /// Find any channel by name, across all scopes.
    pub fn find_channel(&self, name: &str) -> Option<LiveChannel> {
        self.lock()
            .channels
            .iter()
            .find(|ch| ch.name.0 == name)
            .map(to_live_channel)
    }

    /// Find a category by name.
    pub fn find_category(&self, name: &str) -> Option<LiveCategory> {
        self.lock()
            .categories
            .iter()
            .find(|c| c.name.0 == name)
            .map(|c| LiveCategory {
                id: c.id.clone(),
                name: c.name.clone(),
                position: c.position,
            })
    }
}

fn to_live_channel(ch: &MemChannel) -> LiveChannel {
    LiveChannel {
        id: ch.id.clone(),
        name: ch.name.clone(),
        kind: ch.kind,
        topic: ch.topic.clone(),
        nsfw: ch.nsfw,
        position: ch.position,
        parent: ch.parent.clone(),
    }
}

// ---------------------------------------------------------------------------
// SpaceAdapter
// ---------------------------------------------------------------------------

#[async_trait]
impl SpaceAdapter for InMemorySpace {
    async fn check_capability(&self) -> Result<(), AdapterError> {
        if self.lock().capability {
            Ok(())
        } else {
            Err(AdapterError::Permission(
                "credential lacks the structural-management capability".to_string(),
            ))
        }
    }

    async fn list_categories(&self) -> Result<Vec<LiveCategory>, AdapterError> {
        Ok(self.categories())
    }

    async fn list_channels(&self, category: &RemoteId) -> Result<Vec<LiveChannel>, AdapterError> {
        Ok(self.channels_of(category))
    }

    async fn list_uncategorized(&self) -> Result<Vec<LiveChannel>, AdapterError> {
        let state = self.lock();
        let mut scoped: Vec<LiveChannel> = state
            .channels
            .iter()
            .filter(|ch| ch.parent.is_none())
            .map(to_live_channel)
            .collect();
        scoped.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(scoped)
    }

    async fn create_category(
        &self,
        name: &CategoryName,
        position: usize,
    ) -> Result<LiveCategory, AdapterError> {
        let mut state = self.lock();
        if state.fail_creates.contains(name.0.as_str()) {
            return Err(AdapterError::Remote(format!(
                "create of category '{name}' rejected"
            )));
        }
        state.ops.push(Operation::CreateCategory {
            name: name.clone(),
            position,
        });

        state.renumber_categories();
        let id = state.mint_id();
        let insert_at = State::insertion_position(state.categories.len(), position);
        state.categories.push(MemCategory {
            id: id.clone(),
            name: name.clone(),
            position: insert_at,
        });
        state.renumber_categories();

        let created = state
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| LiveCategory {
                id: c.id.clone(),
                name: c.name.clone(),
                position: c.position,
            })
            .ok_or_else(|| AdapterError::Remote("created category vanished".to_string()))?;
        Ok(created)
    }

    async fn create_channel(
        &self,
        category: &RemoteId,
        channel: NewChannel,
    ) -> Result<LiveChannel, AdapterError> {
        let mut state = self.lock();
        if !state.categories.iter().any(|c| &c.id == category) {
            return Err(AdapterError::NotFound(format!(
                "category {category} does not exist"
            )));
        }
        if state.fail_creates.contains(channel.name.0.as_str()) {
            return Err(AdapterError::Remote(format!(
                "create of channel '{}' rejected",
                channel.name
            )));
        }
        state.ops.push(Operation::CreateChannel {
            category: category.clone(),
            name: channel.name.clone(),
        });

        let parent = Some(category.clone());
        state.renumber_channels(&parent);
        let scope_len = state
            .channels
            .iter()
            .filter(|ch| ch.parent == parent)
            .count();
        let rank = channel.position.unwrap_or(scope_len);
        let id = state.mint_id();
        state.channels.push(MemChannel {
            id: id.clone(),
            name: channel.name,
            kind: channel.kind,
            topic: if channel.kind.supports_topic() {
                channel.topic
            } else {
                None
            },
            nsfw: channel.nsfw,
            position: State::insertion_position(scope_len, rank),
            parent: parent.clone(),
        });
        state.renumber_channels(&parent);

        let created = state
            .channels
            .iter()
            .find(|ch| ch.id == id)
            .map(to_live_channel)
            .ok_or_else(|| AdapterError::Remote("created channel vanished".to_string()))?;
        Ok(created)
    }

    async fn edit_category(&self, id: &RemoteId, position: usize) -> Result<(), AdapterError> {
        let mut state = self.lock();
        let name = state
            .categories
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.name.0.clone())
            .ok_or_else(|| AdapterError::NotFound(format!("category {id} does not exist")))?;
        if state.fail_edits.contains(name.as_str()) {
            return Err(AdapterError::Remote(format!(
                "edit of category '{name}' rejected"
            )));
        }
        state.ops.push(Operation::EditCategory {
            id: id.clone(),
            position,
        });

        state.renumber_categories();
        let mut others: Vec<i64> = state
            .categories
            .iter()
            .filter(|c| &c.id != id)
            .map(|c| c.position)
            .collect();
        others.sort_unstable();
        let target = State::move_position(&others, position);
        if let Some(category) = state.categories.iter_mut().find(|c| &c.id == id) {
            category.position = target;
        }
        state.renumber_categories();
        Ok(())
    }

    async fn edit_channel(&self, id: &RemoteId, edit: ChannelEdit) -> Result<(), AdapterError> {
        let mut state = self.lock();
        let (name, parent) = state
            .channels
            .iter()
            .find(|ch| &ch.id == id)
            .map(|ch| (ch.name.0.clone(), ch.parent.clone()))
            .ok_or_else(|| AdapterError::NotFound(format!("channel {id} does not exist")))?;
        if state.fail_edits.contains(name.as_str()) {
            return Err(AdapterError::Remote(format!(
                "edit of channel '{name}' rejected"
            )));
        }
        state.ops.push(Operation::EditChannel {
            id: id.clone(),
            edit: edit.clone(),
        });

        state.renumber_channels(&parent);
        let mut others: Vec<i64> = state
            .channels
            .iter()
            .filter(|ch| ch.parent == parent && &ch.id != id)
            .map(|ch| ch.position)
            .collect();
        others.sort_unstable();
        if let Some(channel) = state.channels.iter_mut().find(|ch| &ch.id == id) {
            if let Some(topic) = edit.topic {
                channel.topic = if topic.is_empty() { None } else { Some(topic) };
            }
            if let Some(nsfw) = edit.nsfw {
                channel.nsfw = nsfw;
            }
            if let Some(rank) = edit.position {
                channel.position = State::move_position(&others, rank);
            }
        }
        state.renumber_channels(&parent);
        Ok(())
    }

    async fn delete_category(&self, id: &RemoteId) -> Result<(), AdapterError> {
        let mut state = self.lock();
        let name = state
            .categories
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.name.0.clone())
            .ok_or_else(|| AdapterError::NotFound(format!("category {id} does not exist")))?;
        if state.fail_deletes.contains(name.as_str()) {
            return Err(AdapterError::Remote(format!(
                "delete of category '{name}' rejected"
            )));
        }
        state.ops.push(Operation::DeleteCategory { id: id.clone() });
        state.categories.retain(|c| &c.id != id);
        // Channels of a deleted category become uncategorized, matching the
        // remote system's behavior.
        for channel in state.channels.iter_mut() {
            if channel.parent.as_ref() == Some(id) {
                channel.parent = None;
            }
        }
        Ok(())
    }

    async fn delete_channel(&self, id: &RemoteId) -> Result<(), AdapterError> {
        let mut state = self.lock();
        let name = state
            .channels
            .iter()
            .find(|ch| &ch.id == id)
            .map(|ch| ch.name.0.clone())
            .ok_or_else(|| AdapterError::NotFound(format!("channel {id} does not exist")))?;
        if state.fail_deletes.contains(name.as_str()) {
            return Err(AdapterError::Remote(format!(
                "delete of channel '{name}' rejected"
            )));
        }
        state.ops.push(Operation::DeleteChannel { id: id.clone() });
        state.channels.retain(|ch| &ch.id != id);
        Ok(())
    }
}

#[async_trait]
impl CapabilityProbe for InMemorySpace {
    async fn can_manage_structure(&self, actor: &ActorId) -> Result<bool, AdapterError> {
        Ok(self.lock().managers.contains(actor))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
