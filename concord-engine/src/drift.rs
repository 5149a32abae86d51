//! Drift detection.
//!
//! Drift is live structure not declared in the template. The reconciler
//! produces the same sets during its traversal; this standalone pure
//! function exists so drift logic is testable in isolation from the
//! mutating walk, and so callers can flag drift without applying anything.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use concord_core::types::{CategoryName, LiveCategory, LiveChannel, RemoteId, TemplateDocument};

use crate::adapter::LiveSnapshot;
use crate::reconcile::ReconcilePolicy;

/// One live object flagged as drift, carried into the deletion workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftObject {
    Category(LiveCategory),
    Channel(LiveChannel),
}

impl DriftObject {
    pub fn id(&self) -> &RemoteId {
        match self {
            DriftObject::Category(c) => &c.id,
            DriftObject::Channel(c) => &c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DriftObject::Category(c) => &c.name.0,
            DriftObject::Channel(c) => &c.name.0,
        }
    }

    /// Human label, e.g. `category 'Archive'` or `channel 'old-bot-spam'`.
    pub fn label(&self) -> String {
        match self {
            DriftObject::Category(c) => format!("category '{}'", c.name),
            DriftObject::Channel(c) => format!("channel '{}'", c.name),
        }
    }
}

/// Live structure present but not declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drift {
    /// Live categories whose names never matched a template entry.
    pub extra_categories: Vec<LiveCategory>,
    /// Per matched category: live channels not declared there.
    pub extra_channels: Vec<(CategoryName, Vec<LiveChannel>)>,
    /// Uncategorized live channels outside the allow-list.
    pub extra_uncategorized: Vec<LiveChannel>,
}

impl Drift {
    pub fn is_empty(&self) -> bool {
        self.extra_categories.is_empty()
            && self.extra_uncategorized.is_empty()
            && self.extra_channels.iter().all(|(_, chs)| chs.is_empty())
    }

    /// Flatten into the object set offered for deletion. Channels come
    /// before categories so a category is only deleted after its stray
    /// contents.
    pub fn objects(&self) -> Vec<DriftObject> {
        let mut objects: Vec<DriftObject> = Vec::new();
        for (_, channels) in &self.extra_channels {
            objects.extend(channels.iter().cloned().map(DriftObject::Channel));
        }
        objects.extend(
            self.extra_uncategorized
                .iter()
                .cloned()
                .map(DriftObject::Channel),
        );
        objects.extend(
            self.extra_categories
                .iter()
                .cloned()
                .map(DriftObject::Category),
        );
        objects
    }
}

impl crate::reconcile::ReconciliationResult {
    /// The drift a run flagged, in the same shape [`find_drift`] produces,
    /// ready to feed a deletion workflow.
    pub fn drift(&self) -> Drift {
        Drift {
            extra_categories: self.extra_categories.clone(),
            extra_channels: self
                .categories
                .iter()
                .filter(|c| !c.extra_channels.is_empty())
                .map(|c| (c.name.clone(), c.extra_channels.clone()))
                .collect(),
            extra_uncategorized: self.extra_uncategorized.clone(),
        }
    }
}

/// Identify live categories/channels absent from the template.
///
/// Pure over an already-read snapshot: matching by exact name, channel
/// checks scoped to the matched category only, uncategorized channels
/// filtered through the policy allow-list.
pub fn find_drift(
    document: &TemplateDocument,
    snapshot: &LiveSnapshot,
    policy: &ReconcilePolicy,
) -> Drift {
    let declared: HashSet<&CategoryName> = document.categories.iter().map(|c| &c.name).collect();

    let extra_categories = snapshot
        .categories
        .iter()
        .filter(|c| !declared.contains(&c.name))
        .cloned()
        .collect();

    let mut extra_channels = Vec::new();
    for spec in &document.categories {
        let Some(live) = snapshot.category_by_name(&spec.name) else {
            continue;
        };
        let declared_channels: HashSet<&str> =
            spec.channels.iter().map(|ch| ch.name.0.as_str()).collect();
        let extras: Vec<LiveChannel> = snapshot
            .channels_in(&live.id)
            .iter()
            .filter(|ch| !declared_channels.contains(ch.name.0.as_str()))
            .cloned()
            .collect();
        if !extras.is_empty() {
            extra_channels.push((spec.name.clone(), extras));
        }
    }

    let extra_uncategorized = snapshot
        .uncategorized
        .iter()
        .filter(|ch| !policy.allows_uncategorized(&ch.name))
        .cloned()
        .collect();

    Drift {
        extra_categories,
        extra_channels,
        extra_uncategorized,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use concord_core::types::{CategorySpec, ChannelKind, ChannelName, ChannelSpec};

    use super::*;

    fn live_category(id: &str, name: &str, position: i64) -> LiveCategory {
        LiveCategory {
            id: RemoteId::from(id),
            name: CategoryName::from(name),
            position,
        }
    }

    fn live_channel(id: &str, name: &str, parent: Option<&str>, position: i64) -> LiveChannel {
        LiveChannel {
            id: RemoteId::from(id),
            name: ChannelName::from(name),
            kind: ChannelKind::Text,
            topic: None,
            nsfw: false,
            position,
            parent: parent.map(RemoteId::from),
        }
    }

    fn template_with(categories: &[(&str, &[&str])]) -> TemplateDocument {
        TemplateDocument {
            meta: Default::default(),
            categories: categories
                .iter()
                .enumerate()
                .map(|(order, (name, channels))| CategorySpec {
                    name: CategoryName::from(*name),
                    order,
                    channels: channels
                        .iter()
                        .enumerate()
                        .map(|(idx, ch)| ChannelSpec {
                            name: ChannelName::from(*ch),
                            kind: ChannelKind::Text,
                            topic: None,
                            nsfw: false,
                            order: idx,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn snapshot() -> LiveSnapshot {
        let mut snapshot = LiveSnapshot {
            categories: vec![
                live_category("c1", "General", 0),
                live_category("c2", "Archive", 1),
            ],
            ..Default::default()
        };
        snapshot.channels.insert(
            RemoteId::from("c1"),
            vec![
                live_channel("ch1", "welcome", Some("c1"), 0),
                live_channel("ch2", "old-bot-spam", Some("c1"), 1),
            ],
        );
        snapshot
            .channels
            .insert(RemoteId::from("c2"), vec![live_channel("ch3", "dusty", Some("c2"), 0)]);
        snapshot.uncategorized = vec![live_channel("ch4", "lobby", None, 5)];
        snapshot
    }

    #[test]
    fn flags_exactly_the_undeclared_objects() {
        let doc = template_with(&[("General", &["welcome"])]);
        let drift = find_drift(&doc, &snapshot(), &ReconcilePolicy::default());

        assert_eq!(drift.extra_categories.len(), 1);
        assert_eq!(drift.extra_categories[0].name, CategoryName::from("Archive"));

        assert_eq!(drift.extra_channels.len(), 1);
        let (category, extras) = &drift.extra_channels[0];
        assert_eq!(category, &CategoryName::from("General"));
        assert_eq!(extras.len(), 1);
        assert_eq!(extras[0].name, ChannelName::from("old-bot-spam"));

        assert_eq!(drift.extra_uncategorized.len(), 1);
        assert_eq!(drift.extra_uncategorized[0].name, ChannelName::from("lobby"));
    }

    #[test]
    fn fully_declared_space_has_no_drift() {
        let doc = template_with(&[
            ("General", &["welcome", "old-bot-spam"]),
            ("Archive", &["dusty"]),
        ]);
        let policy = ReconcilePolicy {
            allowed_uncategorized: vec![ChannelName::from("lobby")],
        };
        let drift = find_drift(&doc, &snapshot(), &policy);
        assert!(drift.is_empty());
    }

    #[test]
    fn allow_list_exempts_uncategorized_channels() {
        let doc = template_with(&[("General", &["welcome", "old-bot-spam"]), ("Archive", &["dusty"])]);
        let drift = find_drift(&doc, &snapshot(), &ReconcilePolicy::default());
        assert_eq!(drift.extra_uncategorized.len(), 1);
    }

    #[test]
    fn name_matching_is_case_sensitive() {
        let doc = template_with(&[("general", &[])]);
        let drift = find_drift(&doc, &snapshot(), &ReconcilePolicy::default());
        // "General" does not match "general"; both live categories are extra.
        assert_eq!(drift.extra_categories.len(), 2);
    }

    #[test]
    fn objects_lists_channels_before_categories() {
        let doc = template_with(&[("General", &["welcome"])]);
        let drift = find_drift(&doc, &snapshot(), &ReconcilePolicy::default());
        let objects = drift.objects();
        assert_eq!(objects.len(), 3);
        assert!(matches!(objects[0], DriftObject::Channel(_)));
        assert!(matches!(objects[1], DriftObject::Channel(_)));
        assert!(matches!(objects[2], DriftObject::Category(_)));
        assert_eq!(objects[2].label(), "category 'Archive'");
    }
}
