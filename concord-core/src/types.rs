//! Domain types for the Concord template model and live-state mirror.
//!
//! Names are the sole identity key when matching desired state to live
//! state (case-sensitive, no normalization). `order` fields are zero-based
//! ranks relative to siblings in the same scope, never absolute positions.
//! All types are serializable via serde + serde_yaml.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed category name, unique within one template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryName(pub String);

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CategoryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CategoryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed channel name, unique within its category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelName(pub String);

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ChannelName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChannelName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque identifier assigned by the remote system to a live object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteId(pub String);

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RemoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identity of the user invoking a command.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Channel kind
// ---------------------------------------------------------------------------

/// The kind of a channel. Attribute applicability is a pure function of
/// this tag: only text channels carry a topic. Kinds never change in place
/// on the remote system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
}

impl ChannelKind {
    /// Whether channels of this kind carry a topic.
    pub fn supports_topic(self) -> bool {
        matches!(self, ChannelKind::Text)
    }

    /// Parse a kind label as it appears in template documents.
    ///
    /// Matching is case-insensitive to accept `Text`/`TEXT` spellings from
    /// hand-written templates; anything outside the permitted set is `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "text" => Some(ChannelKind::Text),
            "voice" => Some(ChannelKind::Voice),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Text => write!(f, "text"),
            ChannelKind::Voice => write!(f, "voice"),
        }
    }
}

// ---------------------------------------------------------------------------
// Desired state (template model)
// ---------------------------------------------------------------------------

/// A channel as declared in a template. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: ChannelName,
    pub kind: ChannelKind,
    /// Topic text; meaningful only when `kind` is text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    /// Zero-based rank within the owning category, assigned from declared
    /// list order.
    pub order: usize,
}

/// A category as declared in a template. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: CategoryName,
    /// Zero-based rank among categories, assigned from declared order.
    pub order: usize,
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

impl CategorySpec {
    /// Look up a declared channel by exact name.
    pub fn channel(&self, name: &ChannelName) -> Option<&ChannelSpec> {
        self.channels.iter().find(|c| &c.name == name)
    }
}

/// Template metadata. Used only for reporting, never for reconciliation
/// decisions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The normalized desired-state description: an ordered list of categories,
/// each owning an ordered list of channels. Both template source forms
/// (consolidated document, directory tree) parse to this.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateDocument {
    #[serde(default)]
    pub meta: TemplateMeta,
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
}

impl TemplateDocument {
    /// Look up a declared category by exact name.
    pub fn category(&self, name: &CategoryName) -> Option<&CategorySpec> {
        self.categories.iter().find(|c| &c.name == name)
    }
}

/// A unit-scoped defect encountered while loading a template.
///
/// Issues do not abort the load; the reconciler records them as skipped
/// units so the run report accounts for every declared name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIssue {
    /// The declared unit the issue belongs to (channel or category name).
    pub unit: String,
    /// The category scope, when the unit is a channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryName>,
    pub reason: String,
}

/// A parsed template plus the unit-scoped issues encountered on the way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedTemplate {
    pub document: TemplateDocument,
    pub issues: Vec<TemplateIssue>,
}

// ---------------------------------------------------------------------------
// Live state mirror
// ---------------------------------------------------------------------------

/// A category as it exists on the remote system. Read fresh at the start
/// of each reconciliation run; never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveCategory {
    pub id: RemoteId,
    pub name: CategoryName,
    /// Absolute position assigned by the remote system. Only the rank it
    /// induces among siblings is meaningful.
    pub position: i64,
}

/// A channel as it exists on the remote system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveChannel {
    pub id: RemoteId,
    pub name: ChannelName,
    pub kind: ChannelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    pub position: i64,
    /// Owning category, if any. `None` marks an uncategorized channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<RemoteId>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(CategoryName::from("General").to_string(), "General");
        assert_eq!(ChannelName::from("welcome").to_string(), "welcome");
        assert_eq!(RemoteId::from("42").to_string(), "42");
    }

    #[test]
    fn names_match_case_sensitively() {
        assert_ne!(ChannelName::from("Welcome"), ChannelName::from("welcome"));
    }

    #[test]
    fn kind_parse_permitted_set() {
        assert_eq!(ChannelKind::parse("text"), Some(ChannelKind::Text));
        assert_eq!(ChannelKind::parse("Voice"), Some(ChannelKind::Voice));
        assert_eq!(ChannelKind::parse("forum"), None);
    }

    #[test]
    fn only_text_supports_topic() {
        assert!(ChannelKind::Text.supports_topic());
        assert!(!ChannelKind::Voice.supports_topic());
    }

    #[test]
    fn document_serde_roundtrip() {
        let doc = TemplateDocument {
            meta: TemplateMeta {
                name: Some("community".into()),
                version: Some("1".into()),
            },
            categories: vec![CategorySpec {
                name: CategoryName::from("General"),
                order: 0,
                channels: vec![ChannelSpec {
                    name: ChannelName::from("welcome"),
                    kind: ChannelKind::Text,
                    topic: Some("say hi".into()),
                    nsfw: false,
                    order: 0,
                }],
            }],
        };
        let yaml = serde_yaml::to_string(&doc).expect("serialize");
        let back: TemplateDocument = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(doc, back);
    }
}
