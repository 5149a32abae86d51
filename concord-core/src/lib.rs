//! Core domain model for Concord.
//!
//! Holds the desired-state template model (categories and channels as
//! declared by operators) and the live-state mirror types read from the
//! remote space. Everything in this crate is pure data plus parsing —
//! no network, no side effects.

pub mod error;
pub mod template;
pub mod types;

pub use error::TemplateError;
pub use types::{
    ActorId, CategoryName, CategorySpec, ChannelKind, ChannelName, ChannelSpec, LiveCategory,
    LiveChannel, LoadedTemplate, RemoteId, TemplateDocument, TemplateIssue, TemplateMeta,
};
