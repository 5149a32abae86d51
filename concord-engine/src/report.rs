//! Rendering of run results as a human-readable change log.
//!
//! Pure transforms: the same result always renders to the same lines, with
//! no hidden ordering dependency on map iteration. Failure reasons are
//! included as a bounded excerpt so one giant remote error cannot flood a
//! reply.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::confirm::ApplyReport;
use crate::reconcile::{CategoryOutcome, ReconciliationResult};

/// Longest failure reason rendered before truncation.
const REASON_EXCERPT: usize = 120;

/// Most failure lines rendered per category before eliding the rest.
const MAX_FAILURE_LINES: usize = 10;

// ---------------------------------------------------------------------------
// Change lines
// ---------------------------------------------------------------------------

/// Tag of one change-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeTag {
    Create,
    Update,
    Skip,
    Fail,
    /// Drift: present live, absent from the template.
    Extra,
    Delete,
}

impl ChangeTag {
    pub fn marker(self) -> &'static str {
        match self {
            ChangeTag::Create => "+",
            ChangeTag::Update => "~",
            ChangeTag::Skip => "·",
            ChangeTag::Fail => "✗",
            ChangeTag::Extra => "?",
            ChangeTag::Delete => "-",
        }
    }
}

/// One line of the change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLine {
    pub tag: ChangeTag,
    pub entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChangeLine {
    fn new(tag: ChangeTag, entity: impl Into<String>) -> Self {
        Self {
            tag,
            entity: entity.into(),
            detail: None,
        }
    }

    fn with_detail(tag: ChangeTag, entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            tag,
            entity: entity.into(),
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for ChangeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} {} ({detail})", self.tag.marker(), self.entity),
            None => write!(f, "{} {}", self.tag.marker(), self.entity),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render a run result as an ordered list of change lines.
pub fn render(result: &ReconciliationResult) -> Vec<ChangeLine> {
    let mut lines = Vec::new();

    for failure in &result.skipped_categories {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Fail,
            format!("category {}", failure.name),
            excerpt(&failure.reason),
        ));
    }

    for outcome in &result.categories {
        render_category(outcome, &mut lines);
    }

    for category in &result.extra_categories {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Extra,
            format!("category {}", category.name),
            "not in template",
        ));
    }
    for channel in &result.extra_uncategorized {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Extra,
            format!("channel {}", channel.name),
            "uncategorized, not in template",
        ));
    }

    lines
}

fn render_category(outcome: &CategoryOutcome, lines: &mut Vec<ChangeLine>) {
    if outcome.created {
        lines.push(ChangeLine::new(
            ChangeTag::Create,
            format!("category {}", outcome.name),
        ));
    } else if outcome.moved {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Update,
            format!("category {}", outcome.name),
            "repositioned",
        ));
    }

    for channel in &outcome.created_channels {
        lines.push(ChangeLine::new(
            ChangeTag::Create,
            format!("channel {}/{}", outcome.name, channel),
        ));
    }
    for channel in &outcome.updated_channels {
        lines.push(ChangeLine::new(
            ChangeTag::Update,
            format!("channel {}/{}", outcome.name, channel),
        ));
    }
    for channel in &outcome.skipped_channels {
        lines.push(ChangeLine::new(
            ChangeTag::Skip,
            format!("channel {}/{}", outcome.name, channel),
        ));
    }
    for failure in outcome.failed_units.iter().take(MAX_FAILURE_LINES) {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Fail,
            format!("{}/{}", outcome.name, failure.name),
            excerpt(&failure.reason),
        ));
    }
    if outcome.failed_units.len() > MAX_FAILURE_LINES {
        lines.push(ChangeLine::new(
            ChangeTag::Fail,
            format!(
                "{} (+{} more failures)",
                outcome.name,
                outcome.failed_units.len() - MAX_FAILURE_LINES
            ),
        ));
    }
    for channel in &outcome.extra_channels {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Extra,
            format!("channel {}/{}", outcome.name, channel.name),
            "not in template",
        ));
    }
}

/// Render a deletion batch report: one line per object.
pub fn render_deletions(report: &ApplyReport) -> Vec<ChangeLine> {
    let mut lines = Vec::new();
    for name in &report.deleted {
        lines.push(ChangeLine::new(ChangeTag::Delete, name.clone()));
    }
    for failure in &report.failed {
        lines.push(ChangeLine::with_detail(
            ChangeTag::Fail,
            failure.name.clone(),
            excerpt(&failure.reason),
        ));
    }
    lines
}

/// Per-category summary lines plus totals, in declared order.
pub fn summarize(result: &ReconciliationResult) -> Vec<String> {
    let mut lines: Vec<String> = result
        .categories
        .iter()
        .map(|c| {
            format!(
                "{}: {} created, {} updated, {} skipped, {} failed, {} extra",
                c.name,
                c.created_channels.len(),
                c.updated_channels.len(),
                c.skipped_channels.len(),
                c.failed_units.len(),
                c.extra_channels.len(),
            )
        })
        .collect();

    if !result.extra_categories.is_empty() {
        lines.push(format!(
            "{} extra categor{} not in template",
            result.extra_categories.len(),
            if result.extra_categories.len() == 1 { "y" } else { "ies" },
        ));
    }
    if !result.extra_uncategorized.is_empty() {
        lines.push(format!(
            "{} uncategorized channel(s) not in template",
            result.extra_uncategorized.len()
        ));
    }
    lines
}

/// The full human-readable change log: change lines then summaries.
pub fn format_report(result: &ReconciliationResult) -> String {
    let mut out = String::new();
    if let Some(name) = &result.template_name {
        out.push_str(&format!("template: {name}\n"));
    }
    for line in render(result) {
        out.push_str(&format!("{line}\n"));
    }
    for line in summarize(result) {
        out.push_str(&format!("{line}\n"));
    }
    out
}

fn excerpt(reason: &str) -> String {
    if reason.len() <= REASON_EXCERPT {
        return reason.to_string();
    }
    let cut = reason
        .char_indices()
        .take_while(|(i, _)| *i < REASON_EXCERPT)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}…", &reason[..cut])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use concord_core::types::{CategoryName, ChannelKind, ChannelName, LiveChannel, RemoteId};

    use crate::reconcile::UnitFailure;

    use super::*;

    fn sample_result() -> ReconciliationResult {
        ReconciliationResult {
            template_name: Some("community".to_string()),
            categories: vec![CategoryOutcome {
                name: CategoryName::from("General"),
                created: true,
                moved: false,
                created_channels: vec![ChannelName::from("welcome")],
                updated_channels: vec![ChannelName::from("rules")],
                skipped_channels: vec![ChannelName::from("lounge")],
                failed_units: vec![UnitFailure::new("gallery", "unknown channel kind 'forum'")],
                extra_channels: vec![LiveChannel {
                    id: RemoteId::from("9"),
                    name: ChannelName::from("old-bot-spam"),
                    kind: ChannelKind::Text,
                    topic: None,
                    nsfw: false,
                    position: 4,
                    parent: Some(RemoteId::from("1")),
                }],
            }],
            skipped_categories: vec![],
            extra_categories: vec![],
            extra_uncategorized: vec![],
        }
    }

    #[test]
    fn lines_are_tagged_and_ordered() {
        let lines = render(&sample_result());
        let tags: Vec<ChangeTag> = lines.iter().map(|l| l.tag).collect();
        assert_eq!(
            tags,
            vec![
                ChangeTag::Create, // category
                ChangeTag::Create, // welcome
                ChangeTag::Update, // rules
                ChangeTag::Skip,   // lounge
                ChangeTag::Fail,   // gallery
                ChangeTag::Extra,  // old-bot-spam
            ]
        );
        assert_eq!(lines[1].entity, "channel General/welcome");
    }

    #[test]
    fn rendering_is_deterministic() {
        let result = sample_result();
        assert_eq!(render(&result), render(&result));
        assert_eq!(format_report(&result), format_report(&result));
    }

    #[test]
    fn summary_aggregates_counts_per_category() {
        let summary = summarize(&sample_result());
        assert_eq!(
            summary,
            vec!["General: 1 created, 1 updated, 1 skipped, 1 failed, 1 extra".to_string()]
        );
    }

    #[test]
    fn long_reasons_are_truncated() {
        let mut result = sample_result();
        result.categories[0].failed_units[0].reason = "x".repeat(500);
        let lines = render(&result);
        let failure = lines.iter().find(|l| l.tag == ChangeTag::Fail).expect("fail line");
        let detail = failure.detail.as_ref().expect("detail");
        assert!(detail.len() < 200);
        assert!(detail.ends_with('…'));
    }

    #[test]
    fn deletion_report_lines() {
        let report = ApplyReport {
            deleted: vec!["old-bot-spam".to_string()],
            failed: vec![UnitFailure::new("stubborn", "remote operation failed: 500")],
        };
        let lines = render_deletions(&report);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].tag, ChangeTag::Delete);
        assert_eq!(lines[1].tag, ChangeTag::Fail);
        assert_eq!(lines[1].entity, "stubborn");
    }
}
