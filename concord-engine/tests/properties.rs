//! End-to-end properties of the reconciliation engine, exercised against
//! the in-memory space adapter.

use concord_core::template;
use concord_core::types::{ActorId, CategoryName, ChannelKind, ChannelName, LoadedTemplate};
use concord_engine::memory::{InMemorySpace, Operation};
use concord_engine::{
    find_drift, ChannelEdit, DeletionWorkflow, LiveSnapshot, ReconcilePolicy,
    ReconciliationResult, Reconciler, WorkflowState,
};

const COMMUNITY: &str = r#"
name: community
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
        topic: say hi
      - name: voice-chat
        kind: voice
  - name: Development
    channels:
      - name: rust
        kind: text
        topic: all things rust
      - name: reviews
        kind: text
"#;

fn community() -> LoadedTemplate {
    template::parse_str(COMMUNITY).expect("template parses")
}

async fn run(template: &LoadedTemplate, space: &InMemorySpace) -> ReconciliationResult {
    Reconciler::new(ReconcilePolicy::default())
        .run(template, space)
        .await
        .expect("reconcile run")
}

// ---------------------------------------------------------------------------
// Completeness on an empty space
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_space_gets_exactly_the_declared_structure() {
    let space = InMemorySpace::new();
    let template = community();

    let result = run(&template, &space).await;

    assert_eq!(result.created_count(), 6, "2 categories + 4 channels");
    assert_eq!(result.updated_count(), 0);
    assert_eq!(result.failed_count(), 0);
    assert!(!result.has_drift());

    let categories = space.categories();
    let names: Vec<&str> = categories.iter().map(|c| c.name.0.as_str()).collect();
    assert_eq!(names, vec!["General", "Development"]);

    let general = space.find_category("General").expect("General exists");
    let channels: Vec<String> = space
        .channels_of(&general.id)
        .iter()
        .map(|ch| ch.name.0.clone())
        .collect();
    assert_eq!(channels, vec!["welcome", "voice-chat"]);

    let welcome = space.find_channel("welcome").expect("welcome exists");
    assert_eq!(welcome.kind, ChannelKind::Text);
    assert_eq!(welcome.topic.as_deref(), Some("say hi"));
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_against_converged_state_is_a_noop() {
    let space = InMemorySpace::new();
    let template = community();

    run(&template, &space).await;
    let mutations_after_first = space.mutation_count();

    let second = run(&template, &space).await;

    assert_eq!(second.created_count(), 0);
    assert_eq!(second.updated_count(), 0);
    assert_eq!(second.failed_count(), 0);
    assert!(!second.has_drift());
    assert_eq!(
        space.mutation_count(),
        mutations_after_first,
        "a converged space must not be mutated again"
    );
}

// ---------------------------------------------------------------------------
// Position stability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn matching_ranks_with_gapped_positions_issue_no_moves() {
    let space = InMemorySpace::new();
    // Absolute positions are gapped and arbitrary; the ranks already match
    // the template order.
    let general = space.seed_category("General", 5);
    let dev = space.seed_category("Development", 42);
    space.seed_channel(Some(&general), "welcome", ChannelKind::Text, Some("say hi"), false, 11);
    space.seed_channel(Some(&general), "voice-chat", ChannelKind::Voice, None, false, 30);
    space.seed_channel(Some(&dev), "rust", ChannelKind::Text, Some("all things rust"), false, 7);
    space.seed_channel(Some(&dev), "reviews", ChannelKind::Text, None, false, 19);

    let result = run(&community(), &space).await;

    assert_eq!(result.created_count(), 0);
    assert_eq!(result.updated_count(), 0);
    assert_eq!(space.mutation_count(), 0, "no position edit may be issued");
}

#[tokio::test]
async fn rank_mismatch_moves_with_a_single_edit() {
    let space = InMemorySpace::new();
    // Declared order is General, Development — live ranks are swapped.
    let general = space.seed_category("General", 9);
    let dev = space.seed_category("Development", 3);
    space.seed_channel(Some(&general), "welcome", ChannelKind::Text, Some("say hi"), false, 0);
    space.seed_channel(Some(&general), "voice-chat", ChannelKind::Voice, None, false, 1);
    space.seed_channel(Some(&dev), "rust", ChannelKind::Text, Some("all things rust"), false, 0);
    space.seed_channel(Some(&dev), "reviews", ChannelKind::Text, None, false, 1);

    let result = run(&community(), &space).await;

    let moved: Vec<&str> = result
        .categories
        .iter()
        .filter(|c| c.moved)
        .map(|c| c.name.0.as_str())
        .collect();
    assert_eq!(moved, vec!["General"], "one move fixes both ranks");

    let names: Vec<String> = space.categories().iter().map(|c| c.name.0.clone()).collect();
    assert_eq!(names, vec!["General", "Development"]);

    let edits = space
        .operations()
        .into_iter()
        .filter(|op| matches!(op, Operation::EditCategory { .. }))
        .count();
    assert_eq!(edits, 1);
}

#[tokio::test]
async fn channel_rank_correction_travels_with_attribute_edit() {
    let space = InMemorySpace::new();
    let general = space.seed_category("General", 0);
    // welcome sits at rank 1 with a stale topic; one combined edit must fix
    // both.
    space.seed_channel(Some(&general), "voice-chat", ChannelKind::Voice, None, false, 0);
    space.seed_channel(Some(&general), "welcome", ChannelKind::Text, Some("old topic"), false, 1);

    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
        topic: say hi
      - name: voice-chat
        kind: voice
"#,
    )
    .expect("parse");

    let result = run(&template, &space).await;

    assert_eq!(result.updated_count(), 1);
    let edits: Vec<ChannelEdit> = space
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            Operation::EditChannel { edit, .. } => Some(edit),
            _ => None,
        })
        .collect();
    assert_eq!(edits.len(), 1, "all changed attributes travel together");
    assert_eq!(edits[0].topic.as_deref(), Some("say hi"));
    assert_eq!(edits[0].position, Some(0));

    let names: Vec<String> = space
        .channels_of(&general)
        .iter()
        .map(|ch| ch.name.0.clone())
        .collect();
    assert_eq!(names, vec!["welcome", "voice-chat"]);
}

// ---------------------------------------------------------------------------
// Partial-failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failing_create_leaves_the_rest_standing() {
    let space = InMemorySpace::new();
    space.fail_create("rust");

    let result = run(&community(), &space).await;

    let created: usize = result
        .categories
        .iter()
        .map(|c| c.created_channels.len())
        .sum();
    assert_eq!(created, 3, "N-1 channels created");
    assert_eq!(result.failed_count(), 1);

    let dev = result
        .categories
        .iter()
        .find(|c| c.name == CategoryName::from("Development"))
        .expect("Development outcome");
    assert_eq!(dev.failed_units.len(), 1);
    assert_eq!(dev.failed_units[0].name, "rust");
    assert!(!dev.failed_units[0].reason.is_empty());

    // The sibling channel in the same category was still processed.
    assert!(dev.created_channels.contains(&ChannelName::from("reviews")));
    assert!(space.find_channel("reviews").is_some());
}

#[tokio::test]
async fn failed_category_create_skips_its_channels_but_not_the_run() {
    let space = InMemorySpace::new();
    space.fail_create("General");

    let result = run(&community(), &space).await;

    let general = &result.categories[0];
    assert!(!general.created);
    assert_eq!(general.failed_units.len(), 1);
    assert!(general.created_channels.is_empty());

    // The next category proceeded unaffected.
    let dev = &result.categories[1];
    assert!(dev.created);
    assert_eq!(dev.created_channels.len(), 2);
}

#[tokio::test]
async fn missing_capability_aborts_before_any_mutation() {
    let space = InMemorySpace::new();
    space.revoke_capability();

    let err = Reconciler::new(ReconcilePolicy::default())
        .run(&community(), &space)
        .await
        .unwrap_err();
    assert!(matches!(err, concord_engine::EngineError::Permission(_)));
    assert_eq!(space.mutation_count(), 0);
}

// ---------------------------------------------------------------------------
// Drift
// ---------------------------------------------------------------------------

#[tokio::test]
async fn undeclared_channel_is_reported_not_deleted() {
    let space = InMemorySpace::new();
    let general = space.seed_category("General", 0);
    space.seed_channel(Some(&general), "old-bot-spam", ChannelKind::Text, None, false, 0);

    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
"#,
    )
    .expect("parse");

    let result = run(&template, &space).await;

    let outcome = &result.categories[0];
    assert_eq!(outcome.created_channels, vec![ChannelName::from("welcome")]);
    assert_eq!(outcome.extra_channels.len(), 1);
    assert_eq!(outcome.extra_channels[0].name, ChannelName::from("old-bot-spam"));

    // Nothing was deleted automatically.
    assert!(space.find_channel("old-bot-spam").is_some());
    assert!(result.extra_categories.is_empty());
}

#[tokio::test]
async fn reconciler_and_pure_drift_agree() {
    let space = InMemorySpace::new();
    let general = space.seed_category("General", 0);
    space.seed_channel(Some(&general), "welcome", ChannelKind::Text, None, false, 0);
    space.seed_channel(Some(&general), "stray", ChannelKind::Text, None, false, 1);
    space.seed_category("Attic", 1);
    space.seed_channel(None, "lobby", ChannelKind::Text, None, false, 0);

    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
"#,
    )
    .expect("parse");

    let snapshot = LiveSnapshot::read(&space).await.expect("snapshot");
    let policy = ReconcilePolicy::default();
    let drift = find_drift(&template.document, &snapshot, &policy);

    let result = Reconciler::new(policy).run(&template, &space).await.expect("run");

    assert_eq!(drift.extra_categories.len(), 1);
    assert_eq!(result.extra_categories, drift.extra_categories);
    assert_eq!(result.extra_uncategorized, drift.extra_uncategorized);
    assert_eq!(
        result.categories[0].extra_channels,
        drift.extra_channels[0].1
    );
}

#[tokio::test]
async fn allow_list_exempts_uncategorized_drift() {
    let space = InMemorySpace::new();
    space.seed_category("General", 0);
    space.seed_channel(None, "lobby", ChannelKind::Text, None, false, 0);

    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels: []
"#,
    )
    .expect("parse");

    let policy = ReconcilePolicy {
        allowed_uncategorized: vec![ChannelName::from("lobby")],
    };
    let result = Reconciler::new(policy)
        .run(&template, &space)
        .await
        .expect("run");
    assert!(result.extra_uncategorized.is_empty());
}

// ---------------------------------------------------------------------------
// Kind handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn matched_name_with_different_kind_is_a_failed_unit() {
    let space = InMemorySpace::new();
    let general = space.seed_category("General", 0);
    space.seed_channel(Some(&general), "lounge", ChannelKind::Voice, None, false, 0);

    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: lounge
        kind: text
        topic: chat here
"#,
    )
    .expect("parse");

    let result = run(&template, &space).await;

    let outcome = &result.categories[0];
    assert!(outcome.created_channels.is_empty());
    assert!(outcome.updated_channels.is_empty());
    assert_eq!(outcome.failed_units.len(), 1);
    assert!(outcome.failed_units[0].reason.contains("kind"));
    // The live voice channel is untouched and not drift.
    assert!(outcome.extra_channels.is_empty());
    assert_eq!(space.mutation_count(), 0);
}

#[tokio::test]
async fn template_issues_surface_as_failed_units() {
    let space = InMemorySpace::new();
    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
      - name: gallery
        kind: forum
"#,
    )
    .expect("parse");

    let result = run(&template, &space).await;

    let outcome = &result.categories[0];
    assert_eq!(outcome.created_channels, vec![ChannelName::from("welcome")]);
    assert_eq!(outcome.failed_units.len(), 1);
    assert_eq!(outcome.failed_units[0].name, "gallery");
    assert!(outcome.failed_units[0].reason.contains("unknown channel kind"));
}

// ---------------------------------------------------------------------------
// Scenario: bootstrap, then confirm-delete drift
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bootstrap_scenario_general_with_two_channels() {
    let space = InMemorySpace::new();
    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
      - name: voice-chat
        kind: voice
"#,
    )
    .expect("parse");

    let result = run(&template, &space).await;

    assert_eq!(result.created_count(), 3);
    assert_eq!(result.failed_count(), 0);
    assert!(!result.has_drift());

    let general = space.find_category("General").expect("created");
    assert_eq!(general.position, 0);
    let channels = space.channels_of(&general.id);
    assert_eq!(channels[0].name.0, "welcome");
    assert_eq!(channels[1].name.0, "voice-chat");
    assert_eq!(channels[1].kind, ChannelKind::Voice);
}

#[tokio::test]
async fn confirmed_deletion_with_one_remote_failure() {
    let space = InMemorySpace::new();
    space.grant_manage("alice");
    let general = space.seed_category("General", 0);
    space.seed_channel(Some(&general), "welcome", ChannelKind::Text, None, false, 0);
    space.seed_channel(Some(&general), "stray-a", ChannelKind::Text, None, false, 1);
    space.seed_channel(Some(&general), "stray-b", ChannelKind::Text, None, false, 2);
    space.fail_delete("stray-b");

    let template = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
"#,
    )
    .expect("parse");

    let snapshot = LiveSnapshot::read(&space).await.expect("snapshot");
    let drift = find_drift(&template.document, &snapshot, &ReconcilePolicy::default());
    let mut workflow = DeletionWorkflow::offer(drift.objects(), ActorId::from("alice"));

    workflow.begin_confirmation(&space).await.expect("authorized");
    let report = workflow.confirm(&space).await.expect("applied");

    assert_eq!(report.deleted, vec!["stray-a".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].name, "stray-b");
    assert!(matches!(workflow.state(), WorkflowState::Applied(_)));

    assert!(space.find_channel("stray-a").is_none());
    assert!(space.find_channel("stray-b").is_some());
    assert!(space.find_channel("welcome").is_some());
}

// ---------------------------------------------------------------------------
// Dry-run rehearsal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rehearsal_on_a_snapshot_copy_leaves_the_source_untouched() {
    let space = InMemorySpace::new();
    space.seed_category("Attic", 0);

    let snapshot = LiveSnapshot::read(&space).await.expect("snapshot");
    let rehearsal = InMemorySpace::from_snapshot(&snapshot);

    let result = run(&community(), &rehearsal).await;
    assert_eq!(result.created_count(), 6);
    assert_eq!(result.extra_categories.len(), 1);

    // The original space saw none of it.
    assert_eq!(space.mutation_count(), 0);
    assert_eq!(space.categories().len(), 1);
}
