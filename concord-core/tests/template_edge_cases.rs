//! Edge-case parsing tests for the template model.
//!
//! Each `#[case]` is isolated — no shared state.

use concord_core::template::{self, CATEGORY_FILE};
use concord_core::types::ChannelKind;
use concord_core::TemplateError;
use rstest::rstest;

// ---------------------------------------------------------------------------
// Unit-scoped defects degrade to issues, never abort the load
// ---------------------------------------------------------------------------

#[rstest]
#[case::unknown_kind("- name: gallery\n        kind: forum", "unknown channel kind")]
#[case::missing_kind("- name: gallery", "missing required field: kind")]
#[case::missing_name("- kind: text", "missing required field: name")]
#[case::blank_name("- name: \"\"\n        kind: text", "missing required field: name")]
fn defective_channel_unit_becomes_issue(#[case] unit: &str, #[case] expected_reason: &str) {
    let source = format!(
        r#"
categories:
  - name: General
    channels:
      - name: welcome
        kind: text
      {unit}
"#
    );
    let loaded = template::parse_str(&source).expect("load survives a bad unit");

    let channels = &loaded.document.categories[0].channels;
    assert_eq!(channels.len(), 1, "only the healthy channel survives");
    assert_eq!(channels[0].name.0, "welcome");

    assert_eq!(loaded.issues.len(), 1);
    assert!(
        loaded.issues[0].reason.contains(expected_reason),
        "reason '{}' should mention '{expected_reason}'",
        loaded.issues[0].reason
    );
}

#[rstest]
#[case::text("text", ChannelKind::Text)]
#[case::voice("voice", ChannelKind::Voice)]
#[case::uppercase("TEXT", ChannelKind::Text)]
#[case::mixed_case("Voice", ChannelKind::Voice)]
fn kind_labels_parse_case_insensitively(#[case] label: &str, #[case] expected: ChannelKind) {
    let source = format!(
        r#"
categories:
  - name: General
    channels:
      - name: one
        kind: {label}
"#
    );
    let loaded = template::parse_str(&source).expect("parse");
    assert_eq!(loaded.document.categories[0].channels[0].kind, expected);
}

// ---------------------------------------------------------------------------
// Whole-load failures
// ---------------------------------------------------------------------------

#[rstest]
#[case::not_yaml("categories: [unterminated")]
#[case::wrong_shape("categories: 7")]
fn malformed_document_is_a_parse_error(#[case] source: &str) {
    assert!(matches!(
        template::parse_str(source).unwrap_err(),
        TemplateError::Parse { .. }
    ));
}

#[test]
fn duplicate_names_name_the_scope() {
    let err = template::parse_str(
        r#"
categories:
  - name: General
    channels:
      - name: twin
        kind: text
      - name: twin
        kind: text
"#,
    )
    .unwrap_err();
    match err {
        TemplateError::Duplicate { scope, name } => {
            assert_eq!(name, "twin");
            assert!(scope.contains("General"));
        }
        other => panic!("expected Duplicate, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Directory form quirks
// ---------------------------------------------------------------------------

#[test]
fn category_order_follows_directory_paths() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    for (dir, name) in [("10-zeta", "Zeta"), ("05-alpha", "Alpha")] {
        let path = tmp.path().join(dir);
        std::fs::create_dir_all(&path).expect("mkdir");
        std::fs::write(
            path.join(CATEGORY_FILE),
            format!("name: {name}\nchannels: []\n"),
        )
        .expect("write");
    }

    let loaded = template::load_dir(tmp.path()).expect("load");
    let names: Vec<&str> = loaded
        .document
        .categories
        .iter()
        .map(|c| c.name.0.as_str())
        .collect();
    assert_eq!(names, vec!["Alpha", "Zeta"]);
    assert_eq!(loaded.document.categories[0].order, 0);
    assert_eq!(loaded.document.categories[1].order, 1);
}

#[test]
fn channel_file_name_field_wins_over_stem() {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let dir = tmp.path().join("general");
    std::fs::create_dir_all(&dir).expect("mkdir");
    std::fs::write(dir.join(CATEGORY_FILE), "name: General\nchannels:\n  - welcome\n")
        .expect("write");
    // The file is looked up by stem, but the declared name is authoritative.
    std::fs::write(dir.join("welcome.yaml"), "name: welcome-lounge\nkind: text\n")
        .expect("write");

    let loaded = template::load_dir(tmp.path()).expect("load");
    assert_eq!(
        loaded.document.categories[0].channels[0].name.0,
        "welcome-lounge"
    );
}
