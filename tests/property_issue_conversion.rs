use beadsync::domain::models::{
    ExternalIssue, ExternalLabel, ExternalState, ExternalUser, IssueStatus, IssueType, LocalIssue, Priority,
};
use beadsync::services::{to_external, to_local, ConventionMapper};
use chrono::Utc;
use proptest::prelude::*;

fn issue_type() -> impl Strategy<Value = IssueType> {
    prop_oneof![
        Just(IssueType::Bug),
        Just(IssueType::Feature),
        Just(IssueType::Task),
        Just(IssueType::Epic),
        Just(IssueType::Chore),
    ]
}

fn status() -> impl Strategy<Value = IssueStatus> {
    prop::sample::select(IssueStatus::ALL.to_vec())
}

fn references() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("bd-[a-z0-9]{1,5}", 0..4).prop_map(|set| set.into_iter().collect())
}

prop_compose! {
    fn local_issue()(
        title in "[A-Za-z0-9 ]{1,40}",
        description in "[A-Za-z][A-Za-z0-9 .]{0,60}[A-Za-z0-9.]",
        issue_type in issue_type(),
        status in status(),
        priority in 0u8..=4,
        assignee in proptest::option::of("[a-z]{1,10}"),
        labels in prop::collection::btree_set("x-[a-z]{1,8}", 0..4),
        depends_on in references(),
        blocks in references(),
        parent in proptest::option::of("bd-[a-z0-9]{1,5}"),
    ) -> LocalIssue {
        let mut issue = LocalIssue::new(title)
            .with_description(description)
            .with_type(issue_type)
            .with_status(status)
            .with_priority(Priority::new(priority).unwrap_or_default());
        if let Some(assignee) = assignee {
            issue = issue.with_assignee(assignee);
        }
        issue.labels = labels.into_iter().collect();
        issue.depends_on = depends_on;
        issue.blocks = blocks;
        issue.parent = parent;
        issue
    }
}

/// What the tracker would hand back after accepting `local` as issue 42.
fn published(local: &LocalIssue, mapper: &ConventionMapper) -> ExternalIssue {
    let payload = to_external(local, mapper, None);
    let now = Utc::now();
    ExternalIssue {
        number: 42,
        title: payload.title,
        body: Some(payload.body),
        state: payload.state,
        labels: payload.labels.into_iter().map(|name| ExternalLabel { name }).collect(),
        assignee: payload.assignees.into_iter().next().map(|login| ExternalUser { login }),
        created_at: now,
        updated_at: now,
        closed_at: (payload.state == ExternalState::Closed).then_some(now),
        html_url: "https://github.com/o/r/issues/42".to_string(),
        pull_request: None,
    }
}

proptest! {
    /// Property: publishing then importing preserves every synced field
    ///
    /// With the default conventions, type, priority, status, free-form
    /// labels, relations and description all survive the trip through the
    /// label vocabulary and the body footer.
    #[test]
    fn prop_local_round_trip_preserves_synced_fields(local in local_issue()) {
        let mapper = ConventionMapper::default();
        let back = to_local(&published(&local, &mapper), &mapper, "o", "r");

        prop_assert_eq!(back.title, local.title);
        prop_assert_eq!(back.description, local.description);
        prop_assert_eq!(back.issue_type, local.issue_type);
        prop_assert_eq!(back.priority, local.priority);
        prop_assert_eq!(back.status, local.status);
        prop_assert_eq!(back.assignee, local.assignee);
        prop_assert_eq!(back.labels, local.labels);
        prop_assert_eq!(back.depends_on, local.depends_on);
        prop_assert_eq!(back.blocks, local.blocks);
        prop_assert_eq!(back.parent, local.parent);
        prop_assert_eq!(back.external_ref.as_deref(), Some("o/r/issues/42"));
    }

    /// Property: convention labels never leak into free-form labels
    #[test]
    fn prop_imported_labels_exclude_conventions(local in local_issue()) {
        let mapper = ConventionMapper::default();
        let back = to_local(&published(&local, &mapper), &mapper, "o", "r");

        for label in &back.labels {
            prop_assert!(!mapper.is_convention_label(label), "convention label {} kept", label);
        }
    }

    /// Property: a body without the footer is imported verbatim
    #[test]
    fn prop_plain_body_is_untouched(body in "[A-Za-z0-9 .,\n]{0,120}") {
        let mapper = ConventionMapper::default();
        let local = LocalIssue::new("Plain").with_description(body.clone());

        let back = to_local(&published(&local, &mapper), &mapper, "o", "r");
        prop_assert_eq!(back.description, body);
        prop_assert!(back.depends_on.is_empty());
    }
}
