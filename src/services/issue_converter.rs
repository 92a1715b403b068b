//! Conversion between local issues and external tracker payloads.
//!
//! Both directions are pure: they only consult the [`ConventionMapper`]
//! and, for references, a lookup table built by the caller.

use std::collections::HashMap;

use crate::domain::models::{ExternalIssue, ExternalPayload, ExternalState, IssueStatus, LocalIssue};

use super::convention_mapper::{ConventionMapper, FOOTER_RULE, METADATA_MARKER};

/// `<owner>/<repo>/issues/<number>`, stored as the local issue's external ref.
pub fn external_ref(owner: &str, repo: &str, number: u64) -> String {
    format!("{owner}/{repo}/issues/{number}")
}

/// Build the create/update payload for a local issue.
///
/// `issue_numbers` maps local ids to bound external numbers; mapped
/// relation references are rendered as `#<number>`, all others verbatim.
pub fn to_external(
    local: &LocalIssue,
    mapper: &ConventionMapper,
    issue_numbers: Option<&HashMap<String, u64>>,
) -> ExternalPayload {
    let mut labels: Vec<String> = Vec::new();
    let mut push_label = |label: &str| {
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
        }
    };

    if let Some(label) = mapper.label_for_type(local.issue_type) {
        push_label(label);
    }
    if let Some(label) = mapper.label_for_priority(local.priority) {
        push_label(label);
    }
    let status_label = match local.status {
        IssueStatus::InProgress => mapper.in_progress_label(),
        IssueStatus::Blocked => mapper.blocked_label(),
        IssueStatus::Open | IssueStatus::Closed => None,
    };
    if let Some(label) = status_label {
        push_label(label);
    }
    for label in &local.labels {
        push_label(label);
    }

    ExternalPayload {
        title: local.title.clone(),
        body: render_body(local, mapper, issue_numbers),
        labels,
        assignees: local.assignee.iter().cloned().collect(),
        state: if local.status.is_closed() {
            ExternalState::Closed
        } else {
            ExternalState::Open
        },
    }
}

fn render_body(local: &LocalIssue, mapper: &ConventionMapper, issue_numbers: Option<&HashMap<String, u64>>) -> String {
    if !local.has_relations() {
        return local.description.clone();
    }

    let separator = mapper.config().dependencies.separator.trim();
    let joiner = if separator.is_empty() {
        " ".to_string()
    } else {
        format!("{separator} ")
    };
    let render = |id: &String| match issue_numbers.and_then(|numbers| numbers.get(id)) {
        Some(number) => format!("#{number}"),
        None => id.clone(),
    };

    let mut lines = Vec::new();
    if !local.depends_on.is_empty() {
        let refs: Vec<String> = local.depends_on.iter().map(render).collect();
        lines.push(format!("Depends on: {}", refs.join(&joiner)));
    }
    if !local.blocks.is_empty() {
        let refs: Vec<String> = local.blocks.iter().map(render).collect();
        lines.push(format!("Blocks: {}", refs.join(&joiner)));
    }
    if let Some(parent) = &local.parent {
        lines.push(format!("Parent: {}", render(parent)));
    }

    format!(
        "{}\n\n{FOOTER_RULE}\n{METADATA_MARKER}\n{}",
        local.description,
        lines.join("\n")
    )
}

/// Build a local issue from an external one. The result has no id.
pub fn to_local(external: &ExternalIssue, mapper: &ConventionMapper, owner: &str, repo: &str) -> LocalIssue {
    let labels = external.label_names();
    let body = external.body.as_deref().unwrap_or_default();
    let relations = mapper.extract_relations(body);

    let status = if external.state == ExternalState::Closed {
        IssueStatus::Closed
    } else if mapper.in_progress_for_labels(&labels) {
        IssueStatus::InProgress
    } else if mapper.blocked_for_labels(&labels) {
        IssueStatus::Blocked
    } else {
        IssueStatus::Open
    };

    LocalIssue {
        id: None,
        title: external.title.clone(),
        description: mapper.strip_metadata(body),
        issue_type: mapper.type_for_labels(&labels),
        status,
        priority: mapper.priority_for_labels(&labels),
        assignee: external.assignee.as_ref().map(|user| user.login.clone()),
        labels: labels.into_iter().filter(|l| !mapper.is_convention_label(l)).collect(),
        depends_on: relations.depends_on,
        blocks: relations.blocks,
        parent: relations.parent,
        external_ref: Some(external_ref(owner, repo, external.number)),
        created_at: external.created_at,
        updated_at: external.updated_at,
        closed_at: if status.is_closed() { external.closed_at } else { None },
    }
}

/// Replace numeric references that name a bound external issue with the
/// corresponding local id. Unknown references are left as they are.
pub fn localize_references(issue: &mut LocalIssue, local_ids: &HashMap<u64, String>) {
    let localize = |reference: &mut String| {
        if let Some(local_id) = reference.parse::<u64>().ok().and_then(|n| local_ids.get(&n)) {
            reference.clone_from(local_id);
        }
    };
    issue.depends_on.iter_mut().for_each(localize);
    issue.blocks.iter_mut().for_each(localize);
    if let Some(parent) = issue.parent.as_mut() {
        localize(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ExternalLabel, ExternalUser, IssueType, Priority};
    use chrono::Utc;

    fn external(number: u64, labels: &[&str], body: Option<&str>, state: ExternalState) -> ExternalIssue {
        let now = Utc::now();
        ExternalIssue {
            number,
            title: "Login broken".into(),
            body: body.map(str::to_string),
            state,
            labels: labels.iter().map(|l| ExternalLabel { name: (*l).into() }).collect(),
            assignee: Some(ExternalUser { login: "octocat".into() }),
            created_at: now,
            updated_at: now,
            closed_at: (state == ExternalState::Closed).then_some(now),
            html_url: format!("https://github.com/o/r/issues/{number}"),
            pull_request: None,
        }
    }

    #[test]
    fn test_metadata_encoding_scenario() {
        let mapper = ConventionMapper::default();
        let issue = external(
            5,
            &["bug", "P1"],
            Some("Users cannot log in\n\n---\n<!-- sync metadata - do not edit below -->\nDepends on: abc1"),
            ExternalState::Open,
        );

        let local = to_local(&issue, &mapper, "o", "r");
        assert_eq!(local.issue_type, IssueType::Bug);
        assert_eq!(local.priority.value(), 1);
        assert_eq!(local.status, IssueStatus::Open);
        assert_eq!(local.depends_on, vec!["abc1"]);
        assert_eq!(local.description, "Users cannot log in");
        assert!(local.labels.is_empty());
        assert_eq!(local.external_ref.as_deref(), Some("o/r/issues/5"));
        assert_eq!(local.assignee.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_to_external_labels_state_and_footer() {
        let mapper = ConventionMapper::default();
        let local = LocalIssue::new("Ship it")
            .with_description("Details")
            .with_type(IssueType::Feature)
            .with_priority(Priority::new(0).unwrap())
            .with_status(IssueStatus::InProgress)
            .with_label("ui")
            .with_label("P0")
            .with_dependency("bd-a")
            .with_dependency("bd-b")
            .with_parent("bd-epic");
        let numbers = HashMap::from([("bd-a".to_string(), 12u64)]);

        let payload = to_external(&local, &mapper, Some(&numbers));
        assert_eq!(payload.labels, vec!["enhancement", "P0", "in-progress", "ui"]);
        assert_eq!(payload.state, ExternalState::Open);
        assert_eq!(
            payload.body,
            "Details\n\n---\n<!-- sync metadata - do not edit below -->\nDepends on: #12, bd-b\nParent: bd-epic"
        );
        assert!(payload.assignees.is_empty());
    }

    #[test]
    fn test_to_external_without_relations_keeps_description() {
        let mapper = ConventionMapper::default();
        let local = LocalIssue::new("Done")
            .with_description("All good")
            .with_status(IssueStatus::Closed)
            .with_assignee("alice");
        let payload = to_external(&local, &mapper, None);
        assert_eq!(payload.body, "All good");
        assert_eq!(payload.state, ExternalState::Closed);
        assert_eq!(payload.assignees, vec!["alice"]);
    }

    #[test]
    fn test_status_from_labels() {
        let mapper = ConventionMapper::default();
        let in_progress = to_local(&external(1, &["in-progress", "blocked"], None, ExternalState::Open), &mapper, "o", "r");
        assert_eq!(in_progress.status, IssueStatus::InProgress);

        let blocked = to_local(&external(2, &["blocked"], None, ExternalState::Open), &mapper, "o", "r");
        assert_eq!(blocked.status, IssueStatus::Blocked);

        let closed = to_local(&external(3, &["in-progress"], None, ExternalState::Closed), &mapper, "o", "r");
        assert_eq!(closed.status, IssueStatus::Closed);
        assert!(closed.closed_at.is_some());
        assert_eq!(closed.description, "");
    }

    #[test]
    fn test_round_trip_preserves_taxonomy_and_relations() {
        let mapper = ConventionMapper::default();
        let local = LocalIssue::new("Round trip")
            .with_description("Body text")
            .with_type(IssueType::Chore)
            .with_priority(Priority::new(4).unwrap())
            .with_status(IssueStatus::Blocked)
            .with_label("infra")
            .with_dependency("bd-1")
            .with_blocked("bd-2")
            .with_parent("bd-3");

        let payload = to_external(&local, &mapper, None);
        let mut issue = external(9, &[], Some(&payload.body), payload.state);
        issue.labels = payload.labels.iter().map(|l| ExternalLabel { name: l.clone() }).collect();
        let back = to_local(&issue, &mapper, "o", "r");

        assert_eq!(back.issue_type, local.issue_type);
        assert_eq!(back.priority, local.priority);
        assert_eq!(back.status, local.status);
        assert_eq!(back.labels, local.labels);
        assert_eq!(back.depends_on, local.depends_on);
        assert_eq!(back.blocks, local.blocks);
        assert_eq!(back.parent, local.parent);
        assert_eq!(back.description, local.description);
    }

    #[test]
    fn test_localize_references() {
        let mut issue = LocalIssue::new("x").with_dependency("12").with_dependency("bd-z").with_parent("7");
        let ids = HashMap::from([(12u64, "bd-a".to_string())]);
        localize_references(&mut issue, &ids);
        assert_eq!(issue.depends_on, vec!["bd-a", "bd-z"]);
        assert_eq!(issue.parent.as_deref(), Some("7"));
    }
}
