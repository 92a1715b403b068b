//! Convention configuration.
//!
//! Conventions describe how the local taxonomy (type, priority, status) is
//! spelled as external labels, and how relations are written into the
//! plain-text issue body. Maps are ordered so reverse lookups are
//! deterministic: the first key in lexical order wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::issue::IssueType;

/// Full convention set for one installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConventionConfig {
    /// Label vocabulary.
    #[serde(default)]
    pub labels: LabelConventions,
    /// Relation patterns.
    #[serde(default)]
    pub dependencies: DependencyConventions,
    /// Parent pattern.
    #[serde(default)]
    pub epics: EpicConventions,
}

/// Label vocabulary for type, priority and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LabelConventions {
    /// External label → local type.
    #[serde(rename = "type", default = "default_type_labels")]
    pub types: BTreeMap<String, IssueType>,
    /// External label → local priority (0..=4).
    #[serde(default = "default_priority_labels")]
    pub priority: BTreeMap<String, u8>,
    /// Status stand-in labels.
    #[serde(default)]
    pub status: StatusLabels,
}

/// Labels standing in for local statuses that GitHub has no state for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatusLabels {
    /// Label for `in_progress`.
    #[serde(default = "default_in_progress_label")]
    pub in_progress: Option<String>,
    /// Label for `blocked`.
    #[serde(default = "default_blocked_label")]
    pub blocked: Option<String>,
}

/// Body patterns for depends-on and blocks relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DependencyConventions {
    /// Regex whose first capture group holds the depends-on references.
    #[serde(default = "default_dependency_pattern")]
    pub pattern: String,
    /// Separator between references in one match.
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Regex whose first capture group holds the blocks references.
    #[serde(default = "default_blocks_pattern")]
    pub blocks_pattern: String,
}

/// Body pattern for the parent (epic) relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EpicConventions {
    /// Regex whose first capture group holds the parent reference.
    #[serde(default = "default_parent_pattern")]
    pub body_pattern: String,
}

fn default_type_labels() -> BTreeMap<String, IssueType> {
    BTreeMap::from([
        ("bug".to_string(), IssueType::Bug),
        ("chore".to_string(), IssueType::Chore),
        ("enhancement".to_string(), IssueType::Feature),
        ("epic".to_string(), IssueType::Epic),
        ("task".to_string(), IssueType::Task),
    ])
}

fn default_priority_labels() -> BTreeMap<String, u8> {
    (0..=4).map(|p| (format!("P{p}"), p)).collect()
}

#[allow(clippy::unnecessary_wraps)]
fn default_in_progress_label() -> Option<String> {
    Some("in-progress".to_string())
}

#[allow(clippy::unnecessary_wraps)]
fn default_blocked_label() -> Option<String> {
    Some("blocked".to_string())
}

fn default_dependency_pattern() -> String {
    r"(?mi)^Depends on:[ \t]*(.+)$".to_string()
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_blocks_pattern() -> String {
    r"(?mi)^Blocks:[ \t]*(.+)$".to_string()
}

fn default_parent_pattern() -> String {
    r"(?mi)^Parent:[ \t]*(.+)$".to_string()
}

impl Default for LabelConventions {
    fn default() -> Self {
        Self {
            types: default_type_labels(),
            priority: default_priority_labels(),
            status: StatusLabels::default(),
        }
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            in_progress: default_in_progress_label(),
            blocked: default_blocked_label(),
        }
    }
}

impl Default for DependencyConventions {
    fn default() -> Self {
        Self {
            pattern: default_dependency_pattern(),
            separator: default_separator(),
            blocks_pattern: default_blocks_pattern(),
        }
    }
}

impl Default for EpicConventions {
    fn default() -> Self {
        Self {
            body_pattern: default_parent_pattern(),
        }
    }
}

impl ConventionConfig {
    /// Priority labels whose value falls outside 0..=4.
    pub fn invalid_priority_labels(&self) -> Vec<(&str, u8)> {
        self.labels
            .priority
            .iter()
            .filter(|(_, value)| **value > 4)
            .map(|(label, value)| (label.as_str(), *value))
            .collect()
    }
}
