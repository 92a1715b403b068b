//! Convention mapper.
//!
//! Translates between the local taxonomy (type, priority, status) and the
//! external label vocabulary, and reads or strips the relation metadata
//! that is written into the plain-text issue body.

use regex::Regex;
use tracing::warn;

use crate::domain::models::{ConventionConfig, IssueType, Priority};

/// Marker line separating the human description from the sync footer.
pub const METADATA_MARKER: &str = "<!-- sync metadata - do not edit below -->";

/// Horizontal rule placed above [`METADATA_MARKER`].
pub const FOOTER_RULE: &str = "---";

/// Relations decoded from an issue body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relations {
    /// Issues this one depends on.
    pub depends_on: Vec<String>,
    /// Issues this one blocks.
    pub blocks: Vec<String>,
    /// Parent epic, if any.
    pub parent: Option<String>,
}

impl Relations {
    /// True when no relation was found.
    pub fn is_empty(&self) -> bool {
        self.depends_on.is_empty() && self.blocks.is_empty() && self.parent.is_none()
    }
}

/// Compiled view of a [`ConventionConfig`].
#[derive(Debug, Clone)]
pub struct ConventionMapper {
    config: ConventionConfig,
    depends_on: Option<Regex>,
    blocks: Option<Regex>,
    parent: Option<Regex>,
}

impl Default for ConventionMapper {
    fn default() -> Self {
        Self::new(ConventionConfig::default())
    }
}

impl ConventionMapper {
    /// Compile the body patterns. An empty or invalid pattern is logged
    /// and then simply never matches.
    pub fn new(config: ConventionConfig) -> Self {
        let depends_on = compile("dependencies.pattern", &config.dependencies.pattern);
        let blocks = compile("dependencies.blocks_pattern", &config.dependencies.blocks_pattern);
        let parent = compile("epics.body_pattern", &config.epics.body_pattern);
        Self {
            config,
            depends_on,
            blocks,
            parent,
        }
    }

    /// The conventions this mapper was compiled from.
    pub fn config(&self) -> &ConventionConfig {
        &self.config
    }

    /// External label naming `issue_type`, if the vocabulary has one.
    pub fn label_for_type(&self, issue_type: IssueType) -> Option<&str> {
        self.config
            .labels
            .types
            .iter()
            .find(|(_, t)| **t == issue_type)
            .map(|(label, _)| label.as_str())
    }

    /// External label naming `priority`, if the vocabulary has one.
    pub fn label_for_priority(&self, priority: Priority) -> Option<&str> {
        self.config
            .labels
            .priority
            .iter()
            .find(|(_, p)| **p == priority.value())
            .map(|(label, _)| label.as_str())
    }

    /// Label standing in for `in_progress`; `None` when unset or empty.
    pub fn in_progress_label(&self) -> Option<&str> {
        non_empty(self.config.labels.status.in_progress.as_deref())
    }

    /// Label standing in for `blocked`; `None` when unset or empty.
    pub fn blocked_label(&self) -> Option<&str> {
        non_empty(self.config.labels.status.blocked.as_deref())
    }

    /// First label (in input order) that names a type; `task` otherwise.
    pub fn type_for_labels(&self, labels: &[String]) -> IssueType {
        labels
            .iter()
            .find_map(|label| self.config.labels.types.get(label).copied())
            .unwrap_or_default()
    }

    /// First label that names a valid priority; `2` otherwise.
    pub fn priority_for_labels(&self, labels: &[String]) -> Priority {
        labels
            .iter()
            .find_map(|label| self.config.labels.priority.get(label).copied().and_then(Priority::new))
            .unwrap_or_default()
    }

    /// Whether `labels` carries the in-progress label.
    pub fn in_progress_for_labels(&self, labels: &[String]) -> bool {
        self.in_progress_label()
            .is_some_and(|wanted| labels.iter().any(|l| l == wanted))
    }

    /// Whether `labels` carries the blocked label.
    pub fn blocked_for_labels(&self, labels: &[String]) -> bool {
        self.blocked_label().is_some_and(|wanted| labels.iter().any(|l| l == wanted))
    }

    /// Whether a label is part of the type/priority/status vocabulary and
    /// therefore not carried as a free-form local label.
    pub fn is_convention_label(&self, label: &str) -> bool {
        self.config.labels.types.contains_key(label)
            || self.config.labels.priority.contains_key(label)
            || self.in_progress_label() == Some(label)
            || self.blocked_label() == Some(label)
    }

    /// Decode the depends-on, blocks and parent references in `body`.
    ///
    /// Only the first parent reference is kept.
    pub fn extract_relations(&self, body: &str) -> Relations {
        let separator = self.config.dependencies.separator.as_str();
        Relations {
            depends_on: collect_refs(self.depends_on.as_ref(), body, separator),
            blocks: collect_refs(self.blocks.as_ref(), body, separator),
            parent: collect_refs(self.parent.as_ref(), body, separator).into_iter().next(),
        }
    }

    /// Remove relation lines, the metadata marker and the footer rule.
    ///
    /// A body without any metadata is returned unchanged.
    pub fn strip_metadata(&self, body: &str) -> String {
        let patterns = [&self.depends_on, &self.blocks, &self.parent];
        let has_metadata = body.contains(METADATA_MARKER)
            || patterns.iter().any(|re| re.as_ref().is_some_and(|re| re.is_match(body)));
        if !has_metadata {
            return body.to_string();
        }

        let mut text = body.to_string();
        for re in patterns.into_iter().flatten() {
            text = re.replace_all(&text, "").into_owned();
        }
        text = text
            .lines()
            .filter(|line| line.trim() != METADATA_MARKER)
            .collect::<Vec<_>>()
            .join("\n");

        let mut trimmed = text.trim_end();
        if let Some(rest) = trimmed.strip_suffix(FOOTER_RULE) {
            trimmed = rest;
        }
        collapse_blank_lines(trimmed).trim().to_string()
    }
}

fn compile(name: &str, pattern: &str) -> Option<Regex> {
    if pattern.trim().is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(convention = name, pattern, error = %e, "ignoring invalid convention pattern");
            None
        }
    }
}

/// Collapse runs of three or more newlines to a single blank line.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    out
}

fn non_empty(label: Option<&str>) -> Option<&str> {
    label.filter(|l| !l.is_empty())
}

fn collect_refs(re: Option<&Regex>, body: &str, separator: &str) -> Vec<String> {
    let Some(re) = re else {
        return Vec::new();
    };
    let mut refs: Vec<String> = Vec::new();
    for caps in re.captures_iter(body) {
        let Some(list) = caps.get(1) else {
            continue;
        };
        let parts: Vec<&str> = if separator.is_empty() {
            vec![list.as_str()]
        } else {
            list.as_str().split(separator).collect()
        };
        for part in parts {
            let reference = part.trim();
            let reference = reference.strip_prefix('#').unwrap_or(reference).trim();
            if !reference.is_empty() && !refs.iter().any(|r| r == reference) {
                refs.push(reference.to_string());
            }
        }
    }
    refs
}
