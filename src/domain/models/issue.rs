//! Local issue domain model.
//!
//! A [`LocalIssue`] is the canonical form of an issue in the beads store.
//! Type, status and priority are closed sets: anything outside them is
//! rejected at parse time and defaulted during conversion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of work an issue represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// Defect.
    Bug,
    /// New functionality.
    Feature,
    /// Default kind.
    Task,
    /// Parent of other issues.
    Epic,
    /// Maintenance work.
    Chore,
}

impl Default for IssueType {
    fn default() -> Self {
        Self::Task
    }
}

impl IssueType {
    /// Every type, in declaration order.
    pub const ALL: [Self; 5] = [Self::Bug, Self::Feature, Self::Task, Self::Epic, Self::Chore];

    /// Stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Chore => "chore",
        }
    }

    /// Parse a stored value, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bug" => Some(Self::Bug),
            "feature" => Some(Self::Feature),
            "task" => Some(Self::Task),
            "epic" => Some(Self::Epic),
            "chore" => Some(Self::Chore),
            _ => None,
        }
    }
}

/// Workflow status of a local issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Not started.
    Open,
    /// Being worked on.
    InProgress,
    /// Waiting on another issue.
    Blocked,
    /// Done.
    Closed,
}

impl Default for IssueStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl IssueStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 4] = [Self::Open, Self::InProgress, Self::Blocked, Self::Closed];

    /// Stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Closed => "closed",
        }
    }

    /// Parse a stored value; `in-progress` is accepted too.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Only `closed` maps to a closed external issue.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Issue priority, 0 (most urgent) through 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Least urgent priority.
    pub const MAX: u8 = 4;
    /// Priority used when none is given.
    pub const DEFAULT: Self = Self(2);

    /// Build a priority, returning `None` outside `0..=4`.
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Numeric value, 0..=4.
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("priority {value} is outside 0..=4"))
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Canonical issue record owned by the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIssue {
    /// Store-assigned identifier; `None` until the store creates it.
    pub id: Option<String>,
    /// One-line summary.
    pub title: String,
    /// Markdown description, without the sync footer.
    pub description: String,
    /// Kind of work.
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Workflow status.
    pub status: IssueStatus,
    /// Urgency.
    pub priority: Priority,
    /// Assigned login.
    pub assignee: Option<String>,
    /// Free-form tags not consumed by the label conventions.
    pub labels: Vec<String>,
    /// Ids this issue depends on.
    pub depends_on: Vec<String>,
    /// Ids this issue blocks.
    pub blocks: Vec<String>,
    /// Parent epic id.
    pub parent: Option<String>,
    /// `<owner>/<repo>/issues/<number>` once bound to an external issue.
    pub external_ref: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last local modification; drives change detection.
    pub updated_at: DateTime<Utc>,
    /// Set while closed.
    pub closed_at: Option<DateTime<Utc>>,
}

impl LocalIssue {
    /// Create an open task with default priority.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            issue_type: IssueType::default(),
            status: IssueStatus::default(),
            priority: Priority::default(),
            assignee: None,
            labels: Vec::new(),
            depends_on: Vec::new(),
            blocks: Vec::new(),
            parent: None,
            external_ref: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the type.
    pub fn with_type(mut self, issue_type: IssueType) -> Self {
        self.issue_type = issue_type;
        self
    }

    /// Set the status, stamping `closed_at` when closing.
    pub fn with_status(mut self, status: IssueStatus) -> Self {
        self.status = status;
        if status.is_closed() && self.closed_at.is_none() {
            self.closed_at = Some(self.updated_at);
        }
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the assignee.
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Append a free-form label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Add a depends-on reference.
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Add a blocks reference.
    pub fn with_blocked(mut self, id: impl Into<String>) -> Self {
        self.blocks.push(id.into());
        self
    }

    /// Set the parent epic.
    pub fn with_parent(mut self, id: impl Into<String>) -> Self {
        self.parent = Some(id.into());
        self
    }

    /// Whether any relation (depends-on, blocks, parent) is populated.
    pub fn has_relations(&self) -> bool {
        !self.depends_on.is_empty() || !self.blocks.is_empty() || self.parent.is_some()
    }

    /// The store id, or a placeholder for issues not yet persisted.
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<unsaved>")
    }
}
