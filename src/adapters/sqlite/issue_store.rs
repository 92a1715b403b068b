//! SQLite-backed local issue store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_json_or_default, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{IssueStatus, IssueType, LocalIssue, Priority};
use crate::domain::ports::LocalIssueStore;

/// Prefix of store-assigned issue ids.
pub const ID_PREFIX: &str = "bd-";

/// Local beads issues.
#[derive(Clone)]
pub struct SqliteIssueStore {
    pool: SqlitePool,
}

impl SqliteIssueStore {
    /// Store backed by `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{ID_PREFIX}{}", &hex[..8])
    }
}

const ISSUE_COLUMNS: &str = "id, title, description, issue_type, status, priority, assignee, labels, \
     depends_on, blocks, parent, external_ref, created_at, updated_at, closed_at";

#[async_trait]
impl LocalIssueStore for SqliteIssueStore {
    async fn get(&self, id: &str) -> DomainResult<Option<LocalIssue>> {
        let row: Option<IssueRow> = sqlx::query_as(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create(&self, issue: &LocalIssue) -> DomainResult<LocalIssue> {
        let mut stored = issue.clone();
        if stored.id.is_none() {
            stored.id = Some(Self::generate_id());
        }
        if stored.status.is_closed() && stored.closed_at.is_none() {
            stored.closed_at = Some(stored.updated_at);
        }

        sqlx::query(&format!(
            "INSERT INTO issues ({ISSUE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&stored.id)
        .bind(&stored.title)
        .bind(&stored.description)
        .bind(stored.issue_type.as_str())
        .bind(stored.status.as_str())
        .bind(i64::from(stored.priority.value()))
        .bind(&stored.assignee)
        .bind(serde_json::to_string(&stored.labels)?)
        .bind(serde_json::to_string(&stored.depends_on)?)
        .bind(serde_json::to_string(&stored.blocks)?)
        .bind(&stored.parent)
        .bind(&stored.external_ref)
        .bind(format_datetime(stored.created_at))
        .bind(format_datetime(stored.updated_at))
        .bind(stored.closed_at.map(format_datetime))
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn update(&self, issue: &LocalIssue) -> DomainResult<LocalIssue> {
        let id = issue
            .id
            .clone()
            .ok_or_else(|| DomainError::ValidationFailed("cannot update an issue without an id".to_string()))?;

        let mut stored = issue.clone();
        stored.updated_at = Utc::now();
        stored.closed_at = if stored.status.is_closed() {
            stored.closed_at.or(Some(stored.updated_at))
        } else {
            None
        };

        let result = sqlx::query(
            r"UPDATE issues SET title = ?, description = ?, issue_type = ?, status = ?, priority = ?,
                     assignee = ?, labels = ?, depends_on = ?, blocks = ?, parent = ?, external_ref = ?,
                     updated_at = ?, closed_at = ?
              WHERE id = ?",
        )
        .bind(&stored.title)
        .bind(&stored.description)
        .bind(stored.issue_type.as_str())
        .bind(stored.status.as_str())
        .bind(i64::from(stored.priority.value()))
        .bind(&stored.assignee)
        .bind(serde_json::to_string(&stored.labels)?)
        .bind(serde_json::to_string(&stored.depends_on)?)
        .bind(serde_json::to_string(&stored.blocks)?)
        .bind(&stored.parent)
        .bind(&stored.external_ref)
        .bind(format_datetime(stored.updated_at))
        .bind(stored.closed_at.map(format_datetime))
        .bind(&id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::IssueNotFound(id));
        }
        Ok(stored)
    }

    async fn list(&self) -> DomainResult<Vec<LocalIssue>> {
        let rows: Vec<IssueRow> = sqlx::query_as(&format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete(&self, id: &str) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM issues WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: String,
    title: String,
    description: String,
    issue_type: String,
    status: String,
    priority: i64,
    assignee: Option<String>,
    labels: Option<String>,
    depends_on: Option<String>,
    blocks: Option<String>,
    parent: Option<String>,
    external_ref: Option<String>,
    created_at: String,
    updated_at: String,
    closed_at: Option<String>,
}

impl TryFrom<IssueRow> for LocalIssue {
    type Error = DomainError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        let issue_type = IssueType::from_str(&row.issue_type)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid issue type: {}", row.issue_type)))?;

        let status = IssueStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        let priority = u8::try_from(row.priority)
            .ok()
            .and_then(Priority::new)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid priority: {}", row.priority)))?;

        Ok(LocalIssue {
            id: Some(row.id),
            title: row.title,
            description: row.description,
            issue_type,
            status,
            priority,
            assignee: row.assignee,
            labels: parse_json_or_default(row.labels)?,
            depends_on: parse_json_or_default(row.depends_on)?,
            blocks: parse_json_or_default(row.blocks)?,
            parent: row.parent,
            external_ref: row.external_ref,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
            closed_at: parse_optional_datetime(row.closed_at)?,
        })
    }
}
