//! Common test utilities for integration tests
//!
//! Builds an orchestrator over the in-memory tracker and a migrated
//! in-memory SQLite database.

#![allow(dead_code)]

use std::sync::Arc;

use beadsync::adapters::github::MockTracker;
use beadsync::adapters::sqlite::{
    create_migrated_test_pool, SqliteDeliveryLog, SqliteInstallationRepository, SqliteIssueStore, SqliteMappingStore,
};
use beadsync::domain::models::{
    ExternalIssue, ExternalLabel, ExternalState, Installation, IssueMapping, LocalIssue, WebhookEvent,
};
use beadsync::domain::ports::{InstallationRepository, LocalIssueStore, MappingStore};
use beadsync::services::SyncOrchestrator;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub const OWNER: &str = "octo";
pub const REPO: &str = "widgets";

pub type TestOrchestrator =
    SyncOrchestrator<MockTracker, SqliteIssueStore, SqliteMappingStore, SqliteInstallationRepository, SqliteDeliveryLog>;

/// Stores, tracker and installation shared by one test.
pub struct Harness {
    pub pool: SqlitePool,
    pub tracker: Arc<MockTracker>,
    pub store: Arc<SqliteIssueStore>,
    pub mappings: Arc<SqliteMappingStore>,
    pub installations: Arc<SqliteInstallationRepository>,
    pub deliveries: Arc<SqliteDeliveryLog>,
    pub installation: Installation,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = create_migrated_test_pool().await.expect("failed to create test pool");
        let installations = Arc::new(SqliteInstallationRepository::new(pool.clone()));
        let installation = Installation::new(OWNER, REPO);
        installations
            .create(&installation)
            .await
            .expect("failed to create installation");

        Self {
            tracker: Arc::new(MockTracker::new(OWNER, REPO)),
            store: Arc::new(SqliteIssueStore::new(pool.clone())),
            mappings: Arc::new(SqliteMappingStore::new(pool.clone())),
            deliveries: Arc::new(SqliteDeliveryLog::new(pool.clone())),
            installations,
            installation,
            pool,
        }
    }

    pub fn orchestrator(&self) -> TestOrchestrator {
        SyncOrchestrator::new(
            self.installation.clone(),
            self.tracker.clone(),
            self.store.clone(),
            self.mappings.clone(),
            self.installations.clone(),
            self.deliveries.clone(),
        )
    }

    /// Save a local issue and return it with its assigned id.
    pub async fn local(&self, issue: LocalIssue) -> LocalIssue {
        self.store.create(&issue).await.expect("failed to create local issue")
    }

    pub async fn local_issues(&self) -> Vec<LocalIssue> {
        self.store.list().await.expect("failed to list local issues")
    }

    pub async fn get_local(&self, id: &str) -> LocalIssue {
        self.store
            .get(id)
            .await
            .expect("failed to get local issue")
            .expect("local issue missing")
    }

    pub async fn all_mappings(&self) -> Vec<IssueMapping> {
        self.mappings
            .list_mappings(self.installation.id)
            .await
            .expect("failed to list mappings")
    }

    pub async fn mapping_for(&self, local_id: &str) -> Option<IssueMapping> {
        self.mappings
            .get_mapping(self.installation.id, local_id)
            .await
            .expect("failed to get mapping")
    }
}

/// An open external issue as GitHub would return it.
pub fn external_issue(number: u64, title: &str, labels: &[&str], body: Option<&str>) -> ExternalIssue {
    external_issue_at(number, title, labels, body, Utc::now())
}

pub fn external_issue_at(
    number: u64,
    title: &str,
    labels: &[&str],
    body: Option<&str>,
    updated_at: DateTime<Utc>,
) -> ExternalIssue {
    ExternalIssue {
        number,
        title: title.to_string(),
        body: body.map(str::to_string),
        state: ExternalState::Open,
        labels: labels.iter().map(|l| ExternalLabel { name: (*l).to_string() }).collect(),
        assignee: None,
        created_at: updated_at,
        updated_at,
        closed_at: None,
        html_url: format!("https://github.com/{OWNER}/{REPO}/issues/{number}"),
        pull_request: None,
    }
}

/// An `issues` webhook delivery carrying `issue`.
pub fn issue_event(delivery_id: &str, action: &str, issue: &ExternalIssue) -> WebhookEvent {
    WebhookEvent {
        delivery_id: delivery_id.to_string(),
        event_kind: "issues".to_string(),
        action: action.to_string(),
        payload: serde_json::json!({
            "action": action,
            "issue": issue,
        }),
    }
}
