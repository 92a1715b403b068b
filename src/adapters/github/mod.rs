//! GitHub Issues adapter.
//!
//! Provides the [`IssueTracker`](crate::domain::ports::IssueTracker)
//! implementation backed by the GitHub REST API, a retry decorator, and an
//! in-memory mock used by tests.

pub mod client;
pub mod mock;
pub mod models;
pub mod retrying;

pub use client::GitHubClient;
pub use mock::{MockTracker, TrackerOp};
pub use retrying::RetryingTracker;
