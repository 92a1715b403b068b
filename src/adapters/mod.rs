//! Infrastructure adapters for external systems.

pub mod github;
pub mod sqlite;
pub mod webhook;
