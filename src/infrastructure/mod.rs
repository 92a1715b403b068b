//! Infrastructure layer module
//!
//! Ambient concerns shared by the adapters and the CLI:
//! - Hierarchical configuration loading (figment)
//! - Structured logging (tracing)
//! - Retry policy for external tracker calls

pub mod config;
pub mod logging;
pub mod retry;
