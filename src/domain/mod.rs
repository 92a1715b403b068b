//! Domain layer for the beadsync engine
//!
//! This module contains the issue, mapping and installation models, the
//! error taxonomy, and the port traits the adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult, TrackerError};
