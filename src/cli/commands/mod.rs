//! CLI command implementations.

pub mod connect;
pub mod disconnect;
pub mod prune;
pub mod serve;
pub mod status;
pub mod sync;
