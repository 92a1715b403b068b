//! Command-line interface.
//!
//! `beadsync` binds the local issue store to one GitHub repository and runs
//! sync operations against it:
//!
//! - `connect` / `disconnect` / `status`: manage the stored binding
//! - `sync`: push, pull, or fully reconcile
//! - `serve`: receive GitHub webhooks
//! - `prune-deliveries`: forget old webhook delivery ids

pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    connect::ConnectArgs, prune::PruneArgs, serve::ServeArgs, sync::SyncArgs,
};

#[derive(Parser, Debug)]
#[command(name = "beadsync")]
#[command(about = "Bidirectional sync between a local beads store and GitHub Issues", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of `.beadsync/`
    #[arg(short, long, global = true, env = "BEADSYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bind the local store to a GitHub repository
    Connect(ConnectArgs),

    /// Synchronize issues with the connected repository
    Sync(SyncArgs),

    /// Show the connection and last sync outcome
    Status,

    /// Forget the stored connection
    Disconnect,

    /// Receive GitHub webhooks for the connected repository
    Serve(ServeArgs),

    /// Delete webhook delivery ids older than the retention window
    PruneDeliveries(PruneArgs),
}

/// Print an error and its cause chain, then exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  Caused by: {cause}");
        }
    }
    std::process::exit(1);
}
