//! Implementation of the `beadsync prune-deliveries` command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::sqlite::SqliteDeliveryLog;
use crate::cli::context::CliContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::{DeliveryPruner, PrunerConfig};

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Retention window in hours (defaults to `sync.delivery_retention_hours`)
    #[arg(long)]
    pub retention_hours: Option<u64>,
}

/// Result of `prune-deliveries`.
#[derive(Debug, serde::Serialize)]
pub struct PruneOutput {
    /// Whether the pass completed.
    pub success: bool,
    /// Window applied.
    pub retention_hours: u64,
    /// Delivery ids deleted.
    pub removed: u64,
}

impl CommandOutput for PruneOutput {
    fn to_human(&self) -> String {
        format!(
            "Removed {} webhook delivery record(s) older than {} hour(s).",
            self.removed, self.retention_hours
        )
    }
}

/// Run one prune pass.
pub async fn execute(args: PruneArgs, config: Config, json_mode: bool) -> Result<()> {
    let mut pruner_config = PrunerConfig::from_sync_config(&config.sync);
    if let Some(hours) = args.retention_hours {
        pruner_config.retention = Duration::from_secs(hours.saturating_mul(3600));
    }
    let retention_hours = pruner_config.retention.as_secs() / 3600;

    let ctx = CliContext::open(config).await?;
    let pruner = DeliveryPruner::new(Arc::new(SqliteDeliveryLog::new(ctx.pool.clone())), pruner_config);
    let removed = pruner
        .prune_once()
        .await
        .context("Failed to prune webhook deliveries")?;

    output(
        &PruneOutput {
            success: true,
            retention_hours,
            removed,
        },
        json_mode,
    );
    Ok(())
}
