//! Webhook delivery retention job.
//!
//! Periodically forgets delivery ids older than the retention window so the
//! dedup table stays bounded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SyncConfig;
use crate::domain::ports::DeliveryLog;

/// Configuration for the delivery pruner.
#[derive(Debug, Clone)]
pub struct PrunerConfig {
    /// Deliveries older than this are deleted.
    pub retention: Duration,
    /// Interval between prune runs.
    pub interval: Duration,
    /// Maximum consecutive failures before stopping.
    pub max_consecutive_failures: u32,
}

impl Default for PrunerConfig {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

impl PrunerConfig {
    /// Retention and interval from the `sync` config section.
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self {
            retention: Duration::from_secs(config.delivery_retention_hours.saturating_mul(3600)),
            interval: Duration::from_secs(config.prune_interval_secs.max(1)),
            max_consecutive_failures: 5,
        }
    }
}

/// Why the pruner loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    Requested,
    /// Consecutive failures hit the limit.
    TooManyFailures,
}

/// Counters for the pruner loop.
#[derive(Debug, Clone, Default)]
pub struct PrunerStatus {
    /// Whether the loop is active.
    pub running: bool,
    /// Prune passes attempted.
    pub total_runs: u64,
    /// Passes that returned an error.
    pub failed_runs: u64,
    /// Deliveries removed across all passes.
    pub total_pruned: u64,
}

/// Periodically removes old webhook delivery ids.
pub struct DeliveryPruner<D>
where
    D: DeliveryLog + 'static,
{
    log: Arc<D>,
    config: PrunerConfig,
    status: Arc<RwLock<PrunerStatus>>,
}

impl<D> DeliveryPruner<D>
where
    D: DeliveryLog + 'static,
{
    /// Pruner over `log`.
    pub fn new(log: Arc<D>, config: PrunerConfig) -> Self {
        Self {
            log,
            config,
            status: Arc::new(RwLock::new(PrunerStatus::default())),
        }
    }

    /// Snapshot of the counters.
    pub async fn status(&self) -> PrunerStatus {
        self.status.read().await.clone()
    }

    /// Delete every delivery older than the retention window.
    pub async fn prune_once(&self) -> DomainResult<u64> {
        let retention = chrono::Duration::from_std(self.config.retention)
            .map_err(|e| DomainError::ValidationFailed(format!("retention window out of range: {e}")))?;
        let cutoff = Utc::now() - retention;
        let removed = self.log.prune_older_than(cutoff).await?;
        debug!(removed, %cutoff, "pruned webhook deliveries");
        Ok(removed)
    }

    /// Prune on every tick until `cancel` fires or too many runs fail in a row.
    pub async fn run(&self, cancel: CancellationToken) -> StopReason {
        self.status.write().await.running = true;
        info!(
            interval_secs = self.config.interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            "delivery pruner started"
        );

        let mut ticker = interval(self.config.interval);
        let mut consecutive_failures = 0u32;

        let reason = loop {
            tokio::select! {
                () = cancel.cancelled() => break StopReason::Requested,
                _ = ticker.tick() => {
                    let outcome = self.prune_once().await;
                    let mut status = self.status.write().await;
                    status.total_runs += 1;
                    match outcome {
                        Ok(removed) => {
                            consecutive_failures = 0;
                            status.total_pruned += removed;
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            status.failed_runs += 1;
                            warn!(error = %e, consecutive_failures, "delivery prune failed");
                            if consecutive_failures >= self.config.max_consecutive_failures {
                                break StopReason::TooManyFailures;
                            }
                        }
                    }
                }
            }
        };

        self.status.write().await.running = false;
        info!(reason = ?reason, "delivery pruner stopped");
        reason
    }
}
