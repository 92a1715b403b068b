//! Implementation of the `beadsync sync` command.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::adapters::sqlite::SqliteIssueStore;
use crate::cli::context::{CliContext, Connection};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{Config, ConflictStrategy, SyncDirection, SyncResult};
use crate::domain::ports::LocalIssueStore;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Both,
    Push,
    Pull,
}

impl From<DirectionArg> for SyncDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Both => Self::Both,
            DirectionArg::Push => Self::Push,
            DirectionArg::Pull => Self::Pull,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    GithubWins,
    BeadsWins,
    NewestWins,
}

impl From<StrategyArg> for ConflictStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::GithubWins => Self::GithubWins,
            StrategyArg::BeadsWins => Self::BeadsWins,
            StrategyArg::NewestWins => Self::NewestWins,
        }
    }
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Which way to sync
    #[arg(short, long, value_enum, default_value_t = DirectionArg::Both)]
    pub direction: DirectionArg,

    /// Conflict strategy for a full sync (defaults to `sync.default_strategy`)
    #[arg(short, long, value_enum)]
    pub strategy: Option<StrategyArg>,
}

/// Result of a sync that ran.
#[derive(Debug, serde::Serialize)]
pub struct SyncOutput {
    /// False when any item failed.
    pub success: bool,
    /// `owner/repo`.
    pub account: String,
    /// Direction that ran.
    pub direction: SyncDirection,
    /// Pairs created.
    pub created: usize,
    /// Pairs overwritten on one side.
    pub updated: usize,
    /// Pairs left alone.
    pub skipped: usize,
    /// Pairs whose counterpart vanished.
    pub orphaned: usize,
    /// Divergences resolved by the strategy.
    pub conflicts: usize,
    /// Whether Ctrl-C stopped the run early.
    pub cancelled: bool,
    /// Full per-item detail.
    pub result: SyncResult,
}

impl SyncOutput {
    fn new(account: String, direction: SyncDirection, result: SyncResult) -> Self {
        Self {
            success: !result.has_errors() && !result.cancelled,
            account,
            direction,
            created: result.created.len(),
            updated: result.updated.len(),
            skipped: result.skipped.len(),
            orphaned: result.orphaned.len(),
            conflicts: result.conflicts.len(),
            cancelled: result.cancelled,
            result,
        }
    }
}

impl CommandOutput for SyncOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Synced {}: {} created, {} updated, {} conflict(s), {} error(s)",
            self.account,
            self.created,
            self.updated,
            self.conflicts,
            self.result.errors.len()
        )];
        if self.skipped > 0 || self.orphaned > 0 {
            lines.push(format!("  {} unchanged, {} orphaned", self.skipped, self.orphaned));
        }
        for conflict in &self.result.conflicts {
            lines.push(format!(
                "  conflict {} <-> #{}: kept {}",
                conflict.local_id,
                conflict.external_number,
                conflict.resolution.as_str()
            ));
        }
        for error in &self.result.errors {
            lines.push(format!("  {}: {}", error.id, error.message));
        }
        if self.cancelled {
            lines.push("Cancelled before completion; the remaining issues were not processed.".to_string());
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
struct NotConnectedOutput {
    success: bool,
    connected: bool,
    message: String,
}

impl CommandOutput for NotConnectedOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

/// A sync that did not start.
#[derive(Debug, serde::Serialize)]
struct NotStartedOutput {
    success: bool,
    message: String,
}

impl NotStartedOutput {
    fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl CommandOutput for NotStartedOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

/// Why `args` cannot run, if they cannot.
fn invalid_combination(args: &SyncArgs) -> Option<&'static str> {
    (args.strategy.is_some() && args.direction != DirectionArg::Both)
        .then_some("--strategy only applies to a full sync (--direction both)")
}

/// Cancel `token` on Ctrl-C so a long sync stops between issues.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current issue");
            token.cancel();
        }
    });
}

/// Run a manual sync in the requested direction.
pub async fn execute(args: SyncArgs, config: Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;
    let Some(connection) = ctx.connection().await? else {
        output(
            &NotConnectedOutput {
                success: false,
                connected: false,
                message: "Not connected. Run `beadsync connect <owner> <repo>` first.".to_string(),
            },
            json_mode,
        );
        return Ok(());
    };

    if let Some(message) = invalid_combination(&args) {
        output(&NotStartedOutput::new(message), json_mode);
        return Ok(());
    }
    let direction = SyncDirection::from(args.direction);

    let installation = ctx.installation(&connection).await?;
    let orchestrator = ctx.orchestrator(installation)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(&cancel);

    let result = match direction {
        SyncDirection::Both => orchestrator.sync(args.strategy.map(Into::into), &cancel).await,
        SyncDirection::Push => {
            let issues = SqliteIssueStore::new(ctx.pool.clone())
                .list()
                .await
                .context("Failed to list local issues")?;
            orchestrator.push_to_github(&issues, &cancel).await
        }
        SyncDirection::Pull => orchestrator.pull_from_github(&cancel).await,
    };
    let result = match result {
        Err(e @ DomainError::SyncInProgress(_)) => {
            output(&NotStartedOutput::new(e.to_string()), json_mode);
            return Ok(());
        }
        other => other.with_context(|| format!("Sync with {} failed", connection.account_ref()))?,
    };

    if !result.cancelled {
        Connection::record_sync(&ctx.settings(), Utc::now())
            .await
            .context("Failed to record sync time")?;
    }

    output(&SyncOutput::new(connection.account_ref(), direction, result), json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_output_lists_errors_by_id() {
        let mut result = SyncResult::default();
        result.created.push("bd-1".to_string());
        result.record_error("bd-2", &DomainError::ValidationFailed("title is empty".to_string()));
        let out = SyncOutput::new("octo/widgets".to_string(), SyncDirection::Push, result);

        assert!(!out.success);
        let human = out.to_human();
        assert!(human.contains("1 created, 0 updated, 0 conflict(s), 1 error(s)"));
        assert!(human.contains("bd-2: "));
    }

    #[test]
    fn test_strategy_arg_maps_to_domain() {
        assert_eq!(ConflictStrategy::from(StrategyArg::BeadsWins), ConflictStrategy::BeadsWins);
        assert_eq!(SyncDirection::from(DirectionArg::Pull), SyncDirection::Pull);
    }

    #[test]
    fn test_strategy_only_combines_with_full_sync() {
        let args = |direction, strategy| SyncArgs { direction, strategy };

        assert!(invalid_combination(&args(DirectionArg::Both, Some(StrategyArg::GithubWins))).is_none());
        assert!(invalid_combination(&args(DirectionArg::Push, None)).is_none());
        assert!(invalid_combination(&args(DirectionArg::Push, Some(StrategyArg::GithubWins))).is_some());
        assert!(invalid_combination(&args(DirectionArg::Pull, Some(StrategyArg::NewestWins))).is_some());
    }

    #[test]
    fn test_not_started_output_reports_failure() {
        let out = NotStartedOutput::new("busy");
        assert!(!out.success);
        assert_eq!(out.to_human(), "busy");
    }
}
