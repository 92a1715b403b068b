//! Implementation of the `beadsync status` command.

use anyhow::Result;

use crate::adapters::sqlite::SqliteMappingStore;
use crate::cli::context::CliContext;
use crate::cli::output::{or_dash, output, CommandOutput};
use crate::domain::models::Config;
use crate::domain::ports::{InstallationRepository, MappingStore};

/// Result of `status`.
#[derive(Debug, Default, serde::Serialize)]
pub struct StatusOutput {
    /// Whether a connection is stored.
    pub connected: bool,
    /// Repository owner.
    pub owner: Option<String>,
    /// Repository name.
    pub repo: Option<String>,
    /// Installation id.
    pub installation_id: Option<String>,
    /// Last successful sync, RFC 3339.
    pub last_sync: Option<String>,
    /// Status of the last sync unit.
    pub last_status: Option<String>,
    /// Message of the last failure.
    pub last_error: Option<String>,
    /// Failed units since the last success.
    pub consecutive_failures: u32,
    /// Last processed webhook delivery.
    pub last_delivery_id: Option<String>,
    /// Bound pairs.
    pub mapped_issues: usize,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        if !self.connected {
            return "Not connected. Run `beadsync connect <owner> <repo>` first.".to_string();
        }
        let mut lines = vec![
            format!(
                "Connected to {}/{}",
                self.owner.as_deref().unwrap_or_default(),
                self.repo.as_deref().unwrap_or_default()
            ),
            format!("  Last sync:     {}", or_dash(self.last_sync.as_ref())),
            format!("  Last status:   {}", or_dash(self.last_status.as_ref())),
            format!("  Mapped issues: {}", self.mapped_issues),
        ];
        if let Some(error) = &self.last_error {
            lines.push(format!(
                "  Last error:    {error} ({} consecutive failure(s))",
                self.consecutive_failures
            ));
        }
        if let Some(delivery) = &self.last_delivery_id {
            lines.push(format!("  Last delivery: {delivery}"));
        }
        lines.join("\n")
    }
}

/// Report the connection and last sync outcome.
pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;
    let Some(connection) = ctx.connection().await? else {
        output(&StatusOutput::default(), json_mode);
        return Ok(());
    };

    let state = ctx.installations().get_sync_state(connection.installation_id).await?;
    let mapped_issues = SqliteMappingStore::new(ctx.pool.clone())
        .list_mappings(connection.installation_id)
        .await?
        .len();

    let out = StatusOutput {
        connected: true,
        owner: Some(connection.owner),
        repo: Some(connection.repo),
        installation_id: Some(connection.installation_id.to_string()),
        last_sync: connection.last_sync.map(|at| at.to_rfc3339()),
        last_status: state.as_ref().map(|s| s.status.as_str().to_string()),
        last_error: state.as_ref().and_then(|s| s.error_message.clone()),
        consecutive_failures: state.as_ref().map_or(0, |s| s.error_count),
        last_delivery_id: state.and_then(|s| s.last_external_event_cursor),
        mapped_issues,
    };
    output(&out, json_mode);
    Ok(())
}
