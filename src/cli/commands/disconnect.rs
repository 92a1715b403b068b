//! Implementation of the `beadsync disconnect` command.

use anyhow::{Context, Result};

use crate::cli::context::{CliContext, Connection};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Result of `disconnect`.
#[derive(Debug, serde::Serialize)]
pub struct DisconnectOutput {
    /// Always true once the keys are cleared.
    pub success: bool,
    /// Whether a connection was stored before.
    pub was_connected: bool,
    /// Summary line.
    pub message: String,
}

impl CommandOutput for DisconnectOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

/// Clear every stored connection key. Mappings and sync history stay in the
/// database so a later `connect` to the same repository picks them up.
pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;
    let settings = ctx.settings();
    let previous = ctx.connection().await.ok().flatten();
    let was_connected = Connection::clear(&settings)
        .await
        .context("Failed to clear connection")?;

    let message = match (&previous, was_connected) {
        (Some(conn), _) => format!("Disconnected from {}.", conn.account_ref()),
        (None, true) => "Cleared a partial connection.".to_string(),
        (None, false) => "Not connected.".to_string(),
    };
    output(
        &DisconnectOutput {
            success: true,
            was_connected,
            message,
        },
        json_mode,
    );
    Ok(())
}
