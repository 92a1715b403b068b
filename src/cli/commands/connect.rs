//! Implementation of the `beadsync connect` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use std::path::Path;
use tokio::fs;

use crate::cli::context::{CliContext, Connection};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, Installation};
use crate::domain::ports::InstallationRepository;
use crate::infrastructure::config::loader::PROJECT_CONFIG_PATH;

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,
}

/// Result of `connect`.
#[derive(Debug, serde::Serialize)]
pub struct ConnectOutput {
    /// Whether the connection was stored.
    pub success: bool,
    /// Summary line.
    pub message: String,
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Installation created or reused.
    pub installation_id: String,
    /// Project config file written with the default conventions, if any.
    pub config_written: Option<String>,
}

impl CommandOutput for ConnectOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        lines.push(format!("Installation: {}", self.installation_id));
        if let Some(path) = &self.config_written {
            lines.push(format!("Wrote default configuration to {path}"));
        }
        lines.join("\n")
    }
}

fn validate_segment(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains('/') || value.chars().any(char::is_whitespace) {
        bail!("Invalid repository {kind}: {value:?}");
    }
    Ok(())
}

/// Write the default configuration unless a project config already exists.
async fn write_default_config(config: &Config) -> Result<Option<String>> {
    let path = Path::new(PROJECT_CONFIG_PATH);
    if path.exists() {
        return Ok(None);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    fs::write(path, yaml)
        .await
        .with_context(|| format!("Failed to write {PROJECT_CONFIG_PATH}"))?;
    Ok(Some(PROJECT_CONFIG_PATH.to_string()))
}

/// Store the binding. No network call is made.
pub async fn execute(args: ConnectArgs, config: Config, explicit_config: bool, json_mode: bool) -> Result<()> {
    validate_segment("owner", &args.owner)?;
    validate_segment("name", &args.repo)?;

    let config_written = if explicit_config {
        None
    } else {
        write_default_config(&config).await?
    };

    let ctx = CliContext::open(config).await?;
    let installations = ctx.installations();
    let (installation, reused) = match installations.find_by_account(&args.owner, &args.repo).await? {
        Some(existing) => (existing, true),
        None => {
            let installation = Installation::new(&args.owner, &args.repo);
            installations
                .create(&installation)
                .await
                .context("Failed to record installation")?;
            (installation, false)
        }
    };

    let connection = Connection {
        owner: installation.owner.clone(),
        repo: installation.repo.clone(),
        installation_id: installation.id,
        last_sync: None,
    };
    connection
        .save(&ctx.settings())
        .await
        .context("Failed to store connection")?;
    tracing::info!(installation_id = %installation.id, account = %connection.account_ref(), reused, "connected");

    let message = if reused {
        format!("Reconnected to {}; existing mappings are kept.", connection.account_ref())
    } else {
        format!("Connected to {}.", connection.account_ref())
    };
    output(
        &ConnectOutput {
            success: true,
            message,
            owner: connection.owner,
            repo: connection.repo,
            installation_id: installation.id.to_string(),
            config_written,
        },
        json_mode,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_segment() {
        assert!(validate_segment("owner", "octo-org").is_ok());
        assert!(validate_segment("owner", "").is_err());
        assert!(validate_segment("name", "a/b").is_err());
        assert!(validate_segment("name", "has space").is_err());
    }
}
