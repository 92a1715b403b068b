//! Implementation of the `beadsync serve` command.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::sqlite::SqliteDeliveryLog;
use crate::adapters::webhook::{WebhookServer, WebhookServerConfig};
use crate::cli::context::CliContext;
use crate::domain::models::Config;
use crate::services::{DeliveryPruner, PrunerConfig, StopReason};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (defaults to `webhook.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (defaults to `webhook.port`)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not run the background delivery pruner
    #[arg(long)]
    pub no_prune: bool,
}

/// Run the webhook server until Ctrl-C.
///
/// The delivery pruner runs alongside the server and stops with it.
pub async fn execute(args: ServeArgs, config: Config, _json_mode: bool) -> Result<()> {
    let mut server_config = WebhookServerConfig::from_env(&config.webhook);
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    let pruner_config = PrunerConfig::from_sync_config(&config.sync);

    let ctx = CliContext::open(config).await?;
    let Some(connection) = ctx.connection().await? else {
        bail!("Not connected. Run `beadsync connect <owner> <repo>` first.");
    };
    let installation = ctx.installation(&connection).await?;
    let orchestrator = Arc::new(ctx.orchestrator(installation)?);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let pruner_task = if args.no_prune {
        None
    } else {
        let pruner = DeliveryPruner::new(Arc::new(SqliteDeliveryLog::new(ctx.pool.clone())), pruner_config);
        let cancel = shutdown.child_token();
        Some(tokio::spawn(async move {
            if pruner.run(cancel).await == StopReason::TooManyFailures {
                warn!("delivery pruner gave up; old delivery ids will accumulate until restart");
            }
        }))
    };

    info!(account = %connection.account_ref(), "serving webhooks");
    let server = WebhookServer::new(orchestrator, server_config);
    let server_shutdown = shutdown.clone();
    let served = server
        .serve_with_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow!("Webhook server failed: {e}"));

    shutdown.cancel();
    if let Some(task) = pruner_task {
        if let Err(e) = task.await {
            warn!(error = %e, "delivery pruner task panicked");
        }
    }
    served
}
