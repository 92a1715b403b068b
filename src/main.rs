//! beadsync CLI entry point.

use clap::Parser;

use beadsync::cli::{commands, context::CliContext, handle_error, Cli, Commands};
use beadsync::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CliContext::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Connect(args) => commands::connect::execute(args, config, cli.config.is_some(), cli.json).await,
        Commands::Sync(args) => commands::sync::execute(args, config, cli.json).await,
        Commands::Status => commands::status::execute(config, cli.json).await,
        Commands::Disconnect => commands::disconnect::execute(config, cli.json).await,
        Commands::Serve(args) => commands::serve::execute(args, config, cli.json).await,
        Commands::PruneDeliveries(args) => commands::prune::execute(args, config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
