//! gembridge CLI entry point

use clap::Parser;
use console::style;
use gembridge::cli::{Cli, Commands};
use gembridge::config::ConfigManager;
use gembridge::error::GemBridgeResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GemBridgeResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    if cli.offline {
        config.upstream.offline = true;
    }

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("gembridge=warn"),
        1 => EnvFilter::new("gembridge=info"),
        _ => EnvFilter::new("gembridge=debug"),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!(path = %config_manager.path().display(), "Loaded configuration");

    match cli.command {
        Commands::Serve(args) => gembridge::cli::commands::serve(args, &config).await,
        Commands::Mux(args) => gembridge::cli::commands::mux(args, &config).await,
        Commands::Fetch(args) => gembridge::cli::commands::fetch(args, &config).await,
        Commands::Ping(args) => gembridge::cli::commands::ping(args, &config).await,
        Commands::Config(args) => {
            gembridge::cli::commands::config(args, &config, &config_manager).await
        }
        Commands::Cache(args) => gembridge::cli::commands::cache(args, &config).await,
    }
}
