use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tether::cli::{commands, Cli, Commands};
use tether::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Demo { window_ms, items } => {
            if let Some(window_ms) = window_ms {
                config.normalizer.window_ms = window_ms;
            }
            if let Some(items) = items {
                config.demo.items = items;
            }
            commands::run_demo(&config).await?;
        }
        Commands::Config => {
            commands::show_config(&config)?;
        }
    }

    Ok(())
}
