pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Lifecycle-scoped subscriptions and stream rate shaping", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/tether/config.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate a screen consuming a bursty feed
    Demo {
        /// Override the normalizer window (milliseconds)
        #[arg(short, long)]
        window_ms: Option<u64>,

        /// Override the number of items the feed produces
        #[arg(short, long)]
        items: Option<usize>,
    },
    /// Print the resolved configuration
    Config,
}
