// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # CITADEL CLI
//!
//! The `citadel` binary runs a platform node and offers operator commands
//! against the same wiring.
//!
//! ## Commands
//!
//! - `citadel serve` - Run the node: database manager, vector gateway,
//!   startup reconciliation, filesystem watcher, task fabric, RSS scheduler
//! - `citadel ingest <file>` - Ingest a local file
//! - `citadel search <query>` - Similarity search
//! - `citadel rss add|list` - Feed management
//! - `citadel config show` - Effective configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod node;

/// CITADEL knowledge platform node and operator CLI
#[derive(Parser)]
#[command(name = "citadel")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "CITADEL_CONFIG_PATH",
        value_name = "FILE",
        default_value = "citadel-config.yaml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CITADEL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the platform node
    Serve,

    /// Ingest a local file into a scope
    Ingest(commands::ingest::IngestArgs),

    /// Similarity search over indexed documents
    Search(commands::search::SearchArgs),

    /// RSS feed management
    Rss {
        #[command(subcommand)]
        command: commands::rss::RssCommand,
    },

    /// Agent tool routing (deploy / select)
    Tools {
        #[command(subcommand)]
        command: commands::tools::ToolsCommand,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommand,
    },
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("citadel={level},citadel_core={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Serve => node::serve(&cli.config).await,
        Commands::Ingest(args) => commands::ingest::run(&cli.config, args).await,
        Commands::Search(args) => commands::search::run(&cli.config, args).await,
        Commands::Rss { command } => commands::rss::run(&cli.config, command).await,
        Commands::Tools { command } => commands::tools::run(&cli.config, command).await,
        Commands::Config { command } => commands::config::run(&cli.config, command),
    }
}
