// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::Path;

use crate::node;

#[derive(Subcommand)]
pub enum RssCommand {
    /// Add a feed (polls immediately)
    Add {
        url: String,
        /// Display name; defaults to the URL
        #[arg(long)]
        name: Option<String>,
        /// Owning user id (omit for a global feed)
        #[arg(long)]
        user: Option<String>,
    },
    /// List feeds
    List {
        #[arg(long)]
        user: Option<String>,
    },
}

pub async fn run(config: &Path, command: RssCommand) -> Result<()> {
    let wiring = node::wire(config).await?;

    match command {
        RssCommand::Add { url, name, user } => {
            let name = name.unwrap_or_else(|| url.clone());
            let feed = wiring.rss.create_feed(&url, &name, user).await?;
            println!("{} {} ({})", "added".green().bold(), feed.name, feed.feed_id);
        }
        RssCommand::List { user } => {
            let feeds = wiring.feeds.list(user.as_deref()).await?;
            if feeds.is_empty() {
                println!("{}", "no feeds".yellow());
            }
            for feed in feeds {
                let polling = if feed.is_polling { " [polling]" } else { "" };
                let last = feed
                    .last_check
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{} {}{} — every {}s, last {}",
                    "·".dimmed(),
                    feed.name.bold(),
                    polling.cyan(),
                    feed.check_interval,
                    last.dimmed()
                );
            }
        }
    }
    Ok(())
}
