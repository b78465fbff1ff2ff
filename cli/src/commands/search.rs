// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

use citadel_core::infrastructure::vector::SearchOptions;

use crate::node;

#[derive(Args)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Scope search to one user's documents plus the global collection
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, default_value = "10")]
    pub limit: u64,

    #[arg(long, default_value = "0.3")]
    pub threshold: f32,

    /// Pull in neighboring chunks around each hit
    #[arg(long)]
    pub adjacent: bool,

    /// Filter by document category
    #[arg(long)]
    pub category: Option<String>,
}

pub async fn run(config: &Path, args: SearchArgs) -> Result<()> {
    let wiring = node::wire(config).await?;

    let hits = wiring
        .vector
        .search_similar(
            &args.query,
            &SearchOptions {
                limit: args.limit,
                score_threshold: args.threshold,
                user_id: args.user,
                include_adjacent: args.adjacent,
                filter_category: args.category,
                filter_tags: None,
            },
        )
        .await?;

    if hits.is_empty() {
        println!("{}", "no results".yellow());
        return Ok(());
    }
    for hit in hits {
        let marker = if hit.is_adjacent { " (adjacent)" } else { "" };
        let name = hit
            .document_filename
            .as_deref()
            .unwrap_or_else(|| hit.document_id.as_str());
        println!(
            "{} {:.3}{} {} [{}]",
            "·".dimmed(),
            hit.score,
            marker.dimmed(),
            name.bold(),
            hit.source_collection.dimmed()
        );
        let preview: String = hit.content.chars().take(160).collect();
        println!("    {}", preview);
    }
    Ok(())
}
