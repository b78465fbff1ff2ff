// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use citadel_agents::tools::{builtin_tools, ToolRegistry};

use crate::node;

#[derive(Subcommand)]
pub enum ToolsCommand {
    /// Vectorize the built-in tool pack into the tools collection.
    /// Run on deployment.
    Deploy,
    /// Retrieve candidate tools for a task description
    Select {
        task: String,
        #[arg(long, default_value = "5")]
        k: u64,
    },
}

pub async fn run(config: &Path, command: ToolsCommand) -> Result<()> {
    let wiring = node::wire(config).await?;
    let registry = ToolRegistry::new(
        wiring.vector.clone(),
        wiring.settings.vector.tools_collection.clone(),
    );

    match command {
        ToolsCommand::Deploy => {
            let deployed = registry.deploy(&builtin_tools()).await?;
            println!("{} {} tools vectorized", "deployed".green().bold(), deployed);
        }
        ToolsCommand::Select { task, k } => {
            let candidates = registry.select_tools(&task, k).await?;
            if candidates.is_empty() {
                println!("{}", "no candidate tools (run `tools deploy` first)".yellow());
            }
            for candidate in candidates {
                println!(
                    "{} {:.3} {} — {}",
                    "·".dimmed(),
                    candidate.score,
                    candidate.name.bold(),
                    candidate.description
                );
            }
        }
    }
    Ok(())
}
