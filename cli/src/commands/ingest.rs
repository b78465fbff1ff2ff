// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

use citadel_core::application::document_service::UploadOutcome;
use citadel_core::domain::document::Scope;

use crate::node;

#[derive(Args)]
pub struct IngestArgs {
    /// File to ingest
    pub file: PathBuf,

    /// Target user id (omit for the global collection)
    #[arg(long)]
    pub user: Option<String>,

    /// Folder chain, e.g. "Notes/Weekly"
    #[arg(long, default_value = "")]
    pub folder: String,
}

pub async fn run(config: &Path, args: IngestArgs) -> Result<()> {
    let wiring = node::wire(config).await?;

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let filename = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("path has no filename")?;

    let scope = match args.user {
        Some(user) => Scope::user(user),
        None => Scope::global(),
    };
    let chain: Vec<String> = args
        .folder
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    match wiring
        .document_service
        .upload(&bytes, &filename, None, scope, &chain)
        .await?
    {
        UploadOutcome::Created {
            document_id,
            status,
        } => {
            println!(
                "{} {} ({})",
                "ingested".green().bold(),
                document_id,
                status.as_str()
            );
        }
        UploadOutcome::Duplicate {
            existing_id,
            message,
        } => {
            println!("{} {} — {}", "duplicate".yellow().bold(), existing_id, message);
        }
    }
    Ok(())
}
