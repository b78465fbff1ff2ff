// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use std::path::Path;

use citadel_core::config::Settings;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (env overrides applied)
    Show,
}

pub fn run(config: &Path, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = Settings::load(config)?;
            // Credentials live in the database URL; mask before printing.
            let mut shown = settings.clone();
            shown.database.database_url = mask_url(&shown.database.database_url);
            shown.redis.url = mask_url(&shown.redis.url);
            println!("{}", serde_yaml::to_string(&shown)?);
        }
    }
    Ok(())
}

fn mask_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
