// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Platform configuration, loaded from `citadel-config.yaml` with
//! environment overrides for anything secret-bearing.
//!
//! Missing credentials are a startup abort, never a silent default — a
//! misconfigured node must not come up half-connected.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::infrastructure::db::DatabaseConfig;

/// Top-level platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the watched upload tree (`Users/`, `Global/`, `Teams/` live under it).
    pub uploads_root: PathBuf,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub vector: VectorSettings,

    #[serde(default)]
    pub redis: RedisSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    #[serde(default)]
    pub rss: RssSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSettings {
    pub url: String,
    /// Name of the shared global collection.
    pub global_collection: String,
    /// Collection used for agent tool routing.
    pub tools_collection: String,
    pub vector_dimension: u64,
    pub embedding_endpoint: String,
    pub embedding_batch_size: usize,
    pub storage_batch_size: usize,
    pub storage_max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub storage_batch_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub storage_batch_delay: Duration,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            global_collection: "citadel_documents".to_string(),
            tools_collection: "tools".to_string(),
            vector_dimension: 384,
            embedding_endpoint: "http://localhost:8089/embed".to_string(),
            embedding_batch_size: 32,
            storage_batch_size: 100,
            storage_max_retries: 3,
            storage_batch_timeout: Duration::from_secs(30),
            storage_batch_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub url: String,
    /// TTL for stashed orchestrator results.
    #[serde(with = "humantime_serde")]
    pub result_ttl: Duration,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            result_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    pub endpoint: String,
    /// Raised send/receive caps for long responses.
    pub max_message_bytes: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            max_message_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssSettings {
    /// How often the scheduler looks for eligible feeds.
    #[serde(with = "humantime_serde")]
    pub scheduler_interval: Duration,
    /// Articles older than this are purged by the retention task.
    pub retention_days: i64,
    /// A feed left `is_polling` longer than this is considered stuck.
    #[serde(with = "humantime_serde")]
    pub stuck_poll_timeout: Duration,
}

impl Default for RssSettings {
    fn default() -> Self {
        Self {
            scheduler_interval: Duration::from_secs(60),
            retention_days: 14,
            stuck_poll_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, then apply environment overrides.
    ///
    /// `DATABASE_URL`, `REDIS_URL`, and `QDRANT_URL` always win over the
    /// file so deployments can keep credentials out of it.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("cannot read config {}: {}", path.as_ref().display(), e)
        })?;
        let mut settings: Settings = serde_yaml::from_str(&raw)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.database_url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis.url = url;
        }
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.vector.url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let yaml = "uploads_root: /var/lib/citadel/uploads\n";
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.vector.vector_dimension, 384);
        assert_eq!(settings.rss.retention_days, 14);
        assert_eq!(settings.redis.result_ttl, Duration::from_secs(3600));
    }
}
