// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Out-of-band result stash.
//!
//! Broker payload caps make large task results problematic, so the
//! orchestrator-query task stores its payload here under
//! `orchestrator_result:<task_id>` with a bounded TTL and returns only a
//! marker through the task-result channel. Readers consult the stash, not
//! the task result.

use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use crate::domain::task::TaskId;

pub const RESULT_KEY_PREFIX: &str = "orchestrator_result:";

#[derive(Debug, thiserror::Error)]
pub enum StashError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct ResultStash {
    connection: redis::aio::ConnectionManager,
    ttl: Duration,
}

impl ResultStash {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, StashError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self { connection, ttl })
    }

    pub fn key_for(task_id: &TaskId) -> String {
        format!("{RESULT_KEY_PREFIX}{task_id}")
    }

    /// Stash a result as UTF-8 JSON with the configured TTL.
    pub async fn put(&self, task_id: &TaskId, result: &serde_json::Value) -> Result<(), StashError> {
        let key = Self::key_for(task_id);
        let body = serde_json::to_string(result)?;
        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(&key, body, self.ttl.as_secs()).await?;
        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "stashed task result");
        Ok(())
    }

    pub async fn peek(&self, task_id: &TaskId) -> Result<Option<serde_json::Value>, StashError> {
        let key = Self::key_for(task_id);
        let mut conn = self.connection.clone();
        let body: Option<String> = conn.get(&key).await?;
        body.map(|b| serde_json::from_str(&b)).transpose().map_err(Into::into)
    }

    /// Read and delete in one round.
    pub async fn take(&self, task_id: &TaskId) -> Result<Option<serde_json::Value>, StashError> {
        let value = self.peek(task_id).await?;
        if value.is_some() {
            let key = Self::key_for(task_id);
            let mut conn = self.connection.clone();
            conn.del::<_, ()>(&key).await?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stash_key_shape() {
        let id = TaskId::from_string("abc-123");
        assert_eq!(ResultStash::key_for(&id), "orchestrator_result:abc-123");
    }
}
