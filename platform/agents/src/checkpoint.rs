// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Checkpoint persistence for subgraph executions, keyed by
//! (thread id, step).

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::State;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub step: u64,
    /// Node that had just finished when this snapshot was taken.
    pub node: String,
    pub state: State,
}

#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> anyhow::Result<()>;

    async fn latest(&self, thread_id: &str) -> anyhow::Result<Option<Checkpoint>>;

    async fn get(&self, thread_id: &str, step: u64) -> anyhow::Result<Option<Checkpoint>>;
}

#[derive(Default)]
pub struct InMemoryCheckpointer {
    threads: DashMap<String, BTreeMap<u64, Checkpoint>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, checkpoint: Checkpoint) -> anyhow::Result<()> {
        self.threads
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .insert(checkpoint.step, checkpoint);
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> anyhow::Result<Option<Checkpoint>> {
        Ok(self
            .threads
            .get(thread_id)
            .and_then(|steps| steps.values().next_back().cloned()))
    }

    async fn get(&self, thread_id: &str, step: u64) -> anyhow::Result<Option<Checkpoint>> {
        Ok(self
            .threads
            .get(thread_id)
            .and_then(|steps| steps.get(&step).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_returns_highest_step() {
        let store = InMemoryCheckpointer::new();
        for step in [1u64, 3, 2] {
            store
                .save(Checkpoint {
                    thread_id: "t".to_string(),
                    step,
                    node: format!("n{step}"),
                    state: State::new(),
                })
                .await
                .unwrap();
        }
        let latest = store.latest("t").await.unwrap().unwrap();
        assert_eq!(latest.step, 3);
        assert!(store.latest("other").await.unwrap().is_none());
        assert_eq!(store.get("t", 2).await.unwrap().unwrap().node, "n2");
    }
}
