// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Subgraph Runtime
//!
//! A compiled state machine over a shared JSON state. Nodes are async
//! functions `State → StatePatch`; the runtime merges each patch and
//! follows edges until the `END` sentinel. Conditional edges are pure
//! predicates over the merged state — they must not inspect side effects.
//!
//! Subgraphs are compiled once (validating the entry node and every
//! direct-edge target) and invoked many times, each invocation under its
//! own thread id for checkpointing.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::checkpoint::{Checkpoint, Checkpointer};

pub const END: &str = "__end__";

/// Guard against graphs that never reach `END`.
const MAX_STEPS: u64 = 200;

pub type State = serde_json::Map<String, serde_json::Value>;
pub type StatePatch = serde_json::Map<String, serde_json::Value>;

pub type NodeFn =
    Arc<dyn Fn(State) -> BoxFuture<'static, anyhow::Result<StatePatch>> + Send + Sync>;
pub type EdgePredicate = Arc<dyn Fn(&State) -> String + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("subgraph '{0}' has no entry node")]
    NoEntry(String),

    #[error("entry node '{0}' is not defined")]
    EntryNotFound(String),

    #[error("edge from '{from}' targets undefined node '{target}'")]
    EdgeTargetNotFound { from: String, target: String },

    #[error("node '{0}' is not defined")]
    NodeNotFound(String),

    #[error("subgraph exceeded {0} steps without reaching END")]
    StepLimit(u64),
}

enum Edge {
    Direct(String),
    Conditional(EdgePredicate),
}

pub struct SubgraphBuilder {
    name: String,
    nodes: HashMap<String, NodeFn>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
}

impl SubgraphBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
        }
    }

    pub fn add_node<F>(mut self, name: impl Into<String>, node: F) -> Self
    where
        F: Fn(State) -> BoxFuture<'static, anyhow::Result<StatePatch>> + Send + Sync + 'static,
    {
        self.nodes.insert(name.into(), Arc::new(node));
        self
    }

    /// Unconditional edge `from → to`. `END` is always a valid target.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    /// Conditional edge: the predicate maps the merged state to the next
    /// node name (or `END`).
    pub fn add_conditional_edge<F>(mut self, from: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&State) -> String + Send + Sync + 'static,
    {
        self.edges
            .insert(from.into(), Edge::Conditional(Arc::new(predicate)));
        self
    }

    pub fn set_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    /// Validate and freeze the graph.
    pub fn compile(self) -> Result<Subgraph, GraphError> {
        let entry = self
            .entry
            .ok_or_else(|| GraphError::NoEntry(self.name.clone()))?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::EntryNotFound(entry));
        }
        for (from, edge) in &self.edges {
            if let Edge::Direct(target) = edge {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(GraphError::EdgeTargetNotFound {
                        from: from.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(Subgraph {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
            entry,
            checkpointer: None,
        })
    }
}

pub struct Subgraph {
    name: String,
    nodes: HashMap<String, NodeFn>,
    edges: HashMap<String, Edge>,
    entry: String,
    checkpointer: Option<Arc<dyn Checkpointer>>,
}

impl Subgraph {
    pub fn with_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run to `END`, resuming from the thread's last snapshot when one
    /// exists.
    pub async fn invoke(&self, initial: State, thread_id: &str) -> anyhow::Result<State> {
        let (mut state, mut step, mut current) = match &self.checkpointer {
            Some(checkpointer) => match checkpointer.latest(thread_id).await? {
                Some(snapshot) => {
                    let next = self.next_after(&snapshot.node, &snapshot.state)?;
                    debug!(
                        subgraph = %self.name,
                        thread = thread_id,
                        resumed_at = snapshot.step,
                        "resuming from checkpoint"
                    );
                    match next {
                        Some(node) => (snapshot.state, snapshot.step, node),
                        // The previous run already finished.
                        None => return Ok(snapshot.state),
                    }
                }
                None => (initial, 0, self.entry.clone()),
            },
            None => (initial, 0, self.entry.clone()),
        };

        loop {
            if step >= MAX_STEPS {
                return Err(GraphError::StepLimit(MAX_STEPS).into());
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::NodeNotFound(current.clone()))?;

            let patch = node(state.clone()).await?;
            for (key, value) in patch {
                state.insert(key, value);
            }
            step += 1;

            if let Some(checkpointer) = &self.checkpointer {
                checkpointer
                    .save(Checkpoint {
                        thread_id: thread_id.to_string(),
                        step,
                        node: current.clone(),
                        state: state.clone(),
                    })
                    .await?;
            }

            match self.next_after(&current, &state)? {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(state)
    }

    /// The node following `node` for this state, `None` at `END` or when
    /// no outgoing edge exists (implicit END).
    fn next_after(&self, node: &str, state: &State) -> Result<Option<String>, GraphError> {
        let Some(edge) = self.edges.get(node) else {
            return Ok(None);
        };
        let target = match edge {
            Edge::Direct(target) => target.clone(),
            Edge::Conditional(predicate) => predicate(state),
        };
        if target == END {
            return Ok(None);
        }
        if !self.nodes.contains_key(&target) {
            return Err(GraphError::EdgeTargetNotFound {
                from: node.to_string(),
                target,
            });
        }
        Ok(Some(target))
    }
}

/// Convenience for building node patches.
pub fn patch(entries: &[(&str, serde_json::Value)]) -> StatePatch {
    let mut map = StatePatch::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value.clone());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointer;
    use serde_json::json;

    fn counter_graph() -> Subgraph {
        SubgraphBuilder::new("counter")
            .add_node("bump", |state: State| {
                Box::pin(async move {
                    let n = state.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                    Ok(patch(&[("n", json!(n + 1))]))
                })
            })
            .add_conditional_edge("bump", |state: &State| {
                let n = state.get("n").and_then(|v| v.as_i64()).unwrap_or(0);
                if n >= 3 {
                    END.to_string()
                } else {
                    "bump".to_string()
                }
            })
            .set_entry("bump")
            .compile()
            .unwrap()
    }

    #[tokio::test]
    async fn conditional_loop_terminates_at_predicate() {
        let graph = counter_graph();
        let result = graph.invoke(State::new(), "t1").await.unwrap();
        assert_eq!(result.get("n"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn compile_rejects_missing_targets() {
        let err = SubgraphBuilder::new("bad")
            .add_node("a", |_s| Box::pin(async { Ok(StatePatch::new()) }))
            .add_edge("a", "missing")
            .set_entry("a")
            .compile();
        assert!(matches!(err, Err(GraphError::EdgeTargetNotFound { .. })));

        let err = SubgraphBuilder::new("bad2")
            .add_node("a", |_s| Box::pin(async { Ok(StatePatch::new()) }))
            .set_entry("nope")
            .compile();
        assert!(matches!(err, Err(GraphError::EntryNotFound(_))));
    }

    #[tokio::test]
    async fn patches_merge_without_clearing_state() {
        let graph = SubgraphBuilder::new("merge")
            .add_node("first", |_s| {
                Box::pin(async { Ok(patch(&[("a", json!(1))])) })
            })
            .add_node("second", |_s| {
                Box::pin(async { Ok(patch(&[("b", json!(2))])) })
            })
            .add_edge("first", "second")
            .add_edge("second", END)
            .set_entry("first")
            .compile()
            .unwrap();

        let result = graph.invoke(State::new(), "t").await.unwrap();
        assert_eq!(result.get("a"), Some(&json!(1)));
        assert_eq!(result.get("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn checkpoints_allow_resume() {
        let store = Arc::new(InMemoryCheckpointer::new());
        let graph = counter_graph().with_checkpointer(store.clone());

        let result = graph.invoke(State::new(), "thread-9").await.unwrap();
        assert_eq!(result.get("n"), Some(&json!(3)));

        // A finished thread replays to its final state without re-running.
        let replayed = graph.invoke(State::new(), "thread-9").await.unwrap();
        assert_eq!(replayed.get("n"), Some(&json!(3)));

        // Snapshots exist for each step.
        let latest = store.latest("thread-9").await.unwrap().unwrap();
        assert_eq!(latest.step, 3);
    }
}
