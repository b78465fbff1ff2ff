// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # citadel-agents
//!
//! Composable agent pipelines for the CITADEL platform. Agents are
//! directed graphs of asynchronous nodes over a shared state dictionary:
//! a node receives the current state and returns a patch, edges are
//! unconditional or predicated on the merged state, and a checkpoint store
//! persists snapshots per (thread, step) so replays resume from the last
//! snapshot.
//!
//! The canonical subgraphs — assessment, intelligent retrieval, full
//! document analysis, fact verification, knowledge-document synthesis, and
//! the fiction-editing family — preserve strict input/output contracts
//! because they call one another.

pub mod checkpoint;
pub mod graph;
pub mod llm;
pub mod subgraphs;
pub mod tools;

pub use checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer};
pub use graph::{Subgraph, SubgraphBuilder, END};
pub use llm::LlmClient;
