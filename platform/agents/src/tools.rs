// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool routing over the vector index.
//!
//! Tool specs are vectorized into the `tools` collection on deploy; the
//! selection node retrieves candidates by similarity to the task
//! description rather than by exhaustive prompt listing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use citadel_core::domain::chunk::point_id;
use citadel_core::infrastructure::vector::VectorIndex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolCandidate {
    pub name: String,
    pub description: String,
    pub score: f32,
}

/// The built-in tool pack, vectorized on deployment so the selection node
/// can route by similarity from day one.
pub fn builtin_tools() -> Vec<ToolSpec> {
    let spec = |name: &str, description: &str| ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters: serde_json::json!({}),
    };
    vec![
        spec(
            "document_search",
            "Search the user's and global document collections by semantic similarity, \
             with optional category and tag filters and adjacent-chunk context",
        ),
        spec(
            "full_document_analysis",
            "Retrieve the full content of a small set of documents and answer a set of \
             questions against each, then synthesize the findings",
        ),
        spec(
            "fact_verification",
            "Extract checkable claims from a passage and cross-reference them against \
             web sources weighted by domain credibility",
        ),
        spec(
            "knowledge_synthesis",
            "Organize research findings into a cited markdown document with summary, \
             core findings, supporting evidence, and contradiction sections",
        ),
        spec(
            "manuscript_editing",
            "Apply typed edit operations to a manuscript chapter by chapter, with \
             anchor validation and position resolution",
        ),
    ]
}

pub struct ToolRegistry {
    gateway: Arc<dyn VectorIndex>,
    collection: String,
}

impl ToolRegistry {
    pub fn new(gateway: Arc<dyn VectorIndex>, collection: impl Into<String>) -> Self {
        Self {
            gateway,
            collection: collection.into(),
        }
    }

    /// Vectorize tool specs into the tools collection. Idempotent: the
    /// point id derives from the tool name.
    pub async fn deploy(&self, tools: &[ToolSpec]) -> anyhow::Result<usize> {
        let collection = self.collection.clone();
        for tool in tools {
            let text = format!("{}: {}", tool.name, tool.description);
            let payload = serde_json::json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            });
            self.gateway
                .index_text(&collection, point_id(&tool.name), &text, payload)
                .await?;
        }
        info!(count = tools.len(), "tools deployed to vector index");
        Ok(tools.len())
    }

    /// Retrieve candidate tools by similarity to the task description.
    pub async fn select_tools(&self, task: &str, k: u64) -> anyhow::Result<Vec<ToolCandidate>> {
        let hits = self.gateway.search_text(&self.collection, task, k).await?;
        Ok(hits
            .into_iter()
            .filter_map(|(_, score, payload)| {
                let get = |key: &str| payload.get(key)?.as_str().map(|s| s.to_string());
                Some(ToolCandidate {
                    name: get("name")?,
                    description: get("description").unwrap_or_default(),
                    score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citadel_core::infrastructure::memory::InMemoryVectorIndex;

    #[tokio::test]
    async fn deploy_then_select_routes_by_similarity() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let registry = ToolRegistry::new(index, "tools");

        let deployed = registry.deploy(&builtin_tools()).await.unwrap();
        assert_eq!(deployed, builtin_tools().len());

        let candidates = registry
            .select_tools("verify whether these claims hold up", 3)
            .await
            .unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().any(|c| c.name == "fact_verification"));
    }

    #[tokio::test]
    async fn redeploy_is_idempotent() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let registry = ToolRegistry::new(index, "tools");
        registry.deploy(&builtin_tools()).await.unwrap();
        registry.deploy(&builtin_tools()).await.unwrap();

        let candidates = registry.select_tools("search the documents", 20).await.unwrap();
        // Point ids derive from tool names, so redeploys never duplicate.
        assert!(candidates.len() <= builtin_tools().len());
    }
}
