// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Full document analysis: a small set of documents crossed with a small
//! set of queries, each pair analyzed in parallel, then synthesized.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::llm::LlmClient;
use crate::subgraphs::retrieval::ContentFetcher;

pub const MAX_DOCUMENTS: usize = 2;
pub const MAX_QUERIES: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCell {
    pub document_id: String,
    pub query: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub cells: Vec<AnalysisCell>,
    pub synthesis: String,
}

pub struct DocumentAnalyzer {
    fetcher: Arc<dyn ContentFetcher>,
    llm: Arc<dyn LlmClient>,
}

impl DocumentAnalyzer {
    pub fn new(fetcher: Arc<dyn ContentFetcher>, llm: Arc<dyn LlmClient>) -> Self {
        Self { fetcher, llm }
    }

    /// Analyze up to [`MAX_DOCUMENTS`] documents against up to
    /// [`MAX_QUERIES`] queries. Oversized inputs are trimmed, not
    /// rejected; the caps bound the docs × queries prompt fan-out.
    pub async fn analyze(
        &self,
        document_ids: &[String],
        queries: &[String],
    ) -> anyhow::Result<AnalysisOutput> {
        let document_ids: Vec<&String> = document_ids.iter().take(MAX_DOCUMENTS).collect();
        let queries: Vec<&String> = queries.iter().take(MAX_QUERIES).collect();

        // Full content up front, once per document.
        let mut contents = Vec::with_capacity(document_ids.len());
        for id in &document_ids {
            match self.fetcher.full_content(id).await? {
                Some(content) => contents.push((id.to_string(), content)),
                None => warn!(document_id = %id, "document has no retrievable content"),
            }
        }

        // docs × queries prompts, in parallel.
        let tasks = contents.iter().flat_map(|(id, content)| {
            queries.iter().map(move |query| {
                let llm = self.llm.clone();
                let id = id.clone();
                let query = (*query).clone();
                let prompt = format!(
                    "Answer the question strictly from the document below.\n\
                     Question: {query}\n\nDocument:\n{content}"
                );
                async move {
                    match llm.complete(&prompt).await {
                        Ok(answer) => Some(AnalysisCell {
                            document_id: id,
                            query,
                            answer,
                        }),
                        Err(e) => {
                            warn!(document_id = %id, error = %e, "analysis cell failed");
                            None
                        }
                    }
                }
            })
        });
        let cells: Vec<AnalysisCell> = join_all(tasks).await.into_iter().flatten().collect();

        // Synthesis over the grid.
        let grid = cells
            .iter()
            .map(|c| format!("[{} / {}]\n{}", c.document_id, c.query, c.answer))
            .collect::<Vec<_>>()
            .join("\n\n");
        let synthesis = self
            .llm
            .complete(&format!(
                "Synthesize a single coherent answer from these per-document findings:\n\n{grid}"
            ))
            .await?;

        Ok(AnalysisOutput { cells, synthesis })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use std::collections::HashMap;

    struct MapFetcher(HashMap<String, String>);

    #[async_trait::async_trait]
    impl ContentFetcher for MapFetcher {
        async fn full_content(&self, id: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.get(id).cloned())
        }
        async fn document_size(&self, id: &str) -> anyhow::Result<Option<i64>> {
            Ok(self.0.get(id).map(|c| c.len() as i64))
        }
    }

    #[tokio::test]
    async fn grid_is_capped_and_synthesized() {
        let mut docs = HashMap::new();
        docs.insert("d1".to_string(), "Document one text".to_string());
        docs.insert("d2".to_string(), "Document two text".to_string());
        docs.insert("d3".to_string(), "Should be trimmed".to_string());

        // 2 docs × 2 queries = 4 cell answers, then 1 synthesis.
        let llm = Arc::new(ScriptedLlm::new(["a1", "a2", "a3", "a4", "final synthesis"]));
        let analyzer = DocumentAnalyzer::new(Arc::new(MapFetcher(docs)), llm);

        let ids = vec!["d1".to_string(), "d2".to_string(), "d3".to_string()];
        let queries = vec!["q1".to_string(), "q2".to_string()];
        let output = analyzer.analyze(&ids, &queries).await.unwrap();

        assert_eq!(output.cells.len(), 4);
        assert_eq!(output.synthesis, "final synthesis");
        assert!(output.cells.iter().all(|c| c.document_id != "d3"));
    }
}
