// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Intelligent document retrieval.
//!
//! Vector search with a recency boost (linear decay over 30 days, at most
//! +0.10), mode-dependent score thresholds, a per-document strategy
//! choice — full content for small documents, top chunks otherwise — an
//! LLM sufficiency check that may upgrade chunked documents to full
//! retrieval, and a formatted context string at the end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::{parse_json_block, LlmClient};
use citadel_core::infrastructure::vector::{SearchHit, SearchOptions, VectorIndex};

/// Documents smaller than this retrieve in full; larger ones by chunks.
pub const SMALL_DOC_THRESHOLD: i64 = 5000;

const MAX_RECENCY_BOOST: f64 = 0.10;
const RECENCY_WINDOW_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Permissive, for chat and quick lookups.
    Fast,
    /// Balanced, for research.
    Comprehensive,
    /// Precise, for targeted searches.
    Targeted,
}

impl RetrievalMode {
    pub fn score_threshold(&self) -> f32 {
        match self {
            Self::Fast => 0.3,
            Self::Comprehensive => 0.4,
            Self::Targeted => 0.5,
        }
    }
}

/// Per-document retrieval decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStrategy {
    FullContent,
    TopChunks,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub document_id: String,
    pub filename: Option<String>,
    pub score: f64,
    pub recency_boost: f64,
    pub strategy: ContentStrategy,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutput {
    pub documents: Vec<RetrievedDocument>,
    pub formatted_context: String,
}

/// Access to full document text and sizes; implemented over the upload
/// tree by the platform.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn full_content(&self, document_id: &str) -> anyhow::Result<Option<String>>;
    async fn document_size(&self, document_id: &str) -> anyhow::Result<Option<i64>>;
}

/// Recency boost: +0.10 for a document published right now, linearly
/// decaying to zero at thirty days, zero beyond.
pub fn recency_boost(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(published) = published else {
        return 0.0;
    };
    let days = (now - published).num_seconds() as f64 / 86_400.0;
    if !(0.0..=RECENCY_WINDOW_DAYS).contains(&days) {
        return 0.0;
    }
    MAX_RECENCY_BOOST * (1.0 - days / RECENCY_WINDOW_DAYS)
}

pub struct RetrievalPipeline {
    gateway: Arc<dyn VectorIndex>,
    fetcher: Arc<dyn ContentFetcher>,
    llm: Arc<dyn LlmClient>,
}

impl RetrievalPipeline {
    pub fn new(
        gateway: Arc<dyn VectorIndex>,
        fetcher: Arc<dyn ContentFetcher>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            gateway,
            fetcher,
            llm,
        }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        mode: RetrievalMode,
        user_id: Option<&str>,
        max_documents: usize,
        published_dates: &HashMap<String, DateTime<Utc>>,
    ) -> anyhow::Result<RetrievalOutput> {
        // 1. Vector search at the mode threshold.
        let hits = self
            .gateway
            .search_similar(
                query,
                &SearchOptions {
                    limit: (max_documents * 4) as u64,
                    score_threshold: mode.score_threshold(),
                    user_id: user_id.map(|u| u.to_string()),
                    include_adjacent: false,
                    filter_category: None,
                    filter_tags: None,
                },
            )
            .await?;

        // 2. Recency boost and per-document aggregation (best chunk wins).
        let now = Utc::now();
        let mut best: HashMap<String, (f64, f64, SearchHit)> = HashMap::new();
        for hit in hits {
            let boost = recency_boost(published_dates.get(&hit.document_id).copied(), now);
            let boosted = (hit.score as f64 + boost).min(1.0);
            match best.get(&hit.document_id) {
                Some((existing, _, _)) if *existing >= boosted => {}
                _ => {
                    best.insert(hit.document_id.clone(), (boosted, boost, hit));
                }
            }
        }
        let mut ranked: Vec<(f64, f64, SearchHit)> = best.into_values().collect();
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(max_documents);

        // 3. Strategy selection and content retrieval.
        let mut documents = Vec::with_capacity(ranked.len());
        for (score, boost, hit) in ranked {
            let size = self
                .fetcher
                .document_size(&hit.document_id)
                .await?
                .unwrap_or(i64::MAX);
            let (strategy, content) = if size < SMALL_DOC_THRESHOLD {
                match self.fetcher.full_content(&hit.document_id).await? {
                    Some(full) => (ContentStrategy::FullContent, full),
                    None => (ContentStrategy::TopChunks, hit.content.clone()),
                }
            } else {
                (ContentStrategy::TopChunks, hit.content.clone())
            };
            documents.push(RetrievedDocument {
                document_id: hit.document_id,
                filename: hit.document_filename,
                score,
                recency_boost: boost,
                strategy,
                content,
            });
        }

        // 4. LLM sufficiency check may upgrade chunked documents to full.
        self.upgrade_if_insufficient(query, &mut documents).await?;

        // 5. Final formatted context.
        let formatted_context = format_context(query, &documents);
        Ok(RetrievalOutput {
            documents,
            formatted_context,
        })
    }

    async fn upgrade_if_insufficient(
        &self,
        query: &str,
        documents: &mut [RetrievedDocument],
    ) -> anyhow::Result<()> {
        let chunked: Vec<&RetrievedDocument> = documents
            .iter()
            .filter(|d| d.strategy == ContentStrategy::TopChunks)
            .collect();
        if chunked.is_empty() {
            return Ok(());
        }

        let listing = chunked
            .iter()
            .map(|d| format!("- {}: {}", d.document_id, truncate(&d.content, 300)))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Query: {query}\n\nThese documents were retrieved as excerpts only:\n{listing}\n\n\
             Respond with JSON: {{\"upgrade\": [\"document ids that need full content\"]}}"
        );

        let response = self.llm.complete(&prompt).await?;
        let upgrades: Vec<String> = parse_json_block(&response)
            .and_then(|v| v.get("upgrade").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        for doc in documents.iter_mut() {
            if upgrades.contains(&doc.document_id) {
                if let Some(full) = self.fetcher.full_content(&doc.document_id).await? {
                    doc.strategy = ContentStrategy::FullContent;
                    doc.content = full;
                }
            }
        }
        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect::<String>() + "…"
    }
}

pub fn format_context(query: &str, documents: &[RetrievedDocument]) -> String {
    let mut out = format!("Retrieved context for: {query}\n");
    for (i, doc) in documents.iter().enumerate() {
        let name = doc.filename.as_deref().unwrap_or(&doc.document_id);
        let kind = match doc.strategy {
            ContentStrategy::FullContent => "full",
            ContentStrategy::TopChunks => "excerpt",
        };
        out.push_str(&format!(
            "\n--- Document {} ({name}, {kind}, score {:.2}) ---\n{}\n",
            i + 1,
            doc.score,
            doc.content
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;
    use citadel_core::domain::chunk::Chunk;
    use citadel_core::domain::document::DocumentId;
    use citadel_core::infrastructure::memory::InMemoryVectorIndex;
    use citadel_core::infrastructure::vector::DocumentPayloadMeta;

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
    async fn pipeline_retrieves_small_documents_in_full() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let doc_id = DocumentId::new();
        index
            .embed_and_store_chunks(
                &doc_id,
                &[Chunk::new(
                    doc_id.clone(),
                    0,
                    "consensus protocols and quorum systems",
                    "native_text",
                )],
                None,
                &DocumentPayloadMeta::default(),
            )
            .await
            .unwrap();

        let mut contents = HashMap::new();
        contents.insert(
            doc_id.to_string(),
            "The full text about consensus protocols.".to_string(),
        );

        // Sufficiency check is only consulted for chunked documents, so
        // one scripted response is plenty.
        let pipeline = RetrievalPipeline::new(
            index,
            Arc::new(MapFetcher(contents)),
            Arc::new(ScriptedLlm::new([r#"{"upgrade": []}"#])),
        );

        let output = pipeline
            .retrieve("consensus protocols", RetrievalMode::Fast, None, 5, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(output.documents.len(), 1);
        assert_eq!(output.documents[0].strategy, ContentStrategy::FullContent);
        assert!(output.formatted_context.contains("The full text about consensus protocols."));
    }

    #[test]
    fn mode_thresholds() {
        assert_eq!(RetrievalMode::Fast.score_threshold(), 0.3);
        assert_eq!(RetrievalMode::Comprehensive.score_threshold(), 0.4);
        assert_eq!(RetrievalMode::Targeted.score_threshold(), 0.5);
    }

    #[test]
    fn recency_boost_decays_linearly() {
        let now = Utc::now();
        let today = recency_boost(Some(now), now);
        assert!((today - 0.10).abs() < 1e-6);

        let fifteen = recency_boost(Some(now - chrono::Duration::days(15)), now);
        assert!((fifteen - 0.05).abs() < 1e-3);

        let old = recency_boost(Some(now - chrono::Duration::days(45)), now);
        assert_eq!(old, 0.0);

        assert_eq!(recency_boost(None, now), 0.0);
    }

    #[test]
    fn formatted_context_names_strategy() {
        let docs = vec![RetrievedDocument {
            document_id: "d1".to_string(),
            filename: Some("notes.md".to_string()),
            score: 0.88,
            recency_boost: 0.0,
            strategy: ContentStrategy::FullContent,
            content: "Body".to_string(),
        }];
        let context = format_context("q", &docs);
        assert!(context.contains("notes.md"));
        assert!(context.contains("full"));
        assert!(context.contains("Body"));
    }
}
