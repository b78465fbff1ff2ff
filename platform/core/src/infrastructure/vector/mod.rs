// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Vector Index Gateway
//!
//! User- and global-scoped Qdrant collections, idempotent chunk upsert,
//! merged cross-collection search, and payload patching.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** The only module that talks to the vector store
//!
//! Point ids are a function of chunk text (see [`crate::domain::chunk`]),
//! so re-ingest upserts instead of duplicating and "delete old then upsert"
//! is only needed to purge orphans from shrinking documents.

pub mod embedding;

use qdrant_client::qdrant::{
    value::Kind, Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, FieldCondition,
    Filter, Match, PointStruct, ScrollPointsBuilder, SearchPointsBuilder,
    SetPayloadPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::VectorSettings;
use crate::domain::chunk::Chunk;
use crate::domain::document::DocumentId;

pub use embedding::{EmbeddingProvider, HashEmbeddingProvider, HttpEmbeddingProvider};

/// Score multiplier applied to adjacent-chunk context hits.
const ADJACENT_SCORE_PENALTY: f32 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("vector store error: {0}")]
    Store(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl From<qdrant_client::QdrantError> for VectorStoreError {
    fn from(e: qdrant_client::QdrantError) -> Self {
        Self::Store(e.to_string())
    }
}

/// Document metadata echoed into point payloads so post-indexing filters
/// work without touching the relational store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPayloadMeta {
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub point_id: u64,
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: i64,
    pub score: f32,
    pub source_collection: String,
    pub is_adjacent: bool,
    pub document_category: Option<String>,
    pub document_filename: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: u64,
    pub score_threshold: f32,
    pub user_id: Option<String>,
    pub include_adjacent: bool,
    pub filter_category: Option<String>,
    pub filter_tags: Option<Vec<String>>,
}

/// The vector-store seam consumed by the document service, the watcher,
/// and the agent pipelines. [`VectorIndexGateway`] is the production
/// implementation; tests use the in-memory one.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn embed_and_store_chunks(
        &self,
        document_id: &DocumentId,
        chunks: &[Chunk],
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<usize, VectorStoreError>;

    async fn search_similar(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, VectorStoreError>;

    async fn delete_document_chunks(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
    ) -> Result<(), VectorStoreError>;

    async fn delete_user_collection(&self, user_id: &str) -> Result<(), VectorStoreError>;

    async fn patch_document_payload(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<(), VectorStoreError>;

    async fn index_text(
        &self,
        collection: &str,
        id: u64,
        text: &str,
        payload: serde_json::Value,
    ) -> Result<(), VectorStoreError>;

    async fn search_text(
        &self,
        collection: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<(u64, f32, serde_json::Value)>, VectorStoreError>;
}

pub struct VectorIndexGateway {
    client: Qdrant,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: VectorSettings,
}

impl VectorIndexGateway {
    pub async fn connect(
        settings: VectorSettings,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(&settings.url)
            .timeout(settings.storage_batch_timeout)
            .build()?;
        Ok(Self {
            client,
            embedder,
            settings,
        })
    }

    pub fn user_collection_name(user_id: &str) -> String {
        format!("user_{user_id}_documents")
    }

    fn collection_for(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(uid) => Self::user_collection_name(uid),
            None => self.settings.global_collection.clone(),
        }
    }

    pub fn tools_collection(&self) -> &str {
        &self.settings.tools_collection
    }

    async fn ensure_collection(&self, name: &str) -> Result<(), VectorStoreError> {
        if self.client.collection_exists(name).await? {
            return Ok(());
        }
        info!(collection = name, "creating vector collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                    self.settings.vector_dimension,
                    Distance::Cosine,
                )),
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Embed chunks and upsert them. Chunks are deduplicated by normalized
    /// content hash first; point payloads carry every key consumers filter
    /// on, including the document metadata when supplied.
    pub async fn embed_and_store_chunks(
        &self,
        document_id: &DocumentId,
        chunks: &[Chunk],
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<usize, VectorStoreError> {
        let mut seen = HashSet::new();
        let unique: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| !c.content.trim().is_empty() && seen.insert(c.content_hash.clone()))
            .collect();
        if unique.is_empty() {
            return Ok(0);
        }

        let collection = self.collection_for(user_id);
        self.ensure_collection(&collection).await?;

        let texts: Vec<String> = unique.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let mut points = Vec::with_capacity(unique.len());
        for (chunk, vector) in unique.iter().zip(vectors) {
            let mut payload = serde_json::json!({
                "chunk_id": chunk.chunk_id,
                "document_id": document_id.to_string(),
                "content": chunk.content,
                "chunk_index": chunk.chunk_index as i64,
                "quality_score": chunk.quality_score,
                "method": chunk.method,
                "metadata": chunk.metadata,
                "content_hash": chunk.content_hash,
                "user_id": user_id,
            });
            let map = payload.as_object_mut().expect("payload is an object");
            if let Some(category) = &meta.category {
                map.insert("document_category".into(), category.clone().into());
            }
            if let Some(tags) = &meta.tags {
                map.insert("document_tags".into(), tags.clone().into());
            }
            if let Some(title) = &meta.title {
                map.insert("document_title".into(), title.clone().into());
            }
            if let Some(author) = &meta.author {
                map.insert("document_author".into(), author.clone().into());
            }
            if let Some(filename) = &meta.filename {
                map.insert("document_filename".into(), filename.clone().into());
            }

            let payload: Payload = Payload::try_from(payload)
                .map_err(|e| VectorStoreError::Validation(e.to_string()))?;
            points.push(PointStruct::new(chunk.point_id(), vector, payload));
        }

        let stored = points.len();
        self.upsert_batched(&collection, points).await?;
        info!(
            document_id = %document_id,
            collection = %collection,
            points = stored,
            "stored embeddings"
        );
        Ok(stored)
    }

    async fn upsert_batched(
        &self,
        collection: &str,
        points: Vec<PointStruct>,
    ) -> Result<(), VectorStoreError> {
        let batch_size = self.settings.storage_batch_size.max(1);
        for batch in points.chunks(batch_size) {
            let mut attempt = 0;
            loop {
                let upsert = self.client.upsert_points(
                    qdrant_client::qdrant::UpsertPointsBuilder::new(collection, batch.to_vec()),
                );
                match tokio::time::timeout(self.settings.storage_batch_timeout, upsert).await {
                    Ok(Ok(_)) => break,
                    Ok(Err(e)) => {
                        attempt += 1;
                        if attempt > self.settings.storage_max_retries {
                            return Err(VectorStoreError::Store(e.to_string()));
                        }
                        let wait = Duration::from_millis(500 * (1 << attempt.min(6)));
                        warn!(attempt, error = %e, "upsert batch failed, retrying");
                        tokio::time::sleep(wait).await;
                    }
                    Err(_) => {
                        attempt += 1;
                        if attempt > self.settings.storage_max_retries {
                            return Err(VectorStoreError::Timeout(self.settings.storage_batch_timeout));
                        }
                        warn!(attempt, "upsert batch timed out, retrying");
                    }
                }
            }
            tokio::time::sleep(self.settings.storage_batch_delay).await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Similarity search. With a user id, the user and global collections
    /// are queried in parallel and merged by point id, preferring the
    /// higher score; every hit is annotated with its source collection.
    pub async fn search_similar(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            VectorStoreError::Embedding("no embedding returned for query".to_string())
        })?;

        let filter = build_filter(options);
        let mut hits = match &options.user_id {
            Some(uid) => {
                let user_collection = Self::user_collection_name(uid);
                let global_collection = self.settings.global_collection.clone();
                let (user_hits, global_hits) = tokio::join!(
                    self.search_collection(&user_collection, vector.clone(), options, filter.clone()),
                    self.search_collection(&global_collection, vector.clone(), options, filter.clone()),
                );
                merge_hits(user_hits?, global_hits?)
            }
            None => {
                self.search_collection(
                    &self.settings.global_collection.clone(),
                    vector,
                    options,
                    filter,
                )
                .await?
            }
        };

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(options.limit as usize);

        if options.include_adjacent {
            let adjacent = self.fetch_adjacent(&hits).await?;
            let known: HashSet<u64> = hits.iter().map(|h| h.point_id).collect();
            hits.extend(adjacent.into_iter().filter(|h| !known.contains(&h.point_id)));
        }

        Ok(hits)
    }

    async fn search_collection(
        &self,
        collection: &str,
        vector: Vec<f32>,
        options: &SearchOptions,
        filter: Option<Filter>,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        if !self.client.collection_exists(collection).await? {
            debug!(collection, "collection does not exist, skipping");
            return Ok(Vec::new());
        }

        let mut builder = SearchPointsBuilder::new(collection, vector, options.limit)
            .with_payload(true)
            .score_threshold(options.score_threshold);
        if let Some(filter) = filter {
            builder = builder.filter(filter);
        }

        let response = self.client.search_points(builder).await?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let id = point_id_num(point.id.as_ref())?;
                Some(hit_from_payload(id, point.score, &point.payload, collection, false))
            })
            .collect())
    }

    /// Look up chunks at `chunk_index ± 1` of each hit's document and
    /// append them with a score penalty and an adjacency marker.
    async fn fetch_adjacent(&self, hits: &[SearchHit]) -> Result<Vec<SearchHit>, VectorStoreError> {
        let mut adjacent = Vec::new();
        for hit in hits {
            for index in [hit.chunk_index - 1, hit.chunk_index + 1] {
                if index < 0 {
                    continue;
                }
                let filter = Filter::must([
                    Condition::matches("document_id", hit.document_id.clone()),
                    Condition::matches("chunk_index", index),
                ]);
                let response = self
                    .client
                    .scroll(
                        ScrollPointsBuilder::new(hit.source_collection.clone())
                            .filter(filter)
                            .limit(1)
                            .with_payload(true),
                    )
                    .await?;
                for point in response.result {
                    if let Some(id) = point_id_num(point.id.as_ref()) {
                        adjacent.push(hit_from_payload(
                            id,
                            hit.score * ADJACENT_SCORE_PENALTY,
                            &point.payload,
                            &hit.source_collection,
                            true,
                        ));
                    }
                }
            }
        }
        Ok(adjacent)
    }

    // ------------------------------------------------------------------
    // Deletion & patching
    // ------------------------------------------------------------------

    pub async fn delete_document_chunks(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        let collection = self.collection_for(user_id);
        if !self.client.collection_exists(&collection).await? {
            debug!(collection = %collection, "collection missing, nothing to delete");
            return Ok(());
        }
        self.client
            .delete_points(
                DeletePointsBuilder::new(collection.clone()).points(Filter::must([
                    Condition::matches("document_id", document_id.to_string()),
                ])),
            )
            .await?;
        info!(document_id = %document_id, collection = %collection, "deleted document points");
        Ok(())
    }

    /// Account-deletion flow: drop the user's whole collection.
    pub async fn delete_user_collection(&self, user_id: &str) -> Result<(), VectorStoreError> {
        let collection = Self::user_collection_name(user_id);
        if self.client.collection_exists(&collection).await? {
            self.client.delete_collection(&collection).await?;
            info!(collection = %collection, "deleted user collection");
        }
        Ok(())
    }

    /// Patch document metadata across all points of a document so the
    /// vector path reports current metadata without re-embedding.
    pub async fn patch_document_payload(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<(), VectorStoreError> {
        let collection = self.collection_for(user_id);
        if !self.client.collection_exists(&collection).await? {
            return Ok(());
        }

        let mut patch = serde_json::Map::new();
        if let Some(category) = &meta.category {
            patch.insert("document_category".into(), category.clone().into());
        }
        if let Some(tags) = &meta.tags {
            patch.insert("document_tags".into(), tags.clone().into());
        }
        if let Some(title) = &meta.title {
            patch.insert("document_title".into(), title.clone().into());
        }
        if let Some(author) = &meta.author {
            patch.insert("document_author".into(), author.clone().into());
        }
        if let Some(filename) = &meta.filename {
            patch.insert("document_filename".into(), filename.clone().into());
        }
        if patch.is_empty() {
            return Ok(());
        }

        let payload: Payload = Payload::try_from(serde_json::Value::Object(patch))
            .map_err(|e| VectorStoreError::Validation(e.to_string()))?;
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(collection, payload).points_selector(Filter::must([
                    Condition::matches("document_id", document_id.to_string()),
                ])),
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Generic text indexing (tool routing)
    // ------------------------------------------------------------------

    /// Index a single free-standing text into an arbitrary collection.
    pub async fn index_text(
        &self,
        collection: &str,
        id: u64,
        text: &str,
        payload: serde_json::Value,
    ) -> Result<(), VectorStoreError> {
        self.ensure_collection(collection).await?;
        let vectors = self.embedder.embed(&[text.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            VectorStoreError::Embedding("no embedding returned".to_string())
        })?;
        let payload: Payload =
            Payload::try_from(payload).map_err(|e| VectorStoreError::Validation(e.to_string()))?;
        self.client
            .upsert_points(qdrant_client::qdrant::UpsertPointsBuilder::new(
                collection,
                vec![PointStruct::new(id, vector, payload)],
            ))
            .await?;
        Ok(())
    }

    /// Plain similarity lookup in one collection. Payloads come back as
    /// plain JSON so callers stay decoupled from the store's value types.
    pub async fn search_text(
        &self,
        collection: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<(u64, f32, serde_json::Value)>, VectorStoreError> {
        if !self.client.collection_exists(collection).await? {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            VectorStoreError::Embedding("no embedding returned".to_string())
        })?;
        let response = self
            .client
            .search_points(SearchPointsBuilder::new(collection, vector, limit).with_payload(true))
            .await?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|p| {
                point_id_num(p.id.as_ref()).map(|id| (id, p.score, payload_to_json(&p.payload)))
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl VectorIndex for VectorIndexGateway {
    async fn embed_and_store_chunks(
        &self,
        document_id: &DocumentId,
        chunks: &[Chunk],
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<usize, VectorStoreError> {
        VectorIndexGateway::embed_and_store_chunks(self, document_id, chunks, user_id, meta).await
    }

    async fn search_similar(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        VectorIndexGateway::search_similar(self, query, options).await
    }

    async fn delete_document_chunks(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        VectorIndexGateway::delete_document_chunks(self, document_id, user_id).await
    }

    async fn delete_user_collection(&self, user_id: &str) -> Result<(), VectorStoreError> {
        VectorIndexGateway::delete_user_collection(self, user_id).await
    }

    async fn patch_document_payload(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<(), VectorStoreError> {
        VectorIndexGateway::patch_document_payload(self, document_id, user_id, meta).await
    }

    async fn index_text(
        &self,
        collection: &str,
        id: u64,
        text: &str,
        payload: serde_json::Value,
    ) -> Result<(), VectorStoreError> {
        VectorIndexGateway::index_text(self, collection, id, text, payload).await
    }

    async fn search_text(
        &self,
        collection: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<(u64, f32, serde_json::Value)>, VectorStoreError> {
        VectorIndexGateway::search_text(self, collection, query, limit).await
    }
}

// ============================================================================
// Payload plumbing
// ============================================================================

fn point_id_num(id: Option<&qdrant_client::qdrant::PointId>) -> Option<u64> {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id?.point_id_options.as_ref()? {
        PointIdOptions::Num(n) => Some(*n),
        PointIdOptions::Uuid(_) => None,
    }
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value.kind.as_ref() {
        None => serde_json::Value::Null,
        Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::from(*i),
        Some(Kind::DoubleValue(d)) => {
            serde_json::Number::from_f64(*d).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
        }
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(map)) => serde_json::Value::Object(
            map.fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

fn payload_to_json(payload: &HashMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(
        payload
            .iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect(),
    )
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        Kind::DoubleValue(d) => Some(*d as i64),
        _ => None,
    }
}

fn hit_from_payload(
    point_id: u64,
    score: f32,
    payload: &HashMap<String, Value>,
    collection: &str,
    is_adjacent: bool,
) -> SearchHit {
    SearchHit {
        point_id,
        chunk_id: payload_str(payload, "chunk_id").unwrap_or_default(),
        document_id: payload_str(payload, "document_id").unwrap_or_default(),
        content: payload_str(payload, "content").unwrap_or_default(),
        chunk_index: payload_i64(payload, "chunk_index").unwrap_or(0),
        score,
        source_collection: collection.to_string(),
        is_adjacent,
        document_category: payload_str(payload, "document_category"),
        document_filename: payload_str(payload, "document_filename"),
    }
}

/// Merge hits from two collections by point id, preferring the higher
/// score on collision.
fn merge_hits(a: Vec<SearchHit>, b: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut merged: HashMap<u64, SearchHit> = HashMap::new();
    for hit in a.into_iter().chain(b) {
        match merged.get(&hit.point_id) {
            Some(existing) if existing.score >= hit.score => {}
            _ => {
                merged.insert(hit.point_id, hit);
            }
        }
    }
    merged.into_values().collect()
}

fn build_filter(options: &SearchOptions) -> Option<Filter> {
    let mut conditions = Vec::new();
    if let Some(category) = &options.filter_category {
        conditions.push(Condition::matches("document_category", category.clone()));
    }
    if let Some(tags) = &options.filter_tags {
        if !tags.is_empty() {
            conditions.push(Condition {
                condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
                    FieldCondition {
                        key: "document_tags".to_string(),
                        r#match: Some(Match {
                            match_value: Some(qdrant_client::qdrant::r#match::MatchValue::Keywords(
                                qdrant_client::qdrant::RepeatedStrings {
                                    strings: tags.clone(),
                                },
                            )),
                        }),
                        ..Default::default()
                    },
                )),
            });
        }
    }
    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(point_id: u64, score: f32, collection: &str) -> SearchHit {
        SearchHit {
            point_id,
            chunk_id: format!("c{point_id}"),
            document_id: "d".to_string(),
            content: String::new(),
            chunk_index: 0,
            score,
            source_collection: collection.to_string(),
            is_adjacent: false,
            document_category: None,
            document_filename: None,
        }
    }

    #[test]
    fn merge_prefers_higher_score_on_collision() {
        let merged = merge_hits(
            vec![hit(1, 0.9, "user_a_documents"), hit(2, 0.5, "user_a_documents")],
            vec![hit(1, 0.7, "citadel_documents"), hit(3, 0.6, "citadel_documents")],
        );
        assert_eq!(merged.len(), 3);
        let one = merged.iter().find(|h| h.point_id == 1).unwrap();
        assert_eq!(one.score, 0.9);
        assert_eq!(one.source_collection, "user_a_documents");
    }

    #[test]
    fn user_collection_naming() {
        assert_eq!(
            VectorIndexGateway::user_collection_name("42"),
            "user_42_documents"
        );
    }

    #[test]
    fn filter_built_only_when_needed() {
        let options = SearchOptions::default();
        assert!(build_filter(&options).is_none());

        let options = SearchOptions {
            filter_category: Some("constitutional".to_string()),
            filter_tags: Some(vec!["liberty".to_string()]),
            ..Default::default()
        };
        let filter = build_filter(&options).unwrap();
        assert_eq!(filter.must.len(), 2);
    }
}
