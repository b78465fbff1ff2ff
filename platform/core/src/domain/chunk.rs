// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chunks and their deterministic vector-point identity.
//!
//! A chunk's point id is a pure function of its text, so re-embedding the
//! same content upserts the same point instead of duplicating it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::domain::document::DocumentId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub content: String,
    /// Hex sha-256 of the normalized content.
    pub content_hash: String,
    /// Extraction method tag (e.g. "native_text", "ocr").
    pub method: String,
    pub quality_score: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Chunk {
    pub fn new(document_id: DocumentId, chunk_index: usize, content: impl Into<String>, method: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = normalized_content_hash(&content);
        Self {
            chunk_id: format!("{}_{}", document_id, chunk_index),
            document_id,
            chunk_index,
            content,
            content_hash,
            method: method.into(),
            quality_score: 1.0,
            metadata: HashMap::new(),
        }
    }

    pub fn point_id(&self) -> u64 {
        point_id(&self.content)
    }
}

/// Collapse whitespace and lowercase before hashing, so trivial formatting
/// differences dedup to the same chunk.
pub fn normalize_content(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

pub fn normalized_content_hash(content: &str) -> String {
    let normalized = normalize_content(content);
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Deterministic u64 point id: leading 8 bytes of the normalized content
/// hash, masked to 63 bits so it stays positive in every integer
/// representation downstream.
pub fn point_id(content: &str) -> u64 {
    let normalized = normalize_content(content);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) & (u64::MAX >> 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic() {
        let a = point_id("The quick brown fox");
        let b = point_id("The quick brown fox");
        assert_eq!(a, b);
        assert_ne!(a, point_id("A different chunk"));
    }

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(point_id("Hello   World"), point_id("hello world"));
        assert_eq!(
            normalized_content_hash("Hello\n\tWorld"),
            normalized_content_hash("hello world")
        );
    }

    #[test]
    fn point_id_is_positive_in_i64() {
        for text in ["a", "b", "c", "longer chunk text with more entropy"] {
            assert!(point_id(text) <= i64::MAX as u64);
        }
    }

    #[test]
    fn chunk_carries_derived_identity() {
        let doc = DocumentId::new();
        let chunk = Chunk::new(doc.clone(), 3, "Some content", "native_text");
        assert_eq!(chunk.chunk_id, format!("{}_3", doc));
        assert_eq!(chunk.point_id(), point_id("Some content"));
    }
}
