// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding provider abstraction and the HTTP batch client.
//!
//! Inputs are validated and whitespace-trimmed before the call; empty texts
//! are a validation error, never sent over the wire. Rate-limit responses
//! honour the server's recommended wait when present and otherwise back off
//! exponentially with a 5-second floor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::VectorStoreError;

/// Minimum wait after a rate-limit response, regardless of backoff state.
pub const RATE_LIMIT_FLOOR: Duration = Duration::from_secs(5);

const MAX_EMBED_RETRIES: u32 = 5;
const BACKOFF_CAP: Duration = Duration::from_secs(60);

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of already-validated texts. One vector per input, in
    /// input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError>;

    fn dimension(&self) -> u64;
}

/// Trim inputs and reject empties. Returns the cleaned batch.
pub fn validate_texts(texts: &[String]) -> Result<Vec<String>, VectorStoreError> {
    let mut cleaned = Vec::with_capacity(texts.len());
    for text in texts {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(VectorStoreError::Validation(
                "cannot embed empty text".to_string(),
            ));
        }
        cleaned.push(trimmed.to_string());
    }
    Ok(cleaned)
}

/// Wait to apply after a rate-limit response: the server's recommendation
/// when advertised, otherwise capped exponential backoff, and never less
/// than the floor.
pub fn rate_limit_wait(retry_after: Option<Duration>, attempt: u32) -> Duration {
    let backoff = Duration::from_secs(1 << attempt.min(6)).min(BACKOFF_CAP);
    let wait = retry_after.unwrap_or(backoff);
    wait.max(RATE_LIMIT_FLOOR)
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    batch_size: usize,
    dimension: u64,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: impl Into<String>, batch_size: usize, dimension: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            batch_size: batch_size.max(1),
            dimension,
        }
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        for attempt in 0..MAX_EMBED_RETRIES {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&EmbedRequest { texts: batch })
                .timeout(Duration::from_secs(120))
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbedResponse = response
                        .json()
                        .await
                        .map_err(|e| VectorStoreError::Embedding(e.to_string()))?;
                    if parsed.embeddings.len() != batch.len() {
                        return Err(VectorStoreError::Embedding(format!(
                            "embedding count mismatch: sent {}, got {}",
                            batch.len(),
                            parsed.embeddings.len()
                        )));
                    }
                    return Ok(parsed.embeddings);
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let wait = rate_limit_wait(retry_after, attempt);
                    warn!(
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "embedding provider rate limited"
                    );
                    tokio::time::sleep(wait).await;
                }
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt + 1 < MAX_EMBED_RETRIES {
                        let wait = Duration::from_secs(1 << attempt.min(6)).min(BACKOFF_CAP);
                        warn!(status = %status, wait_secs = wait.as_secs(), "embedding request failed, retrying");
                        tokio::time::sleep(wait).await;
                    } else {
                        return Err(VectorStoreError::Embedding(format!(
                            "embedding request failed with status {status}"
                        )));
                    }
                }
                Err(e) if attempt + 1 < MAX_EMBED_RETRIES => {
                    let wait = Duration::from_secs(1 << attempt.min(6)).min(BACKOFF_CAP);
                    warn!(error = %e, wait_secs = wait.as_secs(), "embedding request error, retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(VectorStoreError::Embedding(e.to_string())),
            }
        }
        Err(VectorStoreError::Embedding(
            "embedding retries exhausted".to_string(),
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        let cleaned = validate_texts(texts)?;
        let mut all = Vec::with_capacity(cleaned.len());
        for batch in cleaned.chunks(self.batch_size) {
            all.extend(self.embed_batch(batch).await?);
        }
        Ok(all)
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }
}

/// Deterministic hash-projection embedder for tests and offline runs.
/// Identical text always produces an identical vector.
pub struct HashEmbeddingProvider {
    dimension: u64,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: u64) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, VectorStoreError> {
        let cleaned = validate_texts(texts)?;
        Ok(cleaned
            .iter()
            .map(|text| {
                use sha2::{Digest, Sha256};
                let digest = Sha256::digest(text.as_bytes());
                (0..self.dimension as usize)
                    .map(|i| {
                        let byte = digest[i % digest.len()];
                        let bit = (byte >> (i % 8)) & 1;
                        if bit == 1 {
                            1.0
                        } else {
                            -1.0
                        }
                    })
                    .collect()
            })
            .collect())
    }

    fn dimension(&self) -> u64 {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_wait_has_floor() {
        assert_eq!(rate_limit_wait(None, 0), RATE_LIMIT_FLOOR);
        assert_eq!(rate_limit_wait(Some(Duration::from_secs(1)), 0), RATE_LIMIT_FLOOR);
        assert_eq!(
            rate_limit_wait(Some(Duration::from_secs(30)), 0),
            Duration::from_secs(30)
        );
        // Later attempts exceed the floor through backoff alone.
        assert_eq!(rate_limit_wait(None, 4), Duration::from_secs(16));
    }

    #[test]
    fn validation_rejects_empty_and_trims() {
        assert!(validate_texts(&["   ".to_string()]).is_err());
        let cleaned = validate_texts(&["  hello  ".to_string()]).unwrap();
        assert_eq!(cleaned, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic() {
        let embedder = HashEmbeddingProvider::new(64);
        let a = embedder.embed(&["same text".to_string()]).await.unwrap();
        let b = embedder.embed(&["same text".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
    }
}
