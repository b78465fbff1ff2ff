// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Document Service
//!
//! The upload → parse → embed → status pipeline and its lifecycle events.
//!
//! # Architecture
//!
//! - **Layer:** Application
//! - **Purpose:** Orchestrates the document ingestion triangle (metadata
//!   row, vector points, on-disk file)
//!
//! Ordering contract: for a single document the ingest → embed → complete
//! transitions are linear; no observer sees `completed` before the
//! corresponding embeddings are visible. On deletion the metadata row is
//! authoritative: earlier steps are best-effort and the reconciler repairs
//! whatever drifts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use text_splitter::TextSplitter;
use tracing::{error, info, warn};

use crate::application::folder_engine::FolderEngine;
use crate::application::paths::PathResolver;
use crate::application::pdf_classifier::{classify_pdf, PdfClass, PdfSignals};
use crate::domain::chunk::Chunk;
use crate::domain::document::{
    Document, DocumentId, DocumentType, DocumentUpdate, ProcessingStatus, Scope,
};
use crate::domain::events::PlatformEvent;
use crate::domain::folder::FolderId;
use crate::domain::repository::DocumentRepository;
use crate::infrastructure::crawler::{is_binary_url, Crawler};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::vector::{DocumentPayloadMeta, VectorIndex};

const CHUNK_MAX_CHARS: usize = 1000;

/// Outcome of an upload request.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Created {
        document_id: DocumentId,
        status: ProcessingStatus,
    },
    /// Content-hash dedup hit; the existing document is surfaced, nothing
    /// is re-ingested.
    Duplicate {
        existing_id: DocumentId,
        message: String,
    },
}

/// Extraction result from a content processor.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub text: String,
    pub page_count: Option<i32>,
    pub pdf_signals: Option<PdfSignals>,
}

/// Turns bytes on disk into text. Parsing internals for exotic formats are
/// pluggable; the default handles the text-bearing formats in-process.
#[async_trait]
pub trait ContentProcessor: Send + Sync {
    async fn extract(&self, path: &Path, doc_type: DocumentType) -> Result<Extraction>;
}

pub struct DefaultContentProcessor;

#[async_trait]
impl ContentProcessor for DefaultContentProcessor {
    async fn extract(&self, path: &Path, doc_type: DocumentType) -> Result<Extraction> {
        match doc_type {
            // Url documents are stored as their cleaned extracted text.
            DocumentType::Md
            | DocumentType::Org
            | DocumentType::Txt
            | DocumentType::Srt
            | DocumentType::Eml
            | DocumentType::Url => {
                let text = tokio::fs::read_to_string(path).await?;
                Ok(Extraction {
                    text,
                    page_count: None,
                    pdf_signals: None,
                })
            }
            DocumentType::Html => {
                let html = tokio::fs::read_to_string(path).await?;
                let page = crate::infrastructure::crawler::extract_page(&html, None);
                Ok(Extraction {
                    text: page.cleaned_text,
                    page_count: None,
                    pdf_signals: None,
                })
            }
            DocumentType::Pdf => {
                let bytes = tokio::fs::read(path).await?;
                // pdf-extract panics are contained by running on a blocking
                // thread and catching the unwind there.
                let text = tokio::task::spawn_blocking(move || {
                    std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
                        .ok()
                        .and_then(|r| r.ok())
                        .unwrap_or_default()
                })
                .await
                .unwrap_or_default();

                let pages: Vec<&str> = text.split('\u{c}').collect();
                let signals = PdfSignals {
                    producer: String::new(),
                    creator: String::new(),
                    page_count: pages.len().max(1),
                    first_page_text: pages.first().map(|p| p.to_string()).unwrap_or_default(),
                    first_page_image_count: 0,
                    has_fonts: !text.trim().is_empty(),
                };
                Ok(Extraction {
                    page_count: Some(pages.len() as i32),
                    text,
                    pdf_signals: Some(signals),
                })
            }
            // Formats without an in-process extractor yield no chunks; the
            // document still completes, just without vectors.
            DocumentType::Docx
            | DocumentType::Epub
            | DocumentType::Zip
            | DocumentType::Image
            | DocumentType::Audio
            | DocumentType::Video => Ok(Extraction::default()),
        }
    }
}

/// Hook for the knowledge-graph collaborator. Internals are external to
/// this platform; failures here never fail the pipeline.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn store_entities(&self, document_id: &DocumentId, text: &str) -> Result<i32>;
    async fn delete_entities(&self, document_id: &DocumentId) -> Result<()>;
    async fn extract_domain_entities(&self, document_id: &DocumentId, domain: &str) -> Result<i32>;
    async fn remove_domain_entities(&self, document_id: &DocumentId, domain: &str) -> Result<()>;
}

pub struct NoopKnowledgeGraph;

#[async_trait]
impl KnowledgeGraph for NoopKnowledgeGraph {
    async fn store_entities(&self, _: &DocumentId, _: &str) -> Result<i32> {
        Ok(0)
    }
    async fn delete_entities(&self, _: &DocumentId) -> Result<()> {
        Ok(())
    }
    async fn extract_domain_entities(&self, _: &DocumentId, _: &str) -> Result<i32> {
        Ok(0)
    }
    async fn remove_domain_entities(&self, _: &DocumentId, _: &str) -> Result<()> {
        Ok(())
    }
}

pub struct DocumentService {
    documents: Arc<dyn DocumentRepository>,
    folder_engine: Arc<FolderEngine>,
    vector: Arc<dyn VectorIndex>,
    processor: Arc<dyn ContentProcessor>,
    knowledge_graph: Arc<dyn KnowledgeGraph>,
    events: EventBus,
    paths: Arc<PathResolver>,
    crawler: Crawler,
    /// Self-handle for spawning background processing from `&self`.
    weak: std::sync::Weak<DocumentService>,
}

impl DocumentService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        folder_engine: Arc<FolderEngine>,
        vector: Arc<dyn VectorIndex>,
        processor: Arc<dyn ContentProcessor>,
        knowledge_graph: Arc<dyn KnowledgeGraph>,
        events: EventBus,
        paths: Arc<PathResolver>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            documents,
            folder_engine,
            vector,
            processor,
            knowledge_graph,
            events,
            paths,
            crawler: Crawler::new(),
            weak: weak.clone(),
        })
    }

    pub fn repository(&self) -> &Arc<dyn DocumentRepository> {
        &self.documents
    }

    pub fn folder_engine(&self) -> &Arc<FolderEngine> {
        &self.folder_engine
    }

    pub fn path_resolver(&self) -> &Arc<PathResolver> {
        &self.paths
    }

    fn emit_status(&self, doc: &Document) {
        self.events.publish(PlatformEvent::DocumentStatusUpdate {
            document_id: doc.document_id.clone(),
            status: doc.processing_status,
            folder_id: doc.folder_id.clone(),
            user_id: doc.user_id.clone(),
            filename: doc.filename.clone(),
        });
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Ingest uploaded bytes. Implements the full contract: hash dedup,
    /// folder resolution and creation, atomic row insert, the synchronous
    /// org fast path, folder tag inheritance, and async processing for
    /// everything else.
    pub async fn upload(
        &self,
        bytes: &[u8],
        filename: &str,
        declared_type: Option<DocumentType>,
        scope: Scope,
        folder_chain: &[String],
    ) -> Result<UploadOutcome> {
        let file_hash = hex::encode(Sha256::digest(bytes));

        if let Some(existing) = self.documents.find_by_hash(&file_hash).await? {
            info!(
                existing_id = %existing.document_id,
                filename,
                "duplicate upload detected"
            );
            return Ok(UploadOutcome::Duplicate {
                message: format!(
                    "Duplicate detected, existing document id = {}",
                    existing.document_id
                ),
                existing_id: existing.document_id,
            });
        }

        let doc_type = declared_type.unwrap_or_else(|| infer_type(filename, bytes));

        // Resolve the on-disk target and make sure the folder chain exists
        // in both the database and the tree.
        let folder = self
            .folder_engine
            .create_or_get_chain(&scope, folder_chain)
            .await?;
        let folder_id = folder.as_ref().map(|f| f.folder_id.clone());

        let target = self
            .paths
            .tree_path(&scope, folder_chain, Some(filename))
            .await?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("cannot write {}", target.display()))?;

        let mut doc = Document::new(filename, doc_type, bytes.len() as i64, file_hash, scope, None);

        // Folder inheritance: folders that declare category/tags with
        // inherit_tags push them onto arriving documents.
        if let Some(folder) = &folder {
            if folder.inherit_tags {
                doc.category = folder.category.or(doc.category);
                if !folder.tags.is_empty() {
                    doc.tags = folder.tags.clone();
                }
            }
        }

        self.documents
            .create_with_folder(&doc, folder_id.as_ref())
            .await?;
        doc.folder_id = folder_id;

        if doc_type == DocumentType::Org {
            // Fast path: parse synchronously, complete, no vectorization.
            let _ = self.processor.extract(&target, doc_type).await;
            self.documents
                .update_status(&doc.document_id, ProcessingStatus::Completed)
                .await?;
            doc.processing_status = ProcessingStatus::Completed;
            self.emit_status(&doc);
            return Ok(UploadOutcome::Created {
                document_id: doc.document_id,
                status: ProcessingStatus::Completed,
            });
        }

        self.emit_status(&doc);
        self.spawn_processing(doc.document_id.clone(), target);

        Ok(UploadOutcome::Created {
            document_id: doc.document_id,
            status: ProcessingStatus::Processing,
        })
    }

    fn spawn_processing(&self, document_id: DocumentId, path: PathBuf) {
        // The upgrade holds while any caller owns the service.
        let Some(service) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = service.process_document(&document_id, &path).await {
                error!(document_id = %document_id, error = %e, "document processing failed");
                if let Ok(Some(mut doc)) = service.documents.get(&document_id).await {
                    let _ = service
                        .documents
                        .update_status(&document_id, ProcessingStatus::Failed)
                        .await;
                    doc.processing_status = ProcessingStatus::Failed;
                    service.emit_status(&doc);
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Async processing
    // ------------------------------------------------------------------

    /// Parse, chunk, embed, and complete a document already on disk.
    pub async fn process_document(&self, document_id: &DocumentId, path: &Path) -> Result<()> {
        let mut doc = self
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("document {document_id} vanished before processing"))?;

        let extraction = self.processor.extract(path, doc.doc_type).await?;

        // Classification drives the extraction-method tag for PDFs.
        let method = match (&doc.doc_type, &extraction.pdf_signals) {
            (DocumentType::Pdf, Some(signals)) => {
                let classification = classify_pdf(signals);
                info!(
                    document_id = %document_id,
                    class = ?classification.class,
                    confidence = classification.confidence,
                    reason = %classification.reason,
                    "pdf classified"
                );
                match classification.class {
                    PdfClass::NativeDigital => "native_text",
                    PdfClass::OcrCandidate | PdfClass::ScannedImage => "ocr",
                    PdfClass::Empty | PdfClass::Unknown => "text_fallback",
                }
            }
            _ => "native_text",
        };

        let chunks = chunk_text(document_id, &extraction.text, method);

        if !doc.doc_type.is_vectorizable() || chunks.is_empty() {
            self.documents
                .update_counts(document_id, extraction.page_count, Some(0), None)
                .await?;
            self.documents
                .update_status(document_id, ProcessingStatus::Completed)
                .await?;
            doc.processing_status = ProcessingStatus::Completed;
            self.emit_status(&doc);
            return Ok(());
        }

        self.documents
            .update_status(document_id, ProcessingStatus::Embedding)
            .await?;
        doc.processing_status = ProcessingStatus::Embedding;
        self.emit_status(&doc);

        // Payload enrichment uses the current row so search filters see
        // live metadata.
        let meta = payload_meta(&doc);
        let stored = self
            .vector
            .embed_and_store_chunks(document_id, &chunks, doc.user_id.as_deref(), &meta)
            .await?;

        let entity_count = match self
            .knowledge_graph
            .store_entities(document_id, &extraction.text)
            .await
        {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(document_id = %document_id, error = %e, "knowledge graph step failed");
                None
            }
        };

        self.documents
            .update_counts(
                document_id,
                extraction.page_count,
                Some(stored as i32),
                entity_count,
            )
            .await?;
        self.documents
            .update_status(document_id, ProcessingStatus::Completed)
            .await?;
        doc.processing_status = ProcessingStatus::Completed;
        doc.chunk_count = Some(stored as i32);
        self.emit_status(&doc);

        info!(document_id = %document_id, chunks = stored, "document completed");
        Ok(())
    }

    /// Re-ingest an existing document from its on-disk bytes: delete the
    /// old points, then re-extract and upsert. Used by the watcher when a
    /// file changes in place.
    pub async fn reingest(&self, document_id: &DocumentId, path: &Path) -> Result<()> {
        let doc = self
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("document {document_id} not found for reingest"))?;

        if let Err(e) = self
            .vector
            .delete_document_chunks(document_id, doc.user_id.as_deref())
            .await
        {
            warn!(document_id = %document_id, error = %e, "stale point cleanup failed");
        }
        self.process_document(document_id, path).await
    }

    // ------------------------------------------------------------------
    // URL ingest
    // ------------------------------------------------------------------

    /// Import a URL. Binary targets are downloaded and run through the
    /// normal upload path; pages are crawled, cleaned, and stored as text
    /// with the original HTML kept in the operational tree.
    pub async fn ingest_url(
        &self,
        url: &str,
        scope: Scope,
        folder_chain: &[String],
    ) -> Result<UploadOutcome> {
        if is_binary_url(url) {
            let bytes = self.crawler.download_binary(url).await?;
            let filename = url
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("download")
                .to_string();
            return self.upload(&bytes, &filename, None, scope, folder_chain).await;
        }

        let page = self.crawler.crawl_page(url).await?;
        let title = page.title.clone().unwrap_or_else(|| slug_from_url(url));
        let filename = format!("{}.txt", slugify(&title));

        let outcome = self
            .upload(
                page.cleaned_text.as_bytes(),
                &filename,
                Some(DocumentType::Url),
                scope,
                folder_chain,
            )
            .await?;

        if let UploadOutcome::Created { document_id, .. } = &outcome {
            // Original HTML lands in processed/, which the watcher ignores.
            let html_path = self
                .paths
                .uploads_root()
                .join("processed")
                .join(format!("{document_id}.html"));
            if let Some(parent) = html_path.parent() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
            if let Err(e) = tokio::fs::write(&html_path, &page.original_html).await {
                warn!(error = %e, "could not store original html");
            }

            self.documents
                .update(
                    document_id,
                    &DocumentUpdate {
                        title: Some(title),
                        description: Some(format!(
                            "Imported from {url} ({} images)",
                            page.images.len()
                        )),
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Metadata updates
    // ------------------------------------------------------------------

    /// Update the metadata row and keep vector payloads and domain
    /// entities in sync, without re-chunking or re-embedding.
    pub async fn update_metadata(
        &self,
        document_id: &DocumentId,
        update: &DocumentUpdate,
    ) -> Result<()> {
        let before = self
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("document {document_id} not found"))?;

        self.documents.update(document_id, update).await?;

        // Domain change detection: entertainment tagging drives
        // domain-specific entity extraction.
        let was_entertainment = is_entertainment(&before.category, &before.tags);
        let after = self
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("document {document_id} vanished mid-update"))?;
        let is_entertainment_now = is_entertainment(&after.category, &after.tags);

        if !was_entertainment && is_entertainment_now {
            if let Err(e) = self
                .knowledge_graph
                .extract_domain_entities(document_id, "entertainment")
                .await
            {
                warn!(document_id = %document_id, error = %e, "domain entity extraction failed");
            }
        } else if was_entertainment && !is_entertainment_now {
            if let Err(e) = self
                .knowledge_graph
                .remove_domain_entities(document_id, "entertainment")
                .await
            {
                warn!(document_id = %document_id, error = %e, "domain entity removal failed");
            }
        }

        if update.touches_vector_payload() {
            let meta = payload_meta(&after);
            if let Err(e) = self
                .vector
                .patch_document_payload(document_id, after.user_id.as_deref(), &meta)
                .await
            {
                warn!(document_id = %document_id, error = %e, "vector payload patch failed");
            }
        }

        Ok(())
    }

    /// Patch the filename in the row and in every vector payload. Used for
    /// plain renames, where content (and therefore point ids) is unchanged.
    pub async fn rename(&self, document_id: &DocumentId, new_filename: &str) -> Result<()> {
        self.documents.update_filename(document_id, new_filename).await?;
        if let Some(doc) = self.documents.get(document_id).await? {
            let meta = DocumentPayloadMeta {
                filename: Some(new_filename.to_string()),
                ..Default::default()
            };
            if let Err(e) = self
                .vector
                .patch_document_payload(document_id, doc.user_id.as_deref(), &meta)
                .await
            {
                warn!(document_id = %document_id, error = %e, "filename payload patch failed");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    /// Delete a document everywhere. Order: vector points (best effort),
    /// metadata row (authoritative), file, knowledge-graph entities. A
    /// step failing logs and proceeds; the reconciler owns the drift.
    pub async fn delete(&self, document_id: &DocumentId, delete_file: bool) -> Result<bool> {
        let Some(doc) = self.documents.get(document_id).await? else {
            return Ok(false);
        };

        if let Err(e) = self
            .vector
            .delete_document_chunks(document_id, doc.user_id.as_deref())
            .await
        {
            warn!(document_id = %document_id, error = %e, "vector deletion failed, continuing");
        }

        let removed = self
            .documents
            .delete(document_id, doc.user_id.as_deref())
            .await?;

        if delete_file {
            if let Ok(Some(path)) = self.document_path(&doc).await {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    if path.exists() {
                        warn!(path = %path.display(), error = %e, "file deletion failed, continuing");
                    }
                }
            }
        }

        if let Err(e) = self.knowledge_graph.delete_entities(document_id).await {
            warn!(document_id = %document_id, error = %e, "entity deletion failed, continuing");
        }

        self.events.publish(PlatformEvent::FileDeleted {
            document_id: document_id.clone(),
            filename: doc.filename.clone(),
            user_id: doc.user_id.clone(),
        });

        Ok(removed)
    }

    /// Reconstruct a document's on-disk path from its folder chain.
    pub async fn document_path(&self, doc: &Document) -> Result<Option<PathBuf>> {
        let chain = match &doc.folder_id {
            Some(folder_id) => {
                let Some(chain) = self.folder_chain_of(folder_id).await? else {
                    return Ok(None);
                };
                chain
            }
            None => Vec::new(),
        };
        let path = self
            .paths
            .tree_path(&doc.scope(), &chain, Some(&doc.filename))
            .await?;
        Ok(Some(path))
    }

    /// Folder-id → name chain, walking parents up to the scope root.
    pub async fn folder_chain_of(&self, folder_id: &FolderId) -> Result<Option<Vec<String>>> {
        let folders = self.folder_engine.repository();
        let mut chain = Vec::new();
        let mut cursor = Some(folder_id.clone());
        while let Some(id) = cursor {
            let Some(folder) = folders.get(&id).await? else {
                return Ok(None);
            };
            chain.push(folder.name.clone());
            cursor = folder.parent_folder_id;
        }
        chain.reverse();
        Ok(Some(chain))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Declared-type inference: extension table first, content sniff second.
pub fn infer_type(filename: &str, bytes: &[u8]) -> DocumentType {
    if let Some(ext) = filename.rsplit('.').next().filter(|e| *e != filename) {
        return DocumentType::from_extension(ext);
    }
    match infer::get(bytes) {
        Some(kind) => DocumentType::from_extension(kind.extension()),
        None => DocumentType::Txt,
    }
}

pub fn chunk_text(document_id: &DocumentId, text: &str, method: &str) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let splitter = TextSplitter::default().with_trim_chunks(true);
    splitter
        .chunks(text, CHUNK_MAX_CHARS)
        .enumerate()
        .map(|(index, content)| Chunk::new(document_id.clone(), index, content, method))
        .collect()
}

fn payload_meta(doc: &Document) -> DocumentPayloadMeta {
    DocumentPayloadMeta {
        category: doc.category.map(|c| c.as_str().to_string()),
        tags: if doc.tags.is_empty() {
            None
        } else {
            Some(doc.tags.clone())
        },
        title: doc.title.clone(),
        author: doc.author.clone(),
        filename: Some(doc.filename.clone()),
    }
}

fn is_entertainment(
    category: &Option<crate::domain::document::DocumentCategory>,
    tags: &[String],
) -> bool {
    matches!(
        category,
        Some(crate::domain::document::DocumentCategory::Entertainment)
    ) || tags.iter().any(|t| t.eq_ignore_ascii_case("entertainment"))
}

fn slugify(input: &str) -> String {
    let slug: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    let mut collapsed = String::with_capacity(slug.len());
    let mut last_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !last_dash {
                collapsed.push(c);
            }
            last_dash = true;
        } else {
            collapsed.push(c);
            last_dash = false;
        }
    }
    if collapsed.is_empty() {
        "page".to_string()
    } else {
        collapsed
    }
}

fn slug_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "page".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_is_deterministic_and_indexed() {
        let id = DocumentId::new();
        let text = "Paragraph one.\n\nParagraph two is a little longer than the first one.";
        let a = chunk_text(&id, text, "native_text");
        let b = chunk_text(&id, text, "native_text");
        assert!(!a.is_empty());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.point_id(), y.point_id());
            assert_eq!(x.chunk_index, y.chunk_index);
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text(&DocumentId::new(), "   \n  ", "native_text").is_empty());
    }

    #[test]
    fn type_inference_prefers_extension() {
        assert_eq!(infer_type("report.pdf", b"whatever"), DocumentType::Pdf);
        assert_eq!(infer_type("notes.md", b""), DocumentType::Md);
        // No extension: content sniffing gets a chance.
        assert_eq!(infer_type("README", b"plain text"), DocumentType::Txt);
    }

    #[test]
    fn slugs_are_tame() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  ...  "), "page");
        assert_eq!(slugify("Rust & Tokio: async"), "rust-tokio-async");
    }
}
