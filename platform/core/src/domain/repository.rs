// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository traits for the relational store.
//!
//! Implementations live in `infrastructure::repositories` (Postgres via the
//! shared [`DatabaseManager`](crate::infrastructure::db::DatabaseManager))
//! and `infrastructure::memory` (in-memory, for tests and local runs).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::document::{
    Document, DocumentFilter, DocumentId, DocumentUpdate, ProcessingStatus, QualityMetrics, Scope,
    SubmissionStatus,
};
use crate::domain::folder::{DocumentFolder, FolderId};
use crate::domain::rss::{ArticleId, FeedId, RssArticle, RssFeed};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Statistics for the library overview endpoints.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DocumentStats {
    pub total_documents: i64,
    pub completed_documents: i64,
    pub failed_documents: i64,
    pub total_bytes: i64,
    pub by_category: Vec<(String, i64)>,
    pub by_type: Vec<(String, i64)>,
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Atomic "create + assign to folder": a single
    /// `INSERT ... ON CONFLICT (document_id) DO NOTHING` carrying the
    /// folder id. Returns false when the row already existed.
    async fn create_with_folder(
        &self,
        doc: &Document,
        folder_id: Option<&FolderId>,
    ) -> Result<bool, RepositoryError>;

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;

    async fn update(&self, id: &DocumentId, update: &DocumentUpdate) -> Result<bool, RepositoryError>;

    async fn update_status(&self, id: &DocumentId, status: ProcessingStatus) -> Result<bool, RepositoryError>;

    async fn update_filename(&self, id: &DocumentId, filename: &str) -> Result<bool, RepositoryError>;

    async fn update_counts(
        &self,
        id: &DocumentId,
        page_count: Option<i32>,
        chunk_count: Option<i32>,
        entity_count: Option<i32>,
    ) -> Result<bool, RepositoryError>;

    async fn update_quality_metrics(
        &self,
        id: &DocumentId,
        metrics: &QualityMetrics,
    ) -> Result<bool, RepositoryError>;

    /// Deletes the metadata row. The row is the authoritative record; a
    /// missing row means "gone" for every reconciliation pass.
    async fn delete(&self, id: &DocumentId, user_id: Option<&str>) -> Result<bool, RepositoryError>;

    /// Indexed dedup lookup over `file_hash`.
    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<Document>, RepositoryError>;

    /// Duplicate detection keyed on the scoping tuple. NULL user/folder are
    /// matched with `IS NULL`, never `=`.
    async fn find_by_filename_and_context(
        &self,
        filename: &str,
        user_id: Option<&str>,
        scope: &Scope,
        folder_id: Option<&FolderId>,
    ) -> Result<Option<Document>, RepositoryError>;

    /// Composed dynamic filter. Returns (rows, total-count-before-paging).
    async fn filter_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<(Vec<Document>, i64), RepositoryError>;

    /// `folder_id = None` selects root-level documents of the scope.
    async fn get_documents_by_folder(
        &self,
        folder_id: Option<&FolderId>,
        scope: &Scope,
    ) -> Result<Vec<Document>, RepositoryError>;

    async fn list_by_status(&self, status: ProcessingStatus) -> Result<Vec<Document>, RepositoryError>;

    /// Paginated full scan, used by the startup reconciler under admin RLS.
    async fn list_all_paginated(&self, offset: i64, limit: i64) -> Result<Vec<Document>, RepositoryError>;

    // ---- submission workflow -------------------------------------------

    async fn update_submission_status(
        &self,
        id: &DocumentId,
        status: SubmissionStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn pending_submissions(&self, skip: i64, limit: i64) -> Result<Vec<Document>, RepositoryError>;

    // ---- ZIP hierarchy --------------------------------------------------

    async fn set_parent_relationship(
        &self,
        child: &DocumentId,
        parent: &DocumentId,
        original_zip_path: Option<&str>,
    ) -> Result<bool, RepositoryError>;

    async fn zip_children(&self, parent: &DocumentId) -> Result<Vec<Document>, RepositoryError>;

    // ---- bulk / stats ---------------------------------------------------

    /// Recategorize a batch, returning (updated, failed-ids).
    async fn bulk_categorize(
        &self,
        ids: &[DocumentId],
        category: &str,
        tags: Option<&[String]>,
    ) -> Result<(u64, Vec<DocumentId>), RepositoryError>;

    async fn stats(&self) -> Result<DocumentStats, RepositoryError>;
}

#[async_trait]
pub trait FolderRepository: Send + Sync {
    /// Idempotent UPSERT. The conflict target depends on the folder shape
    /// (root vs. child × user/team/global); concurrent callers converge on
    /// a single row.
    async fn create_or_get(&self, folder: &DocumentFolder) -> Result<DocumentFolder, RepositoryError>;

    async fn get(&self, id: &FolderId) -> Result<Option<DocumentFolder>, RepositoryError>;

    /// One resolution level: `(name, parent)` within a scope.
    async fn find_child(
        &self,
        name: &str,
        parent: Option<&FolderId>,
        scope: &Scope,
    ) -> Result<Option<DocumentFolder>, RepositoryError>;

    async fn list_by_scope(&self, scope: &Scope) -> Result<Vec<DocumentFolder>, RepositoryError>;

    /// Every folder row, all scopes. Reconciliation only.
    async fn list_all(&self) -> Result<Vec<DocumentFolder>, RepositoryError>;

    async fn subfolders(&self, parent: &FolderId) -> Result<Vec<DocumentFolder>, RepositoryError>;

    async fn update_metadata(
        &self,
        id: &FolderId,
        category: Option<&str>,
        tags: Option<&[String]>,
        inherit_tags: Option<bool>,
    ) -> Result<bool, RepositoryError>;

    /// Deletes the folder row; the database cascades to children and
    /// documents. Vector cleanup is the caller's responsibility.
    async fn delete(&self, id: &FolderId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait FeedRepository: Send + Sync {
    async fn upsert(&self, feed: &RssFeed) -> Result<(), RepositoryError>;

    async fn get(&self, id: &FeedId) -> Result<Option<RssFeed>, RepositoryError>;

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<RssFeed>, RepositoryError>;

    /// The eligibility predicate: interval elapsed (or never checked) and
    /// not currently polling; ordered `last_check ASC NULLS FIRST`,
    /// limit 10. `Some(uid)` scopes to one user; `None` spans all feeds.
    async fn feeds_needing_poll(&self, user_id: Option<&str>) -> Result<Vec<RssFeed>, RepositoryError>;

    /// Compare-and-set claim on `is_polling`. Returns true when this caller
    /// won the latch.
    async fn try_claim(&self, id: &FeedId) -> Result<bool, RepositoryError>;

    /// Release the latch and advance `last_check`.
    async fn release(&self, id: &FeedId) -> Result<(), RepositoryError>;

    /// Release the latch without advancing `last_check` (failed poll).
    async fn release_without_progress(&self, id: &FeedId) -> Result<(), RepositoryError>;

    /// Reset feeds stuck `is_polling` longer than the timeout. Returns how
    /// many were reset.
    async fn reset_stuck(&self, stuck_for: chrono::Duration) -> Result<u64, RepositoryError>;

    async fn delete(&self, id: &FeedId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert unless a duplicate exists by `(feed_id, content_hash)` or
    /// `(feed_id, link)`. Returns false on duplicate.
    async fn insert_if_new(&self, article: &RssArticle) -> Result<bool, RepositoryError>;

    async fn get(&self, id: &ArticleId) -> Result<Option<RssArticle>, RepositoryError>;

    async fn set_full_content(
        &self,
        id: &ArticleId,
        full_text: &str,
        full_html: Option<&str>,
        images: &[String],
    ) -> Result<bool, RepositoryError>;

    async fn mark_processed(&self, id: &ArticleId) -> Result<bool, RepositoryError>;

    async fn mark_read(&self, id: &ArticleId, read: bool) -> Result<bool, RepositoryError>;

    async fn list_by_feed(&self, feed: &FeedId, limit: i64) -> Result<Vec<RssArticle>, RepositoryError>;

    async fn list_unprocessed(&self, limit: i64) -> Result<Vec<RssArticle>, RepositoryError>;

    /// Retention purge. Returns the purged article rows so callers can
    /// remove derived files.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<RssArticle>, RepositoryError>;
}

/// Username ↔ user-id mapping consumed by the path parser.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_id_for_username(&self, username: &str) -> Result<Option<String>, RepositoryError>;

    async fn username_for_user_id(&self, user_id: &str) -> Result<Option<String>, RepositoryError>;
}
