// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory repository implementations.
//!
//! Used by unit and integration tests and by single-node local runs where
//! Postgres is not available. Semantics mirror the Postgres
//! implementations: IS-NULL-style scoping, folder UPSERT convergence, and
//! the feed poll compare-and-set latch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::document::{
    Document, DocumentFilter, DocumentId, DocumentUpdate, ProcessingStatus, QualityMetrics, Scope,
    SortOrder, SubmissionStatus,
};
use crate::domain::folder::{DocumentFolder, FolderId};
use crate::domain::repository::{
    ArticleRepository, DocumentRepository, DocumentStats, FeedRepository, FolderRepository,
    RepositoryError, UserDirectory,
};
use crate::domain::rss::{ArticleId, FeedId, RssArticle, RssFeed};

fn lock_err() -> RepositoryError {
    RepositoryError::Database("mutex poisoned".to_string())
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryDocumentRepository {
    documents: Arc<Mutex<HashMap<DocumentId, Document>>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn create_with_folder(
        &self,
        doc: &Document,
        folder_id: Option<&FolderId>,
    ) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        if docs.contains_key(&doc.document_id) {
            return Ok(false);
        }
        let mut doc = doc.clone();
        doc.folder_id = folder_id.cloned();
        docs.insert(doc.document_id.clone(), doc);
        Ok(true)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        Ok(self.documents.lock().map_err(|_| lock_err())?.get(id).cloned())
    }

    async fn update(&self, id: &DocumentId, update: &DocumentUpdate) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        let Some(doc) = docs.get_mut(id) else {
            return Ok(false);
        };
        if let Some(title) = &update.title {
            doc.title = Some(title.clone());
        }
        if let Some(description) = &update.description {
            doc.description = Some(description.clone());
        }
        if let Some(category) = update.category {
            doc.category = Some(category);
        }
        if let Some(tags) = &update.tags {
            doc.tags = tags.clone();
        }
        if let Some(author) = &update.author {
            doc.author = Some(author.clone());
        }
        if let Some(language) = &update.language {
            doc.language = Some(language.clone());
        }
        if let Some(publication_date) = update.publication_date {
            doc.publication_date = Some(publication_date);
        }
        if let Some(folder) = &update.folder_id {
            doc.folder_id = folder.clone();
        }
        Ok(true)
    }

    async fn update_status(&self, id: &DocumentId, status: ProcessingStatus) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        match docs.get_mut(id) {
            Some(doc) => {
                doc.processing_status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_filename(&self, id: &DocumentId, filename: &str) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        match docs.get_mut(id) {
            Some(doc) => {
                doc.filename = filename.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_counts(
        &self,
        id: &DocumentId,
        page_count: Option<i32>,
        chunk_count: Option<i32>,
        entity_count: Option<i32>,
    ) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        match docs.get_mut(id) {
            Some(doc) => {
                if page_count.is_some() {
                    doc.page_count = page_count;
                }
                if chunk_count.is_some() {
                    doc.chunk_count = chunk_count;
                }
                if entity_count.is_some() {
                    doc.entity_count = entity_count;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_quality_metrics(
        &self,
        id: &DocumentId,
        metrics: &QualityMetrics,
    ) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        match docs.get_mut(id) {
            Some(doc) => {
                doc.quality_metrics = Some(metrics.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &DocumentId, _user_id: Option<&str>) -> Result<bool, RepositoryError> {
        Ok(self.documents.lock().map_err(|_| lock_err())?.remove(id).is_some())
    }

    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<Document>, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .find(|d| d.file_hash == file_hash)
            .cloned())
    }

    async fn find_by_filename_and_context(
        &self,
        filename: &str,
        user_id: Option<&str>,
        scope: &Scope,
        folder_id: Option<&FolderId>,
    ) -> Result<Option<Document>, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .find(|d| {
                d.filename == filename
                    && d.collection == scope.collection
                    && d.user_id.as_deref() == user_id
                    && d.folder_id.as_ref() == folder_id
            })
            .cloned())
    }

    async fn filter_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<(Vec<Document>, i64), RepositoryError> {
        let docs = self.documents.lock().map_err(|_| lock_err())?;
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        let mut matches: Vec<Document> = docs
            .values()
            .filter(|d| {
                if let Some(needle) = &needle {
                    let haystacks = [
                        Some(d.filename.as_str()),
                        d.title.as_deref(),
                        d.description.as_deref(),
                        d.author.as_deref(),
                    ];
                    if !haystacks
                        .iter()
                        .flatten()
                        .any(|h| h.to_lowercase().contains(needle))
                    {
                        return false;
                    }
                }
                if let Some(category) = filter.category {
                    if d.category != Some(category) {
                        return false;
                    }
                }
                if let Some(tags) = &filter.tags {
                    if !tags.iter().all(|t| d.tags.contains(t)) {
                        return false;
                    }
                }
                if let Some(doc_type) = filter.doc_type {
                    if d.doc_type != doc_type {
                        return false;
                    }
                }
                if let Some(status) = filter.status {
                    if d.processing_status != status {
                        return false;
                    }
                }
                if let Some(after) = filter.uploaded_after {
                    if d.upload_date < after {
                        return false;
                    }
                }
                if let Some(before) = filter.uploaded_before {
                    if d.upload_date > before {
                        return false;
                    }
                }
                if let Some(after) = filter.published_after {
                    if d.publication_date.map(|p| p < after).unwrap_or(true) {
                        return false;
                    }
                }
                if let Some(before) = filter.published_before {
                    if d.publication_date.map(|p| p > before).unwrap_or(true) {
                        return false;
                    }
                }
                if let Some(min) = filter.min_quality_score {
                    if d.quality_metrics
                        .as_ref()
                        .map(|m| m.overall_score < min)
                        .unwrap_or(true)
                    {
                        return false;
                    }
                }
                if let Some(uid) = &filter.user_id {
                    if d.user_id.as_deref() != Some(uid.as_str()) {
                        return false;
                    }
                }
                if let Some(collection) = filter.collection {
                    if d.collection != collection {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            use crate::domain::document::DocumentSortKey::*;
            let ord = match filter.sort_by.unwrap_or(UploadDate) {
                UploadDate => a.upload_date.cmp(&b.upload_date),
                Filename => a.filename.cmp(&b.filename),
                Title => a.title.cmp(&b.title),
                FileSize => a.file_size.cmp(&b.file_size),
                QualityScore => {
                    let score = |d: &Document| {
                        d.quality_metrics.as_ref().map(|m| m.overall_score).unwrap_or(0.0)
                    };
                    score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal)
                }
            };
            match filter.sort_order.unwrap_or(SortOrder::Desc) {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let total = matches.len() as i64;
        let skip = filter.skip.max(0) as usize;
        let limit = if filter.limit > 0 { filter.limit as usize } else { 100 };
        let page = matches.into_iter().skip(skip).take(limit).collect();
        Ok((page, total))
    }

    async fn get_documents_by_folder(
        &self,
        folder_id: Option<&FolderId>,
        scope: &Scope,
    ) -> Result<Vec<Document>, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|d| {
                d.collection == scope.collection
                    && d.user_id == scope.user_id
                    && d.folder_id.as_ref() == folder_id
            })
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, status: ProcessingStatus) -> Result<Vec<Document>, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|d| d.processing_status == status)
            .cloned()
            .collect())
    }

    async fn list_all_paginated(&self, offset: i64, limit: i64) -> Result<Vec<Document>, RepositoryError> {
        let docs = self.documents.lock().map_err(|_| lock_err())?;
        let mut all: Vec<Document> = docs.values().cloned().collect();
        all.sort_by_key(|d| d.upload_date);
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_submission_status(
        &self,
        id: &DocumentId,
        status: SubmissionStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        match docs.get_mut(id) {
            Some(doc) => {
                doc.submission_status = Some(status);
                if status == SubmissionStatus::Submitted {
                    doc.submitted_by = Some(actor.to_string());
                    doc.submitted_at = Some(at);
                } else {
                    doc.reviewed_by = Some(actor.to_string());
                    doc.reviewed_at = Some(at);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pending_submissions(&self, skip: i64, limit: i64) -> Result<Vec<Document>, RepositoryError> {
        let docs = self.documents.lock().map_err(|_| lock_err())?;
        let mut pending: Vec<Document> = docs
            .values()
            .filter(|d| d.submission_status == Some(SubmissionStatus::Submitted))
            .cloned()
            .collect();
        pending.sort_by_key(|d| d.submitted_at);
        Ok(pending
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn set_parent_relationship(
        &self,
        child: &DocumentId,
        parent: &DocumentId,
        original_zip_path: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        match docs.get_mut(child) {
            Some(doc) => {
                doc.parent_document_id = Some(parent.clone());
                doc.original_zip_path = original_zip_path.map(|p| p.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn zip_children(&self, parent: &DocumentId) -> Result<Vec<Document>, RepositoryError> {
        Ok(self
            .documents
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|d| d.parent_document_id.as_ref() == Some(parent))
            .cloned()
            .collect())
    }

    async fn bulk_categorize(
        &self,
        ids: &[DocumentId],
        category: &str,
        tags: Option<&[String]>,
    ) -> Result<(u64, Vec<DocumentId>), RepositoryError> {
        let category = crate::domain::document::DocumentCategory::coerce(category);
        let mut docs = self.documents.lock().map_err(|_| lock_err())?;
        let mut updated = 0;
        let mut failed = Vec::new();
        for id in ids {
            match docs.get_mut(id) {
                Some(doc) => {
                    doc.category = Some(category);
                    if let Some(tags) = tags {
                        doc.tags = tags.to_vec();
                    }
                    updated += 1;
                }
                None => failed.push(id.clone()),
            }
        }
        Ok((updated, failed))
    }

    async fn stats(&self) -> Result<DocumentStats, RepositoryError> {
        let docs = self.documents.lock().map_err(|_| lock_err())?;
        let mut stats = DocumentStats {
            total_documents: docs.len() as i64,
            ..Default::default()
        };
        let mut by_category: HashMap<String, i64> = HashMap::new();
        let mut by_type: HashMap<String, i64> = HashMap::new();
        for doc in docs.values() {
            if doc.processing_status == ProcessingStatus::Completed {
                stats.completed_documents += 1;
            }
            if doc.processing_status == ProcessingStatus::Failed {
                stats.failed_documents += 1;
            }
            stats.total_bytes += doc.file_size;
            let category = doc
                .category
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "uncategorized".to_string());
            *by_category.entry(category).or_default() += 1;
            *by_type.entry(doc.doc_type.as_str().to_string()).or_default() += 1;
        }
        stats.by_category = by_category.into_iter().collect();
        stats.by_type = by_type.into_iter().collect();
        Ok(stats)
    }
}

// ============================================================================
// Folders
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryFolderRepository {
    folders: Arc<Mutex<HashMap<FolderId, DocumentFolder>>>,
}

impl InMemoryFolderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.folders.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FolderRepository for InMemoryFolderRepository {
    async fn create_or_get(&self, folder: &DocumentFolder) -> Result<DocumentFolder, RepositoryError> {
        let mut folders = self.folders.lock().map_err(|_| lock_err())?;
        // The UPSERT's conflict target, expressed over the map: same name,
        // parent, and scope tuple means the same row.
        if let Some(existing) = folders.values_mut().find(|f| {
            f.name == folder.name
                && f.parent_folder_id == folder.parent_folder_id
                && f.collection == folder.collection
                && f.user_id == folder.user_id
                && f.team_id == folder.team_id
        }) {
            existing.updated_at = folder.updated_at;
            return Ok(existing.clone());
        }
        folders.insert(folder.folder_id.clone(), folder.clone());
        Ok(folder.clone())
    }

    async fn get(&self, id: &FolderId) -> Result<Option<DocumentFolder>, RepositoryError> {
        Ok(self.folders.lock().map_err(|_| lock_err())?.get(id).cloned())
    }

    async fn find_child(
        &self,
        name: &str,
        parent: Option<&FolderId>,
        scope: &Scope,
    ) -> Result<Option<DocumentFolder>, RepositoryError> {
        Ok(self
            .folders
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .find(|f| {
                f.name == name
                    && f.parent_folder_id.as_ref() == parent
                    && f.collection == scope.collection
                    && f.user_id == scope.user_id
                    && (scope.team_id.is_none() || f.team_id == scope.team_id)
            })
            .cloned())
    }

    async fn list_by_scope(&self, scope: &Scope) -> Result<Vec<DocumentFolder>, RepositoryError> {
        Ok(self
            .folders
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|f| {
                f.collection == scope.collection
                    && f.user_id == scope.user_id
                    && (scope.team_id.is_none() || f.team_id == scope.team_id)
            })
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<DocumentFolder>, RepositoryError> {
        Ok(self
            .folders
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .cloned()
            .collect())
    }

    async fn subfolders(&self, parent: &FolderId) -> Result<Vec<DocumentFolder>, RepositoryError> {
        Ok(self
            .folders
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|f| f.parent_folder_id.as_ref() == Some(parent))
            .cloned()
            .collect())
    }

    async fn update_metadata(
        &self,
        id: &FolderId,
        category: Option<&str>,
        tags: Option<&[String]>,
        inherit_tags: Option<bool>,
    ) -> Result<bool, RepositoryError> {
        let mut folders = self.folders.lock().map_err(|_| lock_err())?;
        match folders.get_mut(id) {
            Some(folder) => {
                if let Some(category) = category {
                    folder.category = crate::domain::document::DocumentCategory::parse(category);
                }
                if let Some(tags) = tags {
                    folder.tags = tags.to_vec();
                }
                if let Some(inherit) = inherit_tags {
                    folder.inherit_tags = inherit;
                }
                folder.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &FolderId) -> Result<bool, RepositoryError> {
        let mut folders = self.folders.lock().map_err(|_| lock_err())?;
        if folders.remove(id).is_none() {
            return Ok(false);
        }
        // Cascade to descendants, the way the database constraint would.
        loop {
            let orphans: Vec<FolderId> = folders
                .values()
                .filter(|f| {
                    f.parent_folder_id
                        .as_ref()
                        .map(|p| !folders.contains_key(p))
                        .unwrap_or(false)
                })
                .map(|f| f.folder_id.clone())
                .collect();
            if orphans.is_empty() {
                break;
            }
            for orphan in orphans {
                folders.remove(&orphan);
            }
        }
        Ok(true)
    }
}

// ============================================================================
// RSS
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryFeedRepository {
    feeds: Arc<Mutex<HashMap<FeedId, RssFeed>>>,
    /// Observed `is_polling` transitions, for mutual-exclusion assertions.
    claim_log: Arc<Mutex<Vec<(FeedId, bool)>>>,
}

impl InMemoryFeedRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim_log(&self) -> Vec<(FeedId, bool)> {
        self.claim_log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FeedRepository for InMemoryFeedRepository {
    async fn upsert(&self, feed: &RssFeed) -> Result<(), RepositoryError> {
        self.feeds
            .lock()
            .map_err(|_| lock_err())?
            .insert(feed.feed_id.clone(), feed.clone());
        Ok(())
    }

    async fn get(&self, id: &FeedId) -> Result<Option<RssFeed>, RepositoryError> {
        Ok(self.feeds.lock().map_err(|_| lock_err())?.get(id).cloned())
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<RssFeed>, RepositoryError> {
        Ok(self
            .feeds
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|f| f.user_id.as_deref() == user_id)
            .cloned()
            .collect())
    }

    async fn feeds_needing_poll(&self, user_id: Option<&str>) -> Result<Vec<RssFeed>, RepositoryError> {
        let now = Utc::now();
        let feeds = self.feeds.lock().map_err(|_| lock_err())?;
        let mut eligible: Vec<RssFeed> = feeds
            .values()
            .filter(|f| {
                user_id.map(|uid| f.user_id.as_deref() == Some(uid)).unwrap_or(true)
                    && !f.is_polling
                    && match f.last_check {
                        None => true,
                        Some(last) => last + chrono::Duration::seconds(f.check_interval) < now,
                    }
            })
            .cloned()
            .collect();
        // last_check ASC NULLS FIRST
        eligible.sort_by(|a, b| match (a.last_check, b.last_check) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        });
        eligible.truncate(10);
        Ok(eligible)
    }

    async fn try_claim(&self, id: &FeedId) -> Result<bool, RepositoryError> {
        let mut feeds = self.feeds.lock().map_err(|_| lock_err())?;
        let Some(feed) = feeds.get_mut(id) else {
            return Ok(false);
        };
        if feed.is_polling {
            return Ok(false);
        }
        feed.is_polling = true;
        feed.updated_at = Utc::now();
        self.claim_log
            .lock()
            .map_err(|_| lock_err())?
            .push((id.clone(), true));
        Ok(true)
    }

    async fn release(&self, id: &FeedId) -> Result<(), RepositoryError> {
        let mut feeds = self.feeds.lock().map_err(|_| lock_err())?;
        if let Some(feed) = feeds.get_mut(id) {
            feed.is_polling = false;
            feed.last_check = Some(Utc::now());
            feed.updated_at = Utc::now();
            self.claim_log
                .lock()
                .map_err(|_| lock_err())?
                .push((id.clone(), false));
        }
        Ok(())
    }

    async fn release_without_progress(&self, id: &FeedId) -> Result<(), RepositoryError> {
        let mut feeds = self.feeds.lock().map_err(|_| lock_err())?;
        if let Some(feed) = feeds.get_mut(id) {
            feed.is_polling = false;
            feed.updated_at = Utc::now();
            self.claim_log
                .lock()
                .map_err(|_| lock_err())?
                .push((id.clone(), false));
        }
        Ok(())
    }

    async fn reset_stuck(&self, stuck_for: chrono::Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - stuck_for;
        let mut feeds = self.feeds.lock().map_err(|_| lock_err())?;
        let mut reset = 0;
        for feed in feeds.values_mut() {
            if feed.is_polling && feed.updated_at < cutoff {
                feed.is_polling = false;
                feed.updated_at = Utc::now();
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn delete(&self, id: &FeedId) -> Result<bool, RepositoryError> {
        Ok(self.feeds.lock().map_err(|_| lock_err())?.remove(id).is_some())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryArticleRepository {
    articles: Arc<Mutex<HashMap<ArticleId, RssArticle>>>,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.articles.lock().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn insert_if_new(&self, article: &RssArticle) -> Result<bool, RepositoryError> {
        let mut articles = self.articles.lock().map_err(|_| lock_err())?;
        let duplicate = articles.values().any(|a| {
            a.feed_id == article.feed_id
                && (a.content_hash == article.content_hash || a.link == article.link)
        });
        if duplicate {
            return Ok(false);
        }
        articles.insert(article.article_id.clone(), article.clone());
        Ok(true)
    }

    async fn get(&self, id: &ArticleId) -> Result<Option<RssArticle>, RepositoryError> {
        Ok(self.articles.lock().map_err(|_| lock_err())?.get(id).cloned())
    }

    async fn set_full_content(
        &self,
        id: &ArticleId,
        full_text: &str,
        full_html: Option<&str>,
        images: &[String],
    ) -> Result<bool, RepositoryError> {
        let mut articles = self.articles.lock().map_err(|_| lock_err())?;
        match articles.get_mut(id) {
            Some(article) => {
                article.full_text = Some(full_text.to_string());
                article.full_html = full_html.map(|h| h.to_string());
                article.images = images.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_processed(&self, id: &ArticleId) -> Result<bool, RepositoryError> {
        let mut articles = self.articles.lock().map_err(|_| lock_err())?;
        match articles.get_mut(id) {
            Some(article) => {
                article.is_processed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_read(&self, id: &ArticleId, read: bool) -> Result<bool, RepositoryError> {
        let mut articles = self.articles.lock().map_err(|_| lock_err())?;
        match articles.get_mut(id) {
            Some(article) => {
                article.is_read = read;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_feed(&self, feed: &FeedId, limit: i64) -> Result<Vec<RssArticle>, RepositoryError> {
        let articles = self.articles.lock().map_err(|_| lock_err())?;
        let mut matching: Vec<RssArticle> = articles
            .values()
            .filter(|a| &a.feed_id == feed)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.published_date.cmp(&a.published_date));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn list_unprocessed(&self, limit: i64) -> Result<Vec<RssArticle>, RepositoryError> {
        let articles = self.articles.lock().map_err(|_| lock_err())?;
        let mut matching: Vec<RssArticle> = articles
            .values()
            .filter(|a| !a.is_processed)
            .cloned()
            .collect();
        matching.sort_by_key(|a| a.created_at);
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<RssArticle>, RepositoryError> {
        let mut articles = self.articles.lock().map_err(|_| lock_err())?;
        let purged_ids: Vec<ArticleId> = articles
            .values()
            .filter(|a| a.published_date.unwrap_or(a.created_at) < cutoff)
            .map(|a| a.article_id.clone())
            .collect();
        let mut purged = Vec::with_capacity(purged_ids.len());
        for id in purged_ids {
            if let Some(article) = articles.remove(&id) {
                purged.push(article);
            }
        }
        Ok(purged)
    }
}

// ============================================================================
// Vector index
// ============================================================================

use crate::domain::chunk::Chunk;
use crate::infrastructure::vector::{
    DocumentPayloadMeta, SearchHit, SearchOptions, VectorIndex, VectorStoreError,
};

#[derive(Debug, Clone)]
struct StoredPoint {
    text: String,
    payload: serde_json::Value,
}

/// In-memory stand-in for the Qdrant gateway. Similarity is token
/// overlap — deterministic and good enough for pipeline tests that assert
/// on payloads, point counts, and merge semantics rather than embedding
/// quality.
#[derive(Clone)]
pub struct InMemoryVectorIndex {
    collections: Arc<Mutex<HashMap<String, HashMap<u64, StoredPoint>>>>,
    global_collection: String,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(Mutex::new(HashMap::new())),
            global_collection: "citadel_documents".to_string(),
        }
    }

    fn collection_for(&self, user_id: Option<&str>) -> String {
        match user_id {
            Some(uid) => format!("user_{uid}_documents"),
            None => self.global_collection.clone(),
        }
    }

    /// Test helper: every point whose payload names this document.
    pub fn points_for_document(&self, document_id: &str) -> Vec<serde_json::Value> {
        let collections = match self.collections.lock() {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        collections
            .values()
            .flat_map(|points| points.values())
            .filter(|p| {
                p.payload.get("document_id").and_then(|v| v.as_str()) == Some(document_id)
            })
            .map(|p| p.payload.clone())
            .collect()
    }

    pub fn point_count(&self) -> usize {
        self.collections
            .lock()
            .map(|c| c.values().map(|p| p.len()).sum())
            .unwrap_or(0)
    }

    fn score(query: &str, text: &str) -> f32 {
        let query_tokens: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect();
        if query_tokens.is_empty() {
            return 0.0;
        }
        let text_lower = text.to_lowercase();
        let matched = query_tokens
            .iter()
            .filter(|t| text_lower.contains(t.as_str()))
            .count();
        matched as f32 / query_tokens.len() as f32
    }

    fn search_one(
        &self,
        collection: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Vec<SearchHit> {
        let collections = match self.collections.lock() {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        let Some(points) = collections.get(collection) else {
            return Vec::new();
        };
        let mut hits: Vec<SearchHit> = points
            .iter()
            .filter_map(|(&id, point)| {
                let score = Self::score(query, &point.text);
                if score < options.score_threshold {
                    return None;
                }
                let get = |key: &str| {
                    point
                        .payload
                        .get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                };
                if let Some(category) = &options.filter_category {
                    if get("document_category").as_deref() != Some(category.as_str()) {
                        return None;
                    }
                }
                if let Some(tags) = &options.filter_tags {
                    let doc_tags: Vec<String> = point
                        .payload
                        .get("document_tags")
                        .and_then(|v| v.as_array())
                        .map(|a| {
                            a.iter()
                                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                    if !tags.iter().any(|t| doc_tags.contains(t)) {
                        return None;
                    }
                }
                Some(SearchHit {
                    point_id: id,
                    chunk_id: get("chunk_id").unwrap_or_default(),
                    document_id: get("document_id").unwrap_or_default(),
                    content: get("content").unwrap_or_default(),
                    chunk_index: point
                        .payload
                        .get("chunk_index")
                        .and_then(|v| v.as_i64())
                        .unwrap_or(0),
                    score,
                    source_collection: collection.to_string(),
                    is_adjacent: false,
                    document_category: get("document_category"),
                    document_filename: get("document_filename"),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(options.limit.max(1) as usize);
        hits
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn embed_and_store_chunks(
        &self,
        document_id: &DocumentId,
        chunks: &[Chunk],
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<usize, VectorStoreError> {
        let collection = self.collection_for(user_id);
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?;
        let points = collections.entry(collection).or_default();

        let mut seen = std::collections::HashSet::new();
        let mut stored = 0;
        for chunk in chunks {
            if chunk.content.trim().is_empty() || !seen.insert(chunk.content_hash.clone()) {
                continue;
            }
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
            points.insert(
                chunk.point_id(),
                StoredPoint {
                    text: chunk.content.clone(),
                    payload,
                },
            );
            stored += 1;
        }
        Ok(stored)
    }

    async fn search_similar(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, VectorStoreError> {
        let mut hits = match &options.user_id {
            Some(uid) => {
                let user_hits = self.search_one(&self.collection_for(Some(uid)), query, options);
                let global_hits = self.search_one(&self.global_collection, query, options);
                let mut merged: HashMap<u64, SearchHit> = HashMap::new();
                for hit in user_hits.into_iter().chain(global_hits) {
                    match merged.get(&hit.point_id) {
                        Some(existing) if existing.score >= hit.score => {}
                        _ => {
                            merged.insert(hit.point_id, hit);
                        }
                    }
                }
                merged.into_values().collect::<Vec<_>>()
            }
            None => self.search_one(&self.global_collection, query, options),
        };
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(options.limit.max(1) as usize);

        if options.include_adjacent {
            let collections = self
                .collections
                .lock()
                .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?;
            let mut adjacent = Vec::new();
            for hit in &hits {
                if let Some(points) = collections.get(&hit.source_collection) {
                    for (&id, point) in points.iter() {
                        let doc = point.payload.get("document_id").and_then(|v| v.as_str());
                        let index = point.payload.get("chunk_index").and_then(|v| v.as_i64());
                        if doc == Some(hit.document_id.as_str())
                            && (index == Some(hit.chunk_index - 1)
                                || index == Some(hit.chunk_index + 1))
                        {
                            let get = |key: &str| {
                                point
                                    .payload
                                    .get(key)
                                    .and_then(|v| v.as_str())
                                    .map(|s| s.to_string())
                            };
                            adjacent.push(SearchHit {
                                point_id: id,
                                chunk_id: get("chunk_id").unwrap_or_default(),
                                document_id: hit.document_id.clone(),
                                content: get("content").unwrap_or_default(),
                                chunk_index: index.unwrap_or(0),
                                score: hit.score * 0.8,
                                source_collection: hit.source_collection.clone(),
                                is_adjacent: true,
                                document_category: get("document_category"),
                                document_filename: get("document_filename"),
                            });
                        }
                    }
                }
            }
            drop(collections);
            let known: std::collections::HashSet<u64> = hits.iter().map(|h| h.point_id).collect();
            hits.extend(adjacent.into_iter().filter(|h| !known.contains(&h.point_id)));
        }

        Ok(hits)
    }

    async fn delete_document_chunks(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
    ) -> Result<(), VectorStoreError> {
        let collection = self.collection_for(user_id);
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?;
        if let Some(points) = collections.get_mut(&collection) {
            points.retain(|_, p| {
                p.payload.get("document_id").and_then(|v| v.as_str())
                    != Some(document_id.to_string().as_str())
            });
        }
        Ok(())
    }

    async fn delete_user_collection(&self, user_id: &str) -> Result<(), VectorStoreError> {
        let collection = self.collection_for(Some(user_id));
        self.collections
            .lock()
            .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?
            .remove(&collection);
        Ok(())
    }

    async fn patch_document_payload(
        &self,
        document_id: &DocumentId,
        user_id: Option<&str>,
        meta: &DocumentPayloadMeta,
    ) -> Result<(), VectorStoreError> {
        let collection = self.collection_for(user_id);
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?;
        if let Some(points) = collections.get_mut(&collection) {
            for point in points.values_mut() {
                if point.payload.get("document_id").and_then(|v| v.as_str())
                    != Some(document_id.to_string().as_str())
                {
                    continue;
                }
                let map = point.payload.as_object_mut().expect("payload is an object");
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
            }
        }
        Ok(())
    }

    async fn index_text(
        &self,
        collection: &str,
        id: u64,
        text: &str,
        payload: serde_json::Value,
    ) -> Result<(), VectorStoreError> {
        self.collections
            .lock()
            .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?
            .entry(collection.to_string())
            .or_default()
            .insert(
                id,
                StoredPoint {
                    text: text.to_string(),
                    payload,
                },
            );
        Ok(())
    }

    async fn search_text(
        &self,
        collection: &str,
        query: &str,
        limit: u64,
    ) -> Result<Vec<(u64, f32, serde_json::Value)>, VectorStoreError> {
        let collections = self
            .collections
            .lock()
            .map_err(|_| VectorStoreError::Store("mutex poisoned".to_string()))?;
        let Some(points) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<(u64, f32, serde_json::Value)> = points
            .iter()
            .map(|(&id, p)| (id, Self::score(query, &p.text), p.payload.clone()))
            .filter(|(_, score, _)| *score > 0.0)
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit.max(1) as usize);
        Ok(hits)
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    by_username: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, username: impl Into<String>, user_id: impl Into<String>) {
        if let Ok(mut map) = self.by_username.lock() {
            map.insert(username.into(), user_id.into());
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn user_id_for_username(&self, username: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .by_username
            .lock()
            .map_err(|_| lock_err())?
            .get(username)
            .cloned())
    }

    async fn username_for_user_id(&self, user_id: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .by_username
            .lock()
            .map_err(|_| lock_err())?
            .iter()
            .find(|(_, v)| v.as_str() == user_id)
            .map(|(k, _)| k.clone()))
    }
}
