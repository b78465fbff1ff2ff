// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Document Domain Model
//!
//! The `Document` aggregate and its value objects. A document row is the
//! authoritative record for a piece of content: if the row exists the
//! document exists, regardless of what the vector index or the disk tree
//! currently say (reconciliation repairs those).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::folder::FolderId;

// ============================================================================
// Value Objects: Identifiers
// ============================================================================

/// 32-character opaque document identifier (UUIDv4, simple format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Parse an id from external input.
    ///
    /// Accepts exactly 32 lowercase hex characters.
    pub fn from_string(s: &str) -> Result<Self, DocumentError> {
        if s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(DocumentError::InvalidId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value Objects: Enumerations
// ============================================================================

/// Declared content type of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pdf,
    Md,
    Org,
    Txt,
    Docx,
    Html,
    Epub,
    Eml,
    Image,
    Audio,
    Url,
    Zip,
    Srt,
    Video,
}

impl DocumentType {
    /// Infer a type from a filename extension. Unknown extensions map to
    /// `Txt` so the plain-text processor gets a chance at them.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "md" | "markdown" => Self::Md,
            "org" => Self::Org,
            "txt" | "text" => Self::Txt,
            "docx" | "doc" => Self::Docx,
            "html" | "htm" => Self::Html,
            "epub" => Self::Epub,
            "eml" => Self::Eml,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => Self::Image,
            "mp3" | "wav" | "m4a" | "flac" | "ogg" => Self::Audio,
            "zip" => Self::Zip,
            "srt" => Self::Srt,
            "mp4" | "mkv" | "webm" | "avi" | "mov" => Self::Video,
            _ => Self::Txt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Md => "md",
            Self::Org => "org",
            Self::Txt => "txt",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Epub => "epub",
            Self::Eml => "eml",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Url => "url",
            Self::Zip => "zip",
            Self::Srt => "srt",
            Self::Video => "video",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "pdf" => Self::Pdf,
            "md" => Self::Md,
            "org" => Self::Org,
            "txt" => Self::Txt,
            "docx" => Self::Docx,
            "html" => Self::Html,
            "epub" => Self::Epub,
            "eml" => Self::Eml,
            "image" => Self::Image,
            "audio" => Self::Audio,
            "url" => Self::Url,
            "zip" => Self::Zip,
            "srt" => Self::Srt,
            "video" => Self::Video,
            other => Self::from_extension(other),
        }
    }

    /// Types that never produce embedding points.
    pub fn is_vectorizable(&self) -> bool {
        !matches!(self, Self::Org | Self::Image | Self::Audio)
    }
}

/// Processing status of a document. Transitions are linear:
/// uploading → processing → embedding → completed, with `failed`
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Uploading,
    Processing,
    Embedding,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Embedding => "embedding",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "uploading" => Self::Uploading,
            "processing" => Self::Processing,
            "embedding" => Self::Embedding,
            "completed" => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// Which partition of the platform a document or folder belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    User,
    Global,
    Team,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Global => "global",
            Self::Team => "team",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "global" => Self::Global,
            "team" => Self::Team,
            _ => Self::User,
        }
    }
}

/// The tuple that partitions folders and documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub collection: CollectionKind,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
}

impl Scope {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            collection: CollectionKind::User,
            user_id: Some(user_id.into()),
            team_id: None,
        }
    }

    pub fn global() -> Self {
        Self {
            collection: CollectionKind::Global,
            user_id: None,
            team_id: None,
        }
    }

    pub fn team(team_id: impl Into<String>) -> Self {
        Self {
            collection: CollectionKind::Team,
            user_id: None,
            team_id: Some(team_id.into()),
        }
    }
}

/// Document category. The set is closed; imports from sources whose
/// labels fall outside it are coerced (see [`DocumentCategory::coerce`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Constitutional,
    Historical,
    Legal,
    Technical,
    Scientific,
    Literature,
    Reference,
    News,
    RssImport,
    Entertainment,
    Personal,
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Constitutional => "constitutional",
            Self::Historical => "historical",
            Self::Legal => "legal",
            Self::Technical => "technical",
            Self::Scientific => "scientific",
            Self::Literature => "literature",
            Self::Reference => "reference",
            Self::News => "news",
            Self::RssImport => "rss_import",
            Self::Entertainment => "entertainment",
            Self::Personal => "personal",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "constitutional" => Self::Constitutional,
            "historical" => Self::Historical,
            "legal" => Self::Legal,
            "technical" => Self::Technical,
            "scientific" => Self::Scientific,
            "literature" => Self::Literature,
            "reference" => Self::Reference,
            "news" => Self::News,
            "rss_import" => Self::RssImport,
            "entertainment" => Self::Entertainment,
            "personal" => Self::Personal,
            "other" => Self::Other,
            _ => return None,
        })
    }

    /// Map labels from external sources into the closed set. UI-level
    /// categorization only, never load-bearing.
    pub fn coerce(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Other)
    }
}

/// Submission workflow state for team/global review queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "submitted" => Self::Submitted,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Draft,
        }
    }
}

/// Parsed quality metrics, stored as a JSON blob on the row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub overall_score: f64,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Aggregate Root: Document
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub doc_type: DocumentType,
    pub file_size: i64,
    /// sha-256 of the original bytes, hex-encoded.
    pub file_hash: String,
    pub processing_status: ProcessingStatus,
    pub upload_date: DateTime<Utc>,
    pub quality_metrics: Option<QualityMetrics>,
    pub page_count: Option<i32>,
    pub chunk_count: Option<i32>,
    pub entity_count: Option<i32>,
    pub category: Option<DocumentCategory>,
    pub tags: Vec<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub folder_id: Option<FolderId>,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    pub collection: CollectionKind,
    // Submission workflow
    pub submission_status: Option<SubmissionStatus>,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    // ZIP container hierarchy (DAG: parent id on the child row only)
    pub parent_document_id: Option<DocumentId>,
    pub original_zip_path: Option<String>,
    pub inherit_metadata: bool,
}

impl Document {
    /// A fresh document in `processing`, scoped and named but not yet typed
    /// beyond what the caller inferred.
    pub fn new(
        filename: impl Into<String>,
        doc_type: DocumentType,
        file_size: i64,
        file_hash: impl Into<String>,
        scope: Scope,
        folder_id: Option<FolderId>,
    ) -> Self {
        Self {
            document_id: DocumentId::new(),
            filename: filename.into(),
            title: None,
            description: None,
            doc_type,
            file_size,
            file_hash: file_hash.into(),
            processing_status: ProcessingStatus::Processing,
            upload_date: Utc::now(),
            quality_metrics: None,
            page_count: None,
            chunk_count: None,
            entity_count: None,
            category: None,
            tags: Vec::new(),
            author: None,
            language: None,
            publication_date: None,
            folder_id,
            user_id: scope.user_id,
            team_id: scope.team_id,
            collection: scope.collection,
            submission_status: None,
            submitted_by: None,
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
            parent_document_id: None,
            original_zip_path: None,
            inherit_metadata: false,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope {
            collection: self.collection,
            user_id: self.user_id.clone(),
            team_id: self.team_id.clone(),
        }
    }
}

/// Partial update applied to the metadata row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<DocumentCategory>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
    pub folder_id: Option<Option<FolderId>>,
}

impl DocumentUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && self.author.is_none()
            && self.language.is_none()
            && self.publication_date.is_none()
            && self.folder_id.is_none()
    }

    /// True when the update touches fields echoed into vector payloads.
    pub fn touches_vector_payload(&self) -> bool {
        self.title.is_some() || self.category.is_some() || self.tags.is_some() || self.author.is_some()
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Whitelisted sort keys for document listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSortKey {
    UploadDate,
    Filename,
    Title,
    FileSize,
    QualityScore,
}

impl DocumentSortKey {
    /// Column expression for ORDER BY. Restricted to this set so filter
    /// input can never inject arbitrary SQL.
    pub fn column(&self) -> &'static str {
        match self {
            Self::UploadDate => "upload_date",
            Self::Filename => "filename",
            Self::Title => "title",
            Self::FileSize => "file_size",
            Self::QualityScore => "(quality_metrics->>'overall_score')::float",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Open predicate set for `filter_documents`. All predicates are optional
/// and compose with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentFilter {
    /// Free text, matched with ILIKE over filename/title/description/author.
    pub search: Option<String>,
    pub category: Option<DocumentCategory>,
    /// Tag superset filter (`tags @> …`).
    pub tags: Option<Vec<String>>,
    pub doc_type: Option<DocumentType>,
    pub status: Option<ProcessingStatus>,
    pub uploaded_after: Option<DateTime<Utc>>,
    pub uploaded_before: Option<DateTime<Utc>>,
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    pub min_quality_score: Option<f64>,
    pub user_id: Option<String>,
    pub collection: Option<CollectionKind>,
    pub sort_by: Option<DocumentSortKey>,
    pub sort_order: Option<SortOrder>,
    pub skip: i64,
    pub limit: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid document id: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_roundtrip() {
        let id = DocumentId::new();
        assert_eq!(id.as_str().len(), 32);
        let parsed = DocumentId::from_string(id.as_str()).unwrap();
        assert_eq!(parsed, id);
        assert!(DocumentId::from_string("not-an-id").is_err());
    }

    #[test]
    fn type_inference_from_extension() {
        assert_eq!(DocumentType::from_extension("PDF"), DocumentType::Pdf);
        assert_eq!(DocumentType::from_extension("jpeg"), DocumentType::Image);
        assert_eq!(DocumentType::from_extension("weird"), DocumentType::Txt);
    }

    #[test]
    fn no_vectorize_set() {
        assert!(!DocumentType::Org.is_vectorizable());
        assert!(!DocumentType::Image.is_vectorizable());
        assert!(!DocumentType::Audio.is_vectorizable());
        assert!(DocumentType::Pdf.is_vectorizable());
        assert!(DocumentType::Md.is_vectorizable());
    }

    #[test]
    fn category_coercion_is_closed() {
        assert_eq!(DocumentCategory::coerce("rss_import"), DocumentCategory::RssImport);
        assert_eq!(DocumentCategory::coerce("definitely-new"), DocumentCategory::Other);
    }
}
