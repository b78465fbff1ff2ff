// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Document Repository
//!
//! Production `DocumentRepository` backed by the `document_metadata` table.
//! Translates between the `Document` aggregate and the relational schema.
//! RLS is enabled on `document_metadata`; every statement here runs with
//! the caller's RLS context on the same connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;

use crate::domain::document::{
    CollectionKind, Document, DocumentCategory, DocumentFilter, DocumentId, DocumentType,
    DocumentUpdate, ProcessingStatus, QualityMetrics, Scope, SortOrder, SubmissionStatus,
};
use crate::domain::folder::FolderId;
use crate::domain::repository::{DocumentRepository, DocumentStats, RepositoryError};
use crate::infrastructure::db::{DatabaseManager, RlsContext, SqlValue};

const DOCUMENT_COLUMNS: &str = "document_id, filename, title, description, doc_type, file_size, \
     file_hash, processing_status, upload_date, quality_metrics, page_count, chunk_count, \
     entity_count, category, tags, author, language, publication_date, folder_id, user_id, \
     team_id, collection_type, submission_status, submitted_by, submitted_at, reviewed_by, \
     reviewed_at, parent_document_id, original_zip_path, inherit_metadata";

pub struct PostgresDocumentRepository {
    db: Arc<DatabaseManager>,
}

impl PostgresDocumentRepository {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    fn rls_for(user_id: Option<&str>) -> RlsContext {
        match user_id {
            Some(uid) => RlsContext::user(uid),
            None => RlsContext::admin(),
        }
    }

    fn row_to_document(row: &PgRow) -> Result<Document, RepositoryError> {
        let map_err = |e: sqlx::Error| RepositoryError::Database(e.to_string());

        let quality_metrics: Option<serde_json::Value> =
            row.try_get("quality_metrics").map_err(map_err)?;
        let quality_metrics = match quality_metrics {
            Some(value) => Some(
                serde_json::from_value::<QualityMetrics>(value)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        let doc_type: String = row.try_get("doc_type").map_err(map_err)?;
        let status: String = row.try_get("processing_status").map_err(map_err)?;
        let collection: String = row.try_get("collection_type").map_err(map_err)?;
        let category: Option<String> = row.try_get("category").map_err(map_err)?;
        let submission: Option<String> = row.try_get("submission_status").map_err(map_err)?;
        let folder_id: Option<String> = row.try_get("folder_id").map_err(map_err)?;
        let parent_id: Option<String> = row.try_get("parent_document_id").map_err(map_err)?;
        let document_id: String = row.try_get("document_id").map_err(map_err)?;

        Ok(Document {
            document_id: DocumentId::from_string(&document_id)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            filename: row.try_get("filename").map_err(map_err)?,
            title: row.try_get("title").map_err(map_err)?,
            description: row.try_get("description").map_err(map_err)?,
            doc_type: DocumentType::from_str_loose(&doc_type),
            file_size: row.try_get("file_size").map_err(map_err)?,
            file_hash: row.try_get("file_hash").map_err(map_err)?,
            processing_status: ProcessingStatus::from_str_loose(&status),
            upload_date: row.try_get("upload_date").map_err(map_err)?,
            quality_metrics,
            page_count: row.try_get("page_count").map_err(map_err)?,
            chunk_count: row.try_get("chunk_count").map_err(map_err)?,
            entity_count: row.try_get("entity_count").map_err(map_err)?,
            category: category.as_deref().and_then(DocumentCategory::parse),
            tags: row
                .try_get::<Option<Vec<String>>, _>("tags")
                .map_err(map_err)?
                .unwrap_or_default(),
            author: row.try_get("author").map_err(map_err)?,
            language: row.try_get("language").map_err(map_err)?,
            publication_date: row.try_get("publication_date").map_err(map_err)?,
            folder_id: folder_id.map(FolderId::from_string),
            user_id: row.try_get("user_id").map_err(map_err)?,
            team_id: row.try_get("team_id").map_err(map_err)?,
            collection: CollectionKind::from_str_loose(&collection),
            submission_status: submission.as_deref().map(SubmissionStatus::from_str_loose),
            submitted_by: row.try_get("submitted_by").map_err(map_err)?,
            submitted_at: row.try_get("submitted_at").map_err(map_err)?,
            reviewed_by: row.try_get("reviewed_by").map_err(map_err)?,
            reviewed_at: row.try_get("reviewed_at").map_err(map_err)?,
            parent_document_id: parent_id
                .map(|p| DocumentId::from_string(&p))
                .transpose()
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            original_zip_path: row.try_get("original_zip_path").map_err(map_err)?,
            inherit_metadata: row
                .try_get::<Option<bool>, _>("inherit_metadata")
                .map_err(map_err)?
                .unwrap_or(false),
        })
    }

    fn db_err(e: crate::infrastructure::db::DbError) -> RepositoryError {
        RepositoryError::Database(e.to_string())
    }
}

#[async_trait]
impl DocumentRepository for PostgresDocumentRepository {
    async fn create_with_folder(
        &self,
        doc: &Document,
        folder_id: Option<&FolderId>,
    ) -> Result<bool, RepositoryError> {
        let quality = doc
            .quality_metrics
            .as_ref()
            .map(|m| serde_json::to_value(m))
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let sql = format!(
            "INSERT INTO document_metadata ({DOCUMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                     $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30) \
             ON CONFLICT (document_id) DO NOTHING"
        );

        let args = vec![
            SqlValue::Text(doc.document_id.to_string()),
            SqlValue::Text(doc.filename.clone()),
            SqlValue::TextOpt(doc.title.clone()),
            SqlValue::TextOpt(doc.description.clone()),
            SqlValue::Text(doc.doc_type.as_str().to_string()),
            SqlValue::I64(doc.file_size),
            SqlValue::Text(doc.file_hash.clone()),
            SqlValue::Text(doc.processing_status.as_str().to_string()),
            SqlValue::Timestamp(doc.upload_date),
            match quality {
                Some(value) => SqlValue::Json(value),
                None => SqlValue::Json(serde_json::Value::Null),
            },
            SqlValue::I32Opt(doc.page_count),
            SqlValue::I32Opt(doc.chunk_count),
            SqlValue::I32Opt(doc.entity_count),
            SqlValue::TextOpt(doc.category.map(|c| c.as_str().to_string())),
            SqlValue::TextArray(doc.tags.clone()),
            SqlValue::TextOpt(doc.author.clone()),
            SqlValue::TextOpt(doc.language.clone()),
            SqlValue::TimestampOpt(doc.publication_date),
            SqlValue::TextOpt(folder_id.map(|f| f.to_string())),
            SqlValue::TextOpt(doc.user_id.clone()),
            SqlValue::TextOpt(doc.team_id.clone()),
            SqlValue::Text(doc.collection.as_str().to_string()),
            SqlValue::TextOpt(doc.submission_status.map(|s| s.as_str().to_string())),
            SqlValue::TextOpt(doc.submitted_by.clone()),
            SqlValue::TimestampOpt(doc.submitted_at),
            SqlValue::TextOpt(doc.reviewed_by.clone()),
            SqlValue::TimestampOpt(doc.reviewed_at),
            SqlValue::TextOpt(doc.parent_document_id.as_ref().map(|p| p.to_string())),
            SqlValue::TextOpt(doc.original_zip_path.clone()),
            SqlValue::Bool(doc.inherit_metadata),
        ];

        let rls = Self::rls_for(doc.user_id.as_deref());
        let affected = self.db.exec(&sql, args, Some(&rls)).await.map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM document_metadata WHERE document_id = $1");
        let row = self
            .db
            .fetch_one(&sql, vec![SqlValue::Text(id.to_string())], Some(&RlsContext::admin()))
            .await
            .map_err(Self::db_err)?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn update(&self, id: &DocumentId, update: &DocumentUpdate) -> Result<bool, RepositoryError> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut sets: Vec<String> = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();
        let mut n = 0usize;
        let mut push = |sets: &mut Vec<String>, args: &mut Vec<SqlValue>, column: &str, value: SqlValue| {
            n += 1;
            sets.push(format!("{column} = ${n}"));
            args.push(value);
            n
        };

        if let Some(title) = &update.title {
            push(&mut sets, &mut args, "title", SqlValue::Text(title.clone()));
        }
        if let Some(description) = &update.description {
            push(&mut sets, &mut args, "description", SqlValue::Text(description.clone()));
        }
        if let Some(category) = update.category {
            push(&mut sets, &mut args, "category", SqlValue::Text(category.as_str().to_string()));
        }
        if let Some(tags) = &update.tags {
            push(&mut sets, &mut args, "tags", SqlValue::TextArray(tags.clone()));
        }
        if let Some(author) = &update.author {
            push(&mut sets, &mut args, "author", SqlValue::Text(author.clone()));
        }
        if let Some(language) = &update.language {
            push(&mut sets, &mut args, "language", SqlValue::Text(language.clone()));
        }
        if let Some(publication_date) = update.publication_date {
            push(&mut sets, &mut args, "publication_date", SqlValue::Timestamp(publication_date));
        }
        if let Some(folder) = &update.folder_id {
            push(
                &mut sets,
                &mut args,
                "folder_id",
                SqlValue::TextOpt(folder.as_ref().map(|f| f.to_string())),
            );
        }

        let id_pos = args.len() + 1;
        let sql = format!(
            "UPDATE document_metadata SET {} WHERE document_id = ${id_pos}",
            sets.join(", ")
        );
        args.push(SqlValue::Text(id.to_string()));

        let affected = self
            .db
            .exec(&sql, args, Some(&RlsContext::admin()))
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn update_status(&self, id: &DocumentId, status: ProcessingStatus) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE document_metadata SET processing_status = $1 WHERE document_id = $2",
                vec![
                    SqlValue::Text(status.as_str().to_string()),
                    SqlValue::Text(id.to_string()),
                ],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn update_filename(&self, id: &DocumentId, filename: &str) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE document_metadata SET filename = $1 WHERE document_id = $2",
                vec![SqlValue::Text(filename.to_string()), SqlValue::Text(id.to_string())],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn update_counts(
        &self,
        id: &DocumentId,
        page_count: Option<i32>,
        chunk_count: Option<i32>,
        entity_count: Option<i32>,
    ) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE document_metadata SET \
                 page_count = COALESCE($1, page_count), \
                 chunk_count = COALESCE($2, chunk_count), \
                 entity_count = COALESCE($3, entity_count) \
                 WHERE document_id = $4",
                vec![
                    SqlValue::I32Opt(page_count),
                    SqlValue::I32Opt(chunk_count),
                    SqlValue::I32Opt(entity_count),
                    SqlValue::Text(id.to_string()),
                ],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn update_quality_metrics(
        &self,
        id: &DocumentId,
        metrics: &QualityMetrics,
    ) -> Result<bool, RepositoryError> {
        let value = serde_json::to_value(metrics)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let affected = self
            .db
            .exec(
                "UPDATE document_metadata SET quality_metrics = $1 WHERE document_id = $2",
                vec![SqlValue::Json(value), SqlValue::Text(id.to_string())],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &DocumentId, user_id: Option<&str>) -> Result<bool, RepositoryError> {
        let rls = Self::rls_for(user_id);
        let affected = self
            .db
            .exec(
                "DELETE FROM document_metadata WHERE document_id = $1",
                vec![SqlValue::Text(id.to_string())],
                Some(&rls),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn find_by_hash(&self, file_hash: &str) -> Result<Option<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata WHERE file_hash = $1 LIMIT 1"
        );
        let row = self
            .db
            .fetch_one(&sql, vec![SqlValue::Text(file_hash.to_string())], Some(&RlsContext::admin()))
            .await
            .map_err(Self::db_err)?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn find_by_filename_and_context(
        &self,
        filename: &str,
        user_id: Option<&str>,
        scope: &Scope,
        folder_id: Option<&FolderId>,
    ) -> Result<Option<Document>, RepositoryError> {
        // NULL scoping columns are matched with IS NULL, never `=`.
        let mut sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata \
             WHERE filename = $1 AND collection_type = $2"
        );
        let mut args = vec![
            SqlValue::Text(filename.to_string()),
            SqlValue::Text(scope.collection.as_str().to_string()),
        ];
        let mut n = 2;

        match user_id {
            Some(uid) => {
                n += 1;
                sql.push_str(&format!(" AND user_id = ${n}"));
                args.push(SqlValue::Text(uid.to_string()));
            }
            None => sql.push_str(" AND user_id IS NULL"),
        }
        match folder_id {
            Some(fid) => {
                n += 1;
                sql.push_str(&format!(" AND folder_id = ${n}"));
                args.push(SqlValue::Text(fid.to_string()));
            }
            None => sql.push_str(" AND folder_id IS NULL"),
        }
        sql.push_str(" LIMIT 1");

        let rls = Self::rls_for(user_id);
        let row = self.db.fetch_one(&sql, args, Some(&rls)).await.map_err(Self::db_err)?;
        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn filter_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<(Vec<Document>, i64), RepositoryError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();
        let mut n = 0usize;

        if let Some(search) = &filter.search {
            n += 1;
            clauses.push(format!(
                "(filename ILIKE ${n} OR title ILIKE ${n} OR description ILIKE ${n} OR author ILIKE ${n})"
            ));
            args.push(SqlValue::Text(format!("%{search}%")));
        }
        if let Some(category) = filter.category {
            n += 1;
            clauses.push(format!("category = ${n}"));
            args.push(SqlValue::Text(category.as_str().to_string()));
        }
        if let Some(tags) = &filter.tags {
            if !tags.is_empty() {
                n += 1;
                clauses.push(format!("tags @> ${n}"));
                args.push(SqlValue::TextArray(tags.clone()));
            }
        }
        if let Some(doc_type) = filter.doc_type {
            n += 1;
            clauses.push(format!("doc_type = ${n}"));
            args.push(SqlValue::Text(doc_type.as_str().to_string()));
        }
        if let Some(status) = filter.status {
            n += 1;
            clauses.push(format!("processing_status = ${n}"));
            args.push(SqlValue::Text(status.as_str().to_string()));
        }
        if let Some(after) = filter.uploaded_after {
            n += 1;
            clauses.push(format!("upload_date >= ${n}"));
            args.push(SqlValue::Timestamp(after));
        }
        if let Some(before) = filter.uploaded_before {
            n += 1;
            clauses.push(format!("upload_date <= ${n}"));
            args.push(SqlValue::Timestamp(before));
        }
        if let Some(after) = filter.published_after {
            n += 1;
            clauses.push(format!("publication_date >= ${n}"));
            args.push(SqlValue::Timestamp(after));
        }
        if let Some(before) = filter.published_before {
            n += 1;
            clauses.push(format!("publication_date <= ${n}"));
            args.push(SqlValue::Timestamp(before));
        }
        if let Some(min_score) = filter.min_quality_score {
            n += 1;
            clauses.push(format!("(quality_metrics->>'overall_score')::float >= ${n}"));
            args.push(SqlValue::F64(min_score));
        }
        if let Some(uid) = &filter.user_id {
            n += 1;
            clauses.push(format!("user_id = ${n}"));
            args.push(SqlValue::Text(uid.clone()));
        }
        if let Some(collection) = filter.collection {
            n += 1;
            clauses.push(format!("collection_type = ${n}"));
            args.push(SqlValue::Text(collection.as_str().to_string()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        // Sort keys are a closed set; ORDER BY is never built from raw input.
        let sort_column = filter
            .sort_by
            .unwrap_or(crate::domain::document::DocumentSortKey::UploadDate)
            .column();
        let sort_dir = match filter.sort_order.unwrap_or(SortOrder::Desc) {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let count_sql = format!("SELECT COUNT(*) FROM document_metadata{where_clause}");
        let total: i64 = self
            .db
            .fetch_val(&count_sql, args.clone(), Some(&RlsContext::admin()))
            .await
            .map_err(Self::db_err)?
            .unwrap_or(0);

        let limit_pos = n + 1;
        let offset_pos = n + 2;
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata{where_clause} \
             ORDER BY {sort_column} {sort_dir} LIMIT ${limit_pos} OFFSET ${offset_pos}"
        );
        args.push(SqlValue::I64(if filter.limit > 0 { filter.limit } else { 100 }));
        args.push(SqlValue::I64(filter.skip.max(0)));

        let rows = self.db.fetch_all(&sql, args, Some(&RlsContext::admin())).await.map_err(Self::db_err)?;
        let documents = rows
            .iter()
            .map(Self::row_to_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((documents, total))
    }

    async fn get_documents_by_folder(
        &self,
        folder_id: Option<&FolderId>,
        scope: &Scope,
    ) -> Result<Vec<Document>, RepositoryError> {
        let mut sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata WHERE collection_type = $1"
        );
        let mut args = vec![SqlValue::Text(scope.collection.as_str().to_string())];
        let mut n = 1;

        match folder_id {
            Some(fid) => {
                n += 1;
                sql.push_str(&format!(" AND folder_id = ${n}"));
                args.push(SqlValue::Text(fid.to_string()));
            }
            None => sql.push_str(" AND folder_id IS NULL"),
        }
        match &scope.user_id {
            Some(uid) => {
                n += 1;
                sql.push_str(&format!(" AND user_id = ${n}"));
                args.push(SqlValue::Text(uid.clone()));
            }
            None => sql.push_str(" AND user_id IS NULL"),
        }
        sql.push_str(" ORDER BY filename ASC");

        let rls = Self::rls_for(scope.user_id.as_deref());
        let rows = self.db.fetch_all(&sql, args, Some(&rls)).await.map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn list_by_status(&self, status: ProcessingStatus) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata WHERE processing_status = $1"
        );
        let rows = self
            .db
            .fetch_all(
                &sql,
                vec![SqlValue::Text(status.as_str().to_string())],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn list_all_paginated(&self, offset: i64, limit: i64) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata \
             ORDER BY upload_date ASC LIMIT $1 OFFSET $2"
        );
        let rows = self
            .db
            .fetch_all(
                &sql,
                vec![SqlValue::I64(limit), SqlValue::I64(offset)],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn update_submission_status(
        &self,
        id: &DocumentId,
        status: SubmissionStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let sql = match status {
            SubmissionStatus::Submitted => {
                "UPDATE document_metadata SET submission_status = $1, submitted_by = $2, \
                 submitted_at = $3 WHERE document_id = $4"
            }
            _ => {
                "UPDATE document_metadata SET submission_status = $1, reviewed_by = $2, \
                 reviewed_at = $3 WHERE document_id = $4"
            }
        };
        let affected = self
            .db
            .exec(
                sql,
                vec![
                    SqlValue::Text(status.as_str().to_string()),
                    SqlValue::Text(actor.to_string()),
                    SqlValue::Timestamp(at),
                    SqlValue::Text(id.to_string()),
                ],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn pending_submissions(&self, skip: i64, limit: i64) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata \
             WHERE submission_status = 'submitted' \
             ORDER BY submitted_at ASC LIMIT $1 OFFSET $2"
        );
        let rows = self
            .db
            .fetch_all(
                &sql,
                vec![SqlValue::I64(limit), SqlValue::I64(skip)],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn set_parent_relationship(
        &self,
        child: &DocumentId,
        parent: &DocumentId,
        original_zip_path: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE document_metadata SET parent_document_id = $1, original_zip_path = $2 \
                 WHERE document_id = $3",
                vec![
                    SqlValue::Text(parent.to_string()),
                    SqlValue::TextOpt(original_zip_path.map(|p| p.to_string())),
                    SqlValue::Text(child.to_string()),
                ],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn zip_children(&self, parent: &DocumentId) -> Result<Vec<Document>, RepositoryError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document_metadata \
             WHERE parent_document_id = $1 ORDER BY original_zip_path ASC"
        );
        let rows = self
            .db
            .fetch_all(&sql, vec![SqlValue::Text(parent.to_string())], Some(&RlsContext::admin()))
            .await
            .map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_document).collect()
    }

    async fn bulk_categorize(
        &self,
        ids: &[DocumentId],
        category: &str,
        tags: Option<&[String]>,
    ) -> Result<(u64, Vec<DocumentId>), RepositoryError> {
        let mut updated = 0u64;
        let mut failed = Vec::new();
        let category = DocumentCategory::coerce(category);

        for id in ids {
            let result = match tags {
                Some(tags) => {
                    self.db
                        .exec(
                            "UPDATE document_metadata SET category = $1, tags = $2 WHERE document_id = $3",
                            vec![
                                SqlValue::Text(category.as_str().to_string()),
                                SqlValue::TextArray(tags.to_vec()),
                                SqlValue::Text(id.to_string()),
                            ],
                            Some(&RlsContext::admin()),
                        )
                        .await
                }
                None => {
                    self.db
                        .exec(
                            "UPDATE document_metadata SET category = $1 WHERE document_id = $2",
                            vec![
                                SqlValue::Text(category.as_str().to_string()),
                                SqlValue::Text(id.to_string()),
                            ],
                            Some(&RlsContext::admin()),
                        )
                        .await
                }
            };
            match result {
                Ok(n) if n > 0 => updated += 1,
                _ => failed.push(id.clone()),
            }
        }
        Ok((updated, failed))
    }

    async fn stats(&self) -> Result<DocumentStats, RepositoryError> {
        let totals = self
            .db
            .fetch_one(
                "SELECT COUNT(*) AS total, \
                        COUNT(*) FILTER (WHERE processing_status = 'completed') AS completed, \
                        COUNT(*) FILTER (WHERE processing_status = 'failed') AS failed, \
                        COALESCE(SUM(file_size), 0)::bigint AS bytes \
                 FROM document_metadata",
                vec![],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;

        let mut stats = DocumentStats::default();
        if let Some(row) = totals {
            stats.total_documents = row.try_get::<i64, _>("total").unwrap_or(0);
            stats.completed_documents = row.try_get::<i64, _>("completed").unwrap_or(0);
            stats.failed_documents = row.try_get::<i64, _>("failed").unwrap_or(0);
            stats.total_bytes = row.try_get::<i64, _>("bytes").unwrap_or(0);
        }

        let by_category = self
            .db
            .fetch_all(
                "SELECT COALESCE(category, 'uncategorized') AS category, COUNT(*) AS n \
                 FROM document_metadata GROUP BY 1 ORDER BY n DESC",
                vec![],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        for row in &by_category {
            let category: String = row.try_get("category").unwrap_or_default();
            let n: i64 = row.try_get("n").unwrap_or(0);
            stats.by_category.push((category, n));
        }

        let by_type = self
            .db
            .fetch_all(
                "SELECT doc_type, COUNT(*) AS n FROM document_metadata GROUP BY 1 ORDER BY n DESC",
                vec![],
                Some(&RlsContext::admin()),
            )
            .await
            .map_err(Self::db_err)?;
        for row in &by_type {
            let doc_type: String = row.try_get("doc_type").unwrap_or_default();
            let n: i64 = row.try_get("n").unwrap_or(0);
            stats.by_type.push((doc_type, n));
        }

        Ok(stats)
    }
}
