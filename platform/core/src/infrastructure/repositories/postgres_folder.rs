// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Folder Repository
//!
//! `document_folders` has RLS disabled; what it has instead is a set of six
//! partial unique indexes, one per folder shape, and the UPSERT here must
//! name the matching conflict target or Postgres rejects the statement.
//! Concurrent create-or-get callers converge on a single row through the
//! `DO UPDATE SET updated_at = EXCLUDED.updated_at RETURNING *` dance.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;

use crate::domain::document::{CollectionKind, DocumentCategory, Scope};
use crate::domain::folder::{DocumentFolder, FolderId, FolderShape};
use crate::domain::repository::{FolderRepository, RepositoryError};
use crate::infrastructure::db::{DatabaseManager, SqlValue};

const FOLDER_COLUMNS: &str = "folder_id, name, parent_folder_id, user_id, team_id, \
     collection_type, category, tags, inherit_tags, created_at, updated_at";

pub struct PostgresFolderRepository {
    db: Arc<DatabaseManager>,
}

impl PostgresFolderRepository {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    fn row_to_folder(row: &PgRow) -> Result<DocumentFolder, RepositoryError> {
        let map_err = |e: sqlx::Error| RepositoryError::Database(e.to_string());

        let folder_id: String = row.try_get("folder_id").map_err(map_err)?;
        let parent: Option<String> = row.try_get("parent_folder_id").map_err(map_err)?;
        let collection: String = row.try_get("collection_type").map_err(map_err)?;
        let category: Option<String> = row.try_get("category").map_err(map_err)?;

        Ok(DocumentFolder {
            folder_id: FolderId::from_string(folder_id),
            name: row.try_get("name").map_err(map_err)?,
            parent_folder_id: parent.map(FolderId::from_string),
            user_id: row.try_get("user_id").map_err(map_err)?,
            team_id: row.try_get("team_id").map_err(map_err)?,
            collection: CollectionKind::from_str_loose(&collection),
            category: category.as_deref().and_then(DocumentCategory::parse),
            tags: row
                .try_get::<Option<Vec<String>>, _>("tags")
                .map_err(map_err)?
                .unwrap_or_default(),
            inherit_tags: row
                .try_get::<Option<bool>, _>("inherit_tags")
                .map_err(map_err)?
                .unwrap_or(false),
            created_at: row.try_get("created_at").map_err(map_err)?,
            updated_at: row.try_get("updated_at").map_err(map_err)?,
        })
    }

    fn db_err(e: crate::infrastructure::db::DbError) -> RepositoryError {
        RepositoryError::Database(e.to_string())
    }
}

#[async_trait]
impl FolderRepository for PostgresFolderRepository {
    async fn create_or_get(&self, folder: &DocumentFolder) -> Result<DocumentFolder, RepositoryError> {
        let shape = FolderShape::classify(
            folder.parent_folder_id.is_some(),
            folder.collection,
            folder.user_id.is_some(),
            folder.team_id.is_some(),
        );

        let sql = format!(
            "INSERT INTO document_folders ({FOLDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT {} \
             DO UPDATE SET updated_at = EXCLUDED.updated_at \
             RETURNING {FOLDER_COLUMNS}",
            shape.conflict_target()
        );

        let args = vec![
            SqlValue::Text(folder.folder_id.to_string()),
            SqlValue::Text(folder.name.clone()),
            SqlValue::TextOpt(folder.parent_folder_id.as_ref().map(|p| p.to_string())),
            SqlValue::TextOpt(folder.user_id.clone()),
            SqlValue::TextOpt(folder.team_id.clone()),
            SqlValue::Text(folder.collection.as_str().to_string()),
            SqlValue::TextOpt(folder.category.map(|c| c.as_str().to_string())),
            SqlValue::TextArray(folder.tags.clone()),
            SqlValue::Bool(folder.inherit_tags),
            SqlValue::Timestamp(folder.created_at),
            SqlValue::Timestamp(folder.updated_at),
        ];

        let row = self
            .db
            .fetch_one(&sql, args, None)
            .await
            .map_err(Self::db_err)?
            .ok_or_else(|| {
                RepositoryError::Conflict(format!("folder upsert returned no row: {}", folder.name))
            })?;
        Self::row_to_folder(&row)
    }

    async fn get(&self, id: &FolderId) -> Result<Option<DocumentFolder>, RepositoryError> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM document_folders WHERE folder_id = $1");
        let row = self
            .db
            .fetch_one(&sql, vec![SqlValue::Text(id.to_string())], None)
            .await
            .map_err(Self::db_err)?;
        row.as_ref().map(Self::row_to_folder).transpose()
    }

    async fn find_child(
        &self,
        name: &str,
        parent: Option<&FolderId>,
        scope: &Scope,
    ) -> Result<Option<DocumentFolder>, RepositoryError> {
        let mut sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM document_folders \
             WHERE name = $1 AND collection_type = $2"
        );
        let mut args = vec![
            SqlValue::Text(name.to_string()),
            SqlValue::Text(scope.collection.as_str().to_string()),
        ];
        let mut n = 2;

        match parent {
            Some(pid) => {
                n += 1;
                sql.push_str(&format!(" AND parent_folder_id = ${n}"));
                args.push(SqlValue::Text(pid.to_string()));
            }
            None => sql.push_str(" AND parent_folder_id IS NULL"),
        }
        match &scope.user_id {
            Some(uid) => {
                n += 1;
                sql.push_str(&format!(" AND user_id = ${n}"));
                args.push(SqlValue::Text(uid.clone()));
            }
            None => sql.push_str(" AND user_id IS NULL"),
        }
        if let Some(tid) = &scope.team_id {
            n += 1;
            sql.push_str(&format!(" AND team_id = ${n}"));
            args.push(SqlValue::Text(tid.clone()));
        }
        sql.push_str(" LIMIT 1");

        let row = self.db.fetch_one(&sql, args, None).await.map_err(Self::db_err)?;
        row.as_ref().map(Self::row_to_folder).transpose()
    }

    async fn list_by_scope(&self, scope: &Scope) -> Result<Vec<DocumentFolder>, RepositoryError> {
        let mut sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM document_folders WHERE collection_type = $1"
        );
        let mut args = vec![SqlValue::Text(scope.collection.as_str().to_string())];
        let mut n = 1;

        match &scope.user_id {
            Some(uid) => {
                n += 1;
                sql.push_str(&format!(" AND user_id = ${n}"));
                args.push(SqlValue::Text(uid.clone()));
            }
            None => sql.push_str(" AND user_id IS NULL"),
        }
        if let Some(tid) = &scope.team_id {
            n += 1;
            sql.push_str(&format!(" AND team_id = ${n}"));
            args.push(SqlValue::Text(tid.clone()));
        }
        sql.push_str(" ORDER BY name ASC");

        let rows = self.db.fetch_all(&sql, args, None).await.map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_folder).collect()
    }

    async fn list_all(&self) -> Result<Vec<DocumentFolder>, RepositoryError> {
        let sql = format!("SELECT {FOLDER_COLUMNS} FROM document_folders ORDER BY created_at ASC");
        let rows = self.db.fetch_all(&sql, vec![], None).await.map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_folder).collect()
    }

    async fn subfolders(&self, parent: &FolderId) -> Result<Vec<DocumentFolder>, RepositoryError> {
        let sql = format!(
            "SELECT {FOLDER_COLUMNS} FROM document_folders \
             WHERE parent_folder_id = $1 ORDER BY name ASC"
        );
        let rows = self
            .db
            .fetch_all(&sql, vec![SqlValue::Text(parent.to_string())], None)
            .await
            .map_err(Self::db_err)?;
        rows.iter().map(Self::row_to_folder).collect()
    }

    async fn update_metadata(
        &self,
        id: &FolderId,
        category: Option<&str>,
        tags: Option<&[String]>,
        inherit_tags: Option<bool>,
    ) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE document_folders SET \
                 category = COALESCE($1, category), \
                 tags = COALESCE($2, tags), \
                 inherit_tags = COALESCE($3, inherit_tags), \
                 updated_at = NOW() \
                 WHERE folder_id = $4",
                vec![
                    SqlValue::TextOpt(category.map(|c| c.to_string())),
                    SqlValue::TextArrayOpt(tags.map(|t| t.to_vec())),
                    SqlValue::BoolOpt(inherit_tags),
                    SqlValue::Text(id.to_string()),
                ],
                None,
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: &FolderId) -> Result<bool, RepositoryError> {
        // Children and documents cascade at the database level.
        let affected = self
            .db
            .exec(
                "DELETE FROM document_folders WHERE folder_id = $1",
                vec![SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }
}
