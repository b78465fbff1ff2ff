// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres repository implementations. Every statement goes through the
//! shared [`DatabaseManager`](crate::infrastructure::db::DatabaseManager);
//! statements touching `document_metadata` carry an RLS context.

pub mod postgres_document;
pub mod postgres_folder;
pub mod postgres_rss;
pub mod postgres_users;

pub use postgres_document::PostgresDocumentRepository;
pub use postgres_folder::PostgresFolderRepository;
pub use postgres_rss::{PostgresArticleRepository, PostgresFeedRepository};
pub use postgres_users::PostgresUserDirectory;
