// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Username ↔ user-id mapping over the `users` table. The path parser
//! needs this to turn `Users/<username>/…` into a user scope.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::repository::{RepositoryError, UserDirectory};
use crate::infrastructure::db::{DatabaseManager, SqlValue};

pub struct PostgresUserDirectory {
    db: Arc<DatabaseManager>,
}

impl PostgresUserDirectory {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn user_id_for_username(&self, username: &str) -> Result<Option<String>, RepositoryError> {
        self.db
            .fetch_val(
                "SELECT user_id FROM users WHERE username = $1",
                vec![SqlValue::Text(username.to_string())],
                None,
            )
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))
    }

    async fn username_for_user_id(&self, user_id: &str) -> Result<Option<String>, RepositoryError> {
        self.db
            .fetch_val(
                "SELECT username FROM users WHERE user_id = $1",
                vec![SqlValue::Text(user_id.to_string())],
                None,
            )
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))
    }
}
