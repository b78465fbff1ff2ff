// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path ↔ scope parsing for the upload tree.
//!
//! This is the single implementation used by the watcher, the reconciler,
//! and the folder engine; a second parser would inevitably drift from the
//! hierarchy resolver, so there is no second parser.
//!
//! Layout:
//!
//! ```text
//! <uploads-root>/
//!   Users/<username>/<folder-chain.../>file
//!   Global/<folder-chain.../>file
//!   Teams/<team-id>/documents/<folder-chain.../>file
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::document::Scope;
use crate::domain::repository::UserDirectory;

/// Parsed location of a file or folder inside the upload tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    pub scope: Scope,
    /// Folder-name components from the scope root down, excluding the
    /// filename.
    pub folder_chain: Vec<String>,
    /// Set for file paths, `None` for directory paths.
    pub filename: Option<String>,
}

pub struct PathResolver {
    uploads_root: PathBuf,
    users: Arc<dyn UserDirectory>,
}

impl PathResolver {
    pub fn new(uploads_root: impl Into<PathBuf>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            users,
        }
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    fn components_of(&self, path: &Path) -> Option<Vec<String>> {
        let relative = path.strip_prefix(&self.uploads_root).ok()?;
        Some(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect(),
        )
    }

    /// Parse a file path. Returns `None` when the path is outside the
    /// tree, under an unknown collection directory, or names a user that
    /// does not exist.
    pub async fn parse_file_path(&self, path: &Path) -> Result<Option<PathContext>> {
        self.parse(path, true).await
    }

    /// Parse a directory path (no trailing filename component).
    pub async fn parse_dir_path(&self, path: &Path) -> Result<Option<PathContext>> {
        self.parse(path, false).await
    }

    async fn parse(&self, path: &Path, has_filename: bool) -> Result<Option<PathContext>> {
        let Some(parts) = self.components_of(path) else {
            return Ok(None);
        };
        if parts.is_empty() {
            return Ok(None);
        }

        let (scope, chain_start) = match parts[0].as_str() {
            "Users" => {
                let Some(username) = parts.get(1) else {
                    return Ok(None);
                };
                let Some(user_id) = self.users.user_id_for_username(username).await? else {
                    tracing::warn!(username = %username, "no user id for username in path");
                    return Ok(None);
                };
                (Scope::user(user_id), 2)
            }
            "Global" => (Scope::global(), 1),
            "Teams" => {
                let Some(team_id) = parts.get(1) else {
                    return Ok(None);
                };
                // Only the documents subtree maps to the folder hierarchy.
                if parts.get(2).map(|s| s.as_str()) != Some("documents") {
                    return Ok(None);
                }
                (Scope::team(team_id.clone()), 3)
            }
            _ => return Ok(None),
        };

        let mut chain: Vec<String> = parts[chain_start.min(parts.len())..].to_vec();
        let filename = if has_filename {
            if chain.is_empty() {
                return Ok(None);
            }
            Some(chain.pop().expect("chain checked non-empty"))
        } else {
            None
        };

        Ok(Some(PathContext {
            scope,
            folder_chain: chain,
            filename,
        }))
    }

    /// Reconstruct the on-disk path for a scope + folder chain (+ filename).
    pub async fn tree_path(
        &self,
        scope: &Scope,
        folder_chain: &[String],
        filename: Option<&str>,
    ) -> Result<PathBuf> {
        let mut path = self.uploads_root.clone();
        match (&scope.user_id, &scope.team_id) {
            (Some(user_id), _) => {
                let username = self
                    .users
                    .username_for_user_id(user_id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("no username for user id {user_id}"))?;
                path.push("Users");
                path.push(username);
            }
            (None, Some(team_id)) => {
                path.push("Teams");
                path.push(team_id);
                path.push("documents");
            }
            (None, None) => path.push("Global"),
        }
        for component in folder_chain {
            path.push(component);
        }
        if let Some(filename) = filename {
            path.push(filename);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::InMemoryUserDirectory;

    fn resolver() -> PathResolver {
        let users = InMemoryUserDirectory::new();
        users.insert("alice", "uid-alice");
        PathResolver::new("/uploads", Arc::new(users))
    }

    #[tokio::test]
    async fn user_file_path_parses() {
        let ctx = resolver()
            .parse_file_path(Path::new("/uploads/Users/alice/Notes/Weekly/doc.md"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.scope, Scope::user("uid-alice"));
        assert_eq!(ctx.folder_chain, vec!["Notes".to_string(), "Weekly".to_string()]);
        assert_eq!(ctx.filename.as_deref(), Some("doc.md"));
    }

    #[tokio::test]
    async fn global_root_file_has_empty_chain() {
        let ctx = resolver()
            .parse_file_path(Path::new("/uploads/Global/readme.md"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.scope, Scope::global());
        assert!(ctx.folder_chain.is_empty());
        assert_eq!(ctx.filename.as_deref(), Some("readme.md"));
    }

    #[tokio::test]
    async fn team_documents_parse_and_posts_do_not() {
        let ctx = resolver()
            .parse_file_path(Path::new("/uploads/Teams/t9/documents/Specs/design.pdf"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.scope, Scope::team("t9"));
        assert_eq!(ctx.folder_chain, vec!["Specs".to_string()]);

        let posts = resolver()
            .parse_file_path(Path::new("/uploads/Teams/t9/posts/note.md"))
            .await
            .unwrap();
        assert!(posts.is_none());
    }

    #[tokio::test]
    async fn unknown_user_and_foreign_paths_return_none() {
        let r = resolver();
        assert!(r
            .parse_file_path(Path::new("/uploads/Users/nobody/doc.md"))
            .await
            .unwrap()
            .is_none());
        assert!(r
            .parse_file_path(Path::new("/elsewhere/Users/alice/doc.md"))
            .await
            .unwrap()
            .is_none());
        assert!(r
            .parse_file_path(Path::new("/uploads/Random/doc.md"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn tree_path_round_trips() {
        let r = resolver();
        let ctx = r
            .parse_file_path(Path::new("/uploads/Users/alice/Notes/Weekly/doc.md"))
            .await
            .unwrap()
            .unwrap();
        let rebuilt = r
            .tree_path(&ctx.scope, &ctx.folder_chain, ctx.filename.as_deref())
            .await
            .unwrap();
        assert_eq!(rebuilt, Path::new("/uploads/Users/alice/Notes/Weekly/doc.md"));
    }
}
