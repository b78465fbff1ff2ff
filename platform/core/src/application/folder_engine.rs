// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Folder Hierarchy Engine
//!
//! Idempotent path → folder-id resolution. Resolution walks the chain one
//! level at a time; creation goes through the repository UPSERT, so any
//! number of concurrent callers racing on the same new directory converge
//! on a single row per level.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::document::Scope;
use crate::domain::folder::{DocumentFolder, FolderId};
use crate::domain::repository::{DocumentRepository, FolderRepository};

pub struct FolderEngine {
    folders: Arc<dyn FolderRepository>,
}

impl FolderEngine {
    pub fn new(folders: Arc<dyn FolderRepository>) -> Self {
        Self { folders }
    }

    pub fn repository(&self) -> &Arc<dyn FolderRepository> {
        &self.folders
    }

    /// Resolve a folder chain to the deepest folder id, creating nothing.
    ///
    /// `Ok(None)` for an empty chain (scope root) and for chains where any
    /// level is missing.
    pub async fn resolve(&self, scope: &Scope, chain: &[String]) -> Result<Option<FolderId>> {
        let mut parent: Option<FolderId> = None;
        for name in chain {
            match self
                .folders
                .find_child(name, parent.as_ref(), scope)
                .await
                .context("folder lookup failed")?
            {
                Some(folder) => parent = Some(folder.folder_id),
                None => {
                    debug!(name = %name, "folder chain breaks here");
                    return Ok(None);
                }
            }
        }
        Ok(parent)
    }

    /// Resolve a chain, creating every missing level idempotently. Returns
    /// the deepest folder, or `None` for an empty chain.
    pub async fn create_or_get_chain(
        &self,
        scope: &Scope,
        chain: &[String],
    ) -> Result<Option<DocumentFolder>> {
        let mut current: Option<DocumentFolder> = None;
        for name in chain {
            let parent_id = current.as_ref().map(|f| f.folder_id.clone());
            let candidate = DocumentFolder::new(name.clone(), parent_id, scope.clone());
            let folder = self
                .folders
                .create_or_get(&candidate)
                .await
                .with_context(|| format!("create-or-get failed for folder '{name}'"))?;
            if folder.folder_id == candidate.folder_id {
                info!(folder = %name, folder_id = %folder.folder_id, "created folder");
            }
            current = Some(folder);
        }
        Ok(current)
    }

    /// Delete a folder. The database cascades to children and documents;
    /// the caller receives the documents that were removed so it can clean
    /// up vector points and files.
    pub async fn delete_folder(
        &self,
        folder_id: &FolderId,
        documents: &Arc<dyn DocumentRepository>,
        scope: &Scope,
    ) -> Result<Vec<crate::domain::document::Document>> {
        let mut removed = Vec::new();
        self.collect_documents(folder_id, documents, scope, &mut removed)
            .await?;
        self.folders
            .delete(folder_id)
            .await
            .context("folder delete failed")?;
        Ok(removed)
    }

    /// Walk the subtree collecting documents, depth-first. Runs before the
    /// delete so the cascade cannot hide the rows from us.
    fn collect_documents<'a>(
        &'a self,
        folder_id: &'a FolderId,
        documents: &'a Arc<dyn DocumentRepository>,
        scope: &'a Scope,
        out: &'a mut Vec<crate::domain::document::Document>,
    ) -> futures::future::BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            out.extend(
                documents
                    .get_documents_by_folder(Some(folder_id), scope)
                    .await?,
            );
            for child in self.folders.subfolders(folder_id).await? {
                self.collect_documents(&child.folder_id, documents, scope, out)
                    .await?;
            }
            Ok(())
        })
    }

    /// Ensure the directory chain exists on disk under the scope root.
    pub async fn ensure_directories(&self, base: &Path, chain: &[String]) -> Result<()> {
        let mut path = base.to_path_buf();
        for component in chain {
            path.push(component);
        }
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("cannot create directory {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::InMemoryFolderRepository;

    fn chain(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn resolve_missing_chain_is_none() {
        let engine = FolderEngine::new(Arc::new(InMemoryFolderRepository::new()));
        let result = engine
            .resolve(&Scope::user("u1"), &chain(&["Notes", "Weekly"]))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn create_then_resolve_round_trips() {
        let engine = FolderEngine::new(Arc::new(InMemoryFolderRepository::new()));
        let scope = Scope::user("u1");
        let created = engine
            .create_or_get_chain(&scope, &chain(&["Notes", "Weekly"]))
            .await
            .unwrap()
            .unwrap();
        let resolved = engine
            .resolve(&scope, &chain(&["Notes", "Weekly"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.folder_id, resolved);
    }

    #[tokio::test]
    async fn creation_is_idempotent() {
        let engine = FolderEngine::new(Arc::new(InMemoryFolderRepository::new()));
        let scope = Scope::global();
        let a = engine
            .create_or_get_chain(&scope, &chain(&["Research"]))
            .await
            .unwrap()
            .unwrap();
        let b = engine
            .create_or_get_chain(&scope, &chain(&["Research"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(a.folder_id, b.folder_id);
    }

    #[tokio::test]
    async fn concurrent_creation_converges_on_one_chain() {
        let repo = Arc::new(InMemoryFolderRepository::new());
        let engine = Arc::new(FolderEngine::new(repo.clone() as Arc<dyn FolderRepository>));
        let scope = Scope::user("u1");
        let deep = chain(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let engine = engine.clone();
            let scope = scope.clone();
            let deep = deep.clone();
            handles.push(tokio::spawn(async move {
                engine.create_or_get_chain(&scope, &deep).await.unwrap().unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().folder_id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all callers must converge on one deepest folder");
        // Exactly 10 folder rows exist, one per level.
        assert_eq!(repo.len(), 10);
    }

    #[tokio::test]
    async fn same_name_in_different_scopes_is_distinct() {
        let engine = FolderEngine::new(Arc::new(InMemoryFolderRepository::new()));
        let a = engine
            .create_or_get_chain(&Scope::user("u1"), &chain(&["Shared"]))
            .await
            .unwrap()
            .unwrap();
        let b = engine
            .create_or_get_chain(&Scope::global(), &chain(&["Shared"]))
            .await
            .unwrap()
            .unwrap();
        assert_ne!(a.folder_id, b.folder_id);
    }
}
