// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Filesystem Reconciler & Watch Service
//!
//! Keeps the on-disk tree and the metadata store aligned, in two modes:
//!
//! 1. **Startup reconciliation**, which runs to completion before the live
//!    observer starts, in strict order: import missing folders, import
//!    missing files, delete folder rows with no directory, delete document
//!    rows with no file. Reversing the import passes loses files; running
//!    deletions before imports races live events.
//! 2. **Live watching**, where created/modified file events debounce for
//!    two seconds and then process in parallel with per-file error
//!    isolation; deletes and moves apply immediately.
//!
//! The path parser used here is the same `PathResolver` the folder engine
//! uses, so disk paths and folder rows cannot disagree about scope.

use anyhow::Result;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::application::document_service::{DocumentService, UploadOutcome};
use crate::application::folder_engine::FolderEngine;
use crate::application::paths::PathResolver;
use crate::domain::document::DocumentUpdate;
use crate::domain::events::PlatformEvent;
use crate::domain::repository::{DocumentRepository, FolderRepository};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::vector::VectorIndex;
use crate::infrastructure::watcher::{
    DebounceQueue, PathFilter, WatchEvent, DEBOUNCE_WINDOW,
};

const RECONCILE_PAGE_SIZE: i64 = 500;

#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    pub files_found: usize,
    pub files_already_tracked: usize,
    pub imported_folders: usize,
    pub removed_missing_folders: usize,
    pub removed_missing_documents: usize,
}

pub struct WatchService {
    service: Arc<DocumentService>,
    folder_engine: Arc<FolderEngine>,
    documents: Arc<dyn DocumentRepository>,
    folders: Arc<dyn FolderRepository>,
    vector: Arc<dyn VectorIndex>,
    paths: Arc<PathResolver>,
    events: EventBus,
    filter: PathFilter,
    debounce: Mutex<DebounceQueue>,
}

impl WatchService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service: Arc<DocumentService>,
        folder_engine: Arc<FolderEngine>,
        documents: Arc<dyn DocumentRepository>,
        folders: Arc<dyn FolderRepository>,
        vector: Arc<dyn VectorIndex>,
        paths: Arc<PathResolver>,
        events: EventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            service,
            folder_engine,
            documents,
            folders,
            vector,
            paths,
            events,
            filter: PathFilter,
            debounce: Mutex::new(DebounceQueue::new()),
        })
    }

    // ==================================================================
    // Startup reconciliation
    // ==================================================================

    /// Run all four passes. Must complete before `run` is started.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        self.import_missing_folders(&mut report).await?;
        self.import_missing_files(&mut report).await?;
        self.cleanup_missing_folders(&mut report).await?;
        self.cleanup_missing_documents(&mut report).await?;

        info!(
            found = report.files_found,
            already_tracked = report.files_already_tracked,
            imported_folders = report.imported_folders,
            removed_missing_folders = report.removed_missing_folders,
            removed_missing_documents = report.removed_missing_documents,
            "startup reconciliation complete"
        );
        Ok(report)
    }

    /// Pass 1: every directory on disk gets a folder row chain.
    async fn import_missing_folders(&self, report: &mut ReconcileReport) -> Result<()> {
        let root = self.paths.uploads_root().to_path_buf();
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_dir() || entry.path() == root {
                continue;
            }
            if self.filter.should_ignore(entry.path(), true) {
                continue;
            }
            let Some(ctx) = self.paths.parse_dir_path(entry.path()).await? else {
                continue;
            };
            if ctx.folder_chain.is_empty() {
                continue;
            }
            let existing = self
                .folder_engine
                .resolve(&ctx.scope, &ctx.folder_chain)
                .await?;
            if existing.is_none() {
                self.folder_engine
                    .create_or_get_chain(&ctx.scope, &ctx.folder_chain)
                    .await?;
                report.imported_folders += 1;
            }
        }
        Ok(())
    }

    /// Pass 2: every permitted file on disk gets a document row, via the
    /// same path a live-created event takes.
    async fn import_missing_files(&self, report: &mut ReconcileReport) -> Result<()> {
        let root = self.paths.uploads_root().to_path_buf();
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if self.filter.should_ignore(entry.path(), false) {
                continue;
            }
            let Some(ctx) = self.paths.parse_file_path(entry.path()).await? else {
                continue;
            };
            let filename = ctx.filename.as_deref().unwrap_or_default();

            let folder_id = self
                .folder_engine
                .resolve(&ctx.scope, &ctx.folder_chain)
                .await?;
            let existing = self
                .documents
                .find_by_filename_and_context(
                    filename,
                    ctx.scope.user_id.as_deref(),
                    &ctx.scope,
                    folder_id.as_ref(),
                )
                .await?;

            match existing {
                Some(doc) => {
                    report.files_already_tracked += 1;
                    // Repair rows whose folder id drifted from the tree.
                    if doc.folder_id != folder_id {
                        self.documents
                            .update(
                                &doc.document_id,
                                &DocumentUpdate {
                                    folder_id: Some(folder_id.clone()),
                                    ..Default::default()
                                },
                            )
                            .await?;
                    }
                }
                None => {
                    report.files_found += 1;
                    if let Err(e) = self.handle_new_file(entry.path()).await {
                        warn!(path = %entry.path().display(), error = %e, "import failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Pass 3: folder rows whose directory is gone are deleted (cascades).
    /// Team folders are application-managed and exempt.
    async fn cleanup_missing_folders(&self, report: &mut ReconcileReport) -> Result<()> {
        for folder in self.folders.list_all().await? {
            if folder.team_id.is_some() {
                continue;
            }
            let Some(chain) = self.service.folder_chain_of(&folder.folder_id).await? else {
                continue;
            };
            let path = match self.paths.tree_path(&folder.scope(), &chain, None).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(folder_id = %folder.folder_id, error = %e, "cannot reconstruct folder path");
                    continue;
                }
            };
            if !path.exists() {
                // Vector cleanup for every document the cascade removes.
                let removed = self
                    .folder_engine
                    .delete_folder(&folder.folder_id, &self.documents, &folder.scope())
                    .await?;
                for doc in &removed {
                    if let Err(e) = self
                        .vector
                        .delete_document_chunks(&doc.document_id, doc.user_id.as_deref())
                        .await
                    {
                        warn!(document_id = %doc.document_id, error = %e, "vector cleanup failed");
                    }
                }
                report.removed_missing_folders += 1;
            }
        }
        Ok(())
    }

    /// Pass 4: document rows whose file is gone lose their vector points
    /// and their row.
    async fn cleanup_missing_documents(&self, report: &mut ReconcileReport) -> Result<()> {
        let mut offset = 0i64;
        loop {
            let page = self
                .documents
                .list_all_paginated(offset, RECONCILE_PAGE_SIZE)
                .await?;
            if page.is_empty() {
                break;
            }
            for doc in &page {
                let missing = match self.service.document_path(doc).await {
                    Ok(Some(path)) => !path.exists(),
                    // No reconstructable path: the folder row is gone.
                    Ok(None) => true,
                    Err(e) => {
                        warn!(document_id = %doc.document_id, error = %e, "cannot reconstruct document path");
                        continue;
                    }
                };
                if missing {
                    if let Err(e) = self
                        .vector
                        .delete_document_chunks(&doc.document_id, doc.user_id.as_deref())
                        .await
                    {
                        warn!(document_id = %doc.document_id, error = %e, "vector cleanup failed");
                    }
                    self.documents
                        .delete(&doc.document_id, doc.user_id.as_deref())
                        .await?;
                    report.removed_missing_documents += 1;
                }
            }
            offset += page.len() as i64;
        }
        Ok(())
    }

    // ==================================================================
    // Live watching
    // ==================================================================

    /// Consume normalized watch events until cancelled. Created/modified
    /// file events debounce; everything else applies immediately.
    pub async fn run(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<WatchEvent>,
        cancel: CancellationToken,
    ) {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.process_due().await,
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event).await;
                }
            }
        }
        info!("watch service stopped");
    }

    async fn dispatch(&self, event: WatchEvent) {
        match event {
            WatchEvent::FileCreated(path) | WatchEvent::FileModified(path) => {
                self.debounce.lock().await.touch(path);
            }
            WatchEvent::FileDeleted(path) => {
                self.debounce.lock().await.remove(&path);
                if let Err(e) = self.handle_file_deleted(&path).await {
                    error!(path = %path.display(), error = %e, "delete handling failed");
                }
            }
            WatchEvent::FileMoved { from, to } => {
                self.debounce.lock().await.remove(&from);
                if let Err(e) = self.handle_file_moved(&from, &to).await {
                    error!(from = %from.display(), to = %to.display(), error = %e, "move handling failed");
                }
            }
            WatchEvent::DirCreated(path) => {
                if let Err(e) = self.handle_dir_created(&path).await {
                    error!(path = %path.display(), error = %e, "folder create handling failed");
                }
            }
            WatchEvent::DirDeleted(path) => {
                if let Err(e) = self.handle_dir_deleted(&path).await {
                    error!(path = %path.display(), error = %e, "folder delete handling failed");
                }
            }
            WatchEvent::DirMoved { from, to } => {
                if let Err(e) = self.handle_dir_moved(&from, &to).await {
                    error!(from = %from.display(), to = %to.display(), error = %e, "folder move handling failed");
                }
            }
        }
    }

    /// Promote debounced paths and process them in parallel. One file's
    /// failure never blocks the others.
    async fn process_due(&self) {
        let ready = self.debounce.lock().await.drain_ready(DEBOUNCE_WINDOW);
        if ready.is_empty() {
            return;
        }
        info!(count = ready.len(), "processing debounced file events");
        let tasks = ready.into_iter().map(|path| async move {
            if let Err(e) = self.handle_file_changed(&path).await {
                error!(path = %path.display(), error = %e, "file event failed");
            }
        });
        join_all(tasks).await;
    }

    /// Created or modified after debounce: create the row if unknown,
    /// otherwise re-ingest in place.
    pub async fn handle_file_changed(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        let Some(ctx) = self.paths.parse_file_path(path).await? else {
            return Ok(());
        };
        let filename = ctx.filename.as_deref().unwrap_or_default();
        let folder_id = self
            .folder_engine
            .resolve(&ctx.scope, &ctx.folder_chain)
            .await?;
        let existing = self
            .documents
            .find_by_filename_and_context(
                filename,
                ctx.scope.user_id.as_deref(),
                &ctx.scope,
                folder_id.as_ref(),
            )
            .await?;

        match existing {
            Some(doc) => self.service.reingest(&doc.document_id, path).await,
            None => self.handle_new_file(path).await.map(|_| ()),
        }
    }

    async fn handle_new_file(&self, path: &Path) -> Result<Option<UploadOutcome>> {
        let Some(ctx) = self.paths.parse_file_path(path).await? else {
            return Ok(None);
        };
        let filename = ctx.filename.clone().unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;
        let outcome = self
            .service
            .upload(&bytes, &filename, None, ctx.scope.clone(), &ctx.folder_chain)
            .await?;

        if let UploadOutcome::Created { document_id, .. } = &outcome {
            self.events.publish(PlatformEvent::FileCreated {
                document_id: document_id.clone(),
                filename,
                folder_id: self
                    .folder_engine
                    .resolve(&ctx.scope, &ctx.folder_chain)
                    .await?,
                user_id: ctx.scope.user_id.clone(),
            });
        }
        Ok(Some(outcome))
    }

    pub async fn handle_file_deleted(&self, path: &Path) -> Result<()> {
        let Some(ctx) = self.paths.parse_file_path(path).await? else {
            return Ok(());
        };
        let filename = ctx.filename.as_deref().unwrap_or_default();
        let folder_id = self
            .folder_engine
            .resolve(&ctx.scope, &ctx.folder_chain)
            .await?;
        let Some(doc) = self
            .documents
            .find_by_filename_and_context(
                filename,
                ctx.scope.user_id.as_deref(),
                &ctx.scope,
                folder_id.as_ref(),
            )
            .await?
        else {
            return Ok(());
        };

        // The file is already gone; delete points, row, and entities.
        self.service.delete(&doc.document_id, false).await?;
        Ok(())
    }

    /// Moved or renamed. A destination that already resolves in the
    /// database means a programmatic move that updated the row first;
    /// nothing to do. A plain rename patches the filename; anything else
    /// is delete-then-create.
    pub async fn handle_file_moved(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(ctx) = self.paths.parse_file_path(to).await? {
            let folder_id = self
                .folder_engine
                .resolve(&ctx.scope, &ctx.folder_chain)
                .await?;
            let dest_doc = self
                .documents
                .find_by_filename_and_context(
                    ctx.filename.as_deref().unwrap_or_default(),
                    ctx.scope.user_id.as_deref(),
                    &ctx.scope,
                    folder_id.as_ref(),
                )
                .await?;
            if dest_doc.is_some() {
                return Ok(());
            }

            // Plain rename: same directory, same scope, source row known.
            if from.parent() == to.parent() {
                if let Some(from_ctx) = self.paths.parse_file_path(from).await? {
                    let from_folder = self
                        .folder_engine
                        .resolve(&from_ctx.scope, &from_ctx.folder_chain)
                        .await?;
                    if let Some(doc) = self
                        .documents
                        .find_by_filename_and_context(
                            from_ctx.filename.as_deref().unwrap_or_default(),
                            from_ctx.scope.user_id.as_deref(),
                            &from_ctx.scope,
                            from_folder.as_ref(),
                        )
                        .await?
                    {
                        let new_name = ctx.filename.as_deref().unwrap_or_default();
                        self.service.rename(&doc.document_id, new_name).await?;
                        return Ok(());
                    }
                }
            }
        }

        self.handle_file_deleted(from).await?;
        self.handle_new_file(to).await?;
        Ok(())
    }

    pub async fn handle_dir_created(&self, path: &Path) -> Result<()> {
        let Some(ctx) = self.paths.parse_dir_path(path).await? else {
            return Ok(());
        };
        if ctx.folder_chain.is_empty() {
            return Ok(());
        }
        if let Some(folder) = self
            .folder_engine
            .create_or_get_chain(&ctx.scope, &ctx.folder_chain)
            .await?
        {
            self.events.publish(PlatformEvent::FolderCreated {
                folder_id: folder.folder_id,
                name: folder.name,
                user_id: ctx.scope.user_id.clone(),
            });
        }
        Ok(())
    }

    pub async fn handle_dir_deleted(&self, path: &Path) -> Result<()> {
        let Some(ctx) = self.paths.parse_dir_path(path).await? else {
            return Ok(());
        };
        match self
            .folder_engine
            .resolve(&ctx.scope, &ctx.folder_chain)
            .await?
        {
            Some(folder_id) => {
                let name = ctx.folder_chain.last().cloned().unwrap_or_default();
                let removed = self
                    .folder_engine
                    .delete_folder(&folder_id, &self.documents, &ctx.scope)
                    .await?;
                for doc in &removed {
                    if let Err(e) = self
                        .vector
                        .delete_document_chunks(&doc.document_id, doc.user_id.as_deref())
                        .await
                    {
                        warn!(document_id = %doc.document_id, error = %e, "vector cleanup failed");
                    }
                    let _ = self
                        .documents
                        .delete(&doc.document_id, doc.user_id.as_deref())
                        .await;
                }
                self.events.publish(PlatformEvent::FolderDeleted {
                    folder_id,
                    name,
                    user_id: ctx.scope.user_id.clone(),
                });
            }
            None => {
                // Unknown to the database; ask clients to re-sync.
                self.events.publish(PlatformEvent::tree_refresh());
            }
        }
        Ok(())
    }

    pub async fn handle_dir_moved(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(ctx) = self.paths.parse_dir_path(to).await? {
            if self
                .folder_engine
                .resolve(&ctx.scope, &ctx.folder_chain)
                .await?
                .is_some()
            {
                // Programmatic move already reflected in the database.
                return Ok(());
            }
        }
        self.handle_dir_deleted(from).await?;
        self.handle_dir_created(to).await?;
        // Files under the new location arrive as their own events; a
        // refresh covers clients in the meantime.
        self.events.publish(PlatformEvent::tree_refresh());
        Ok(())
    }
}
