// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the filesystem reconciler: external drops,
//! startup import and orphan cleanup, and on-disk renames.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use citadel_core::application::document_service::{
    DefaultContentProcessor, DocumentService, NoopKnowledgeGraph, UploadOutcome,
};
use citadel_core::application::folder_engine::FolderEngine;
use citadel_core::application::paths::PathResolver;
use citadel_core::application::reconciler::WatchService;
use citadel_core::domain::document::{DocumentId, DocumentType, ProcessingStatus, Scope};
use citadel_core::domain::repository::{DocumentRepository, FolderRepository, UserDirectory};
use citadel_core::infrastructure::event_bus::EventBus;
use citadel_core::infrastructure::memory::{
    InMemoryDocumentRepository, InMemoryFolderRepository, InMemoryUserDirectory,
    InMemoryVectorIndex,
};
use citadel_core::infrastructure::vector::VectorIndex;

struct Harness {
    watch: Arc<WatchService>,
    service: Arc<DocumentService>,
    documents: InMemoryDocumentRepository,
    folders: InMemoryFolderRepository,
    vector: Arc<InMemoryVectorIndex>,
    root: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();

    let users = InMemoryUserDirectory::new();
    users.insert("alice", "uid-alice");

    let documents = InMemoryDocumentRepository::new();
    let folders = InMemoryFolderRepository::new();
    let vector = Arc::new(InMemoryVectorIndex::new());

    let documents_dyn: Arc<dyn DocumentRepository> = Arc::new(documents.clone());
    let folders_dyn: Arc<dyn FolderRepository> = Arc::new(folders.clone());
    let users_dyn: Arc<dyn UserDirectory> = Arc::new(users);
    let paths = Arc::new(PathResolver::new(root.clone(), users_dyn));
    let folder_engine = Arc::new(FolderEngine::new(folders_dyn.clone()));
    let events = EventBus::with_default_capacity();

    let service = DocumentService::new(
        documents_dyn.clone(),
        folder_engine.clone(),
        vector.clone(),
        Arc::new(DefaultContentProcessor),
        Arc::new(NoopKnowledgeGraph),
        events.clone(),
        paths.clone(),
    );

    let watch = WatchService::new(
        service.clone(),
        folder_engine,
        documents_dyn,
        folders_dyn,
        vector.clone(),
        paths,
        events,
    );

    Harness {
        watch,
        service,
        documents,
        folders,
        vector,
        root,
        _dir: dir,
    }
}

async fn wait_for_completed(documents: &InMemoryDocumentRepository, id: &DocumentId) {
    for _ in 0..200 {
        if let Ok(Some(doc)) = documents.get(id).await {
            if doc.processing_status == ProcessingStatus::Completed {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document never completed");
}

#[tokio::test]
async fn external_drop_creates_folder_chain_and_document() {
    let h = harness();

    // Scenario: a file appears under a fresh folder chain on disk.
    let dir = h.root.join("Users/alice/Notes/Weekly");
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("doc.md");
    std::fs::write(&file, "# Hello").unwrap();

    h.watch.handle_file_changed(&file).await.unwrap();

    // Folder chain exists under alice's scope.
    let scope = Scope::user("uid-alice");
    let notes = h
        .folders
        .find_child("Notes", None, &scope)
        .await
        .unwrap()
        .expect("Notes folder");
    let weekly = h
        .folders
        .find_child("Weekly", Some(&notes.folder_id), &scope)
        .await
        .unwrap()
        .expect("Weekly folder");

    // One document row in that folder with the expected shape.
    let doc = h
        .documents
        .find_by_filename_and_context("doc.md", Some("uid-alice"), &scope, Some(&weekly.folder_id))
        .await
        .unwrap()
        .expect("document row");
    assert_eq!(doc.doc_type, DocumentType::Md);
    assert_eq!(doc.file_hash, {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(b"# Hello"))
    });

    wait_for_completed(&h.documents, &doc.document_id).await;

    let points = h.vector.points_for_document(doc.document_id.as_str());
    assert!(!points.is_empty());
    assert_eq!(
        points[0].get("document_filename").and_then(|v| v.as_str()),
        Some("doc.md")
    );
}

#[tokio::test]
async fn startup_reconciliation_imports_and_removes() {
    let h = harness();

    // On disk but not in the database: should import.
    let dir = h.root.join("Global/Research");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("found.md"), "found on disk").unwrap();

    // In the database but not on disk: should be removed (scenario 5).
    let orphan = citadel_core::domain::document::Document::new(
        "x.md",
        DocumentType::Md,
        10,
        "deadbeef",
        Scope::global(),
        None,
    );
    let orphan_id = orphan.document_id.clone();
    h.documents.create_with_folder(&orphan, None).await.unwrap();
    h.vector
        .embed_and_store_chunks(
            &orphan_id,
            &[citadel_core::domain::chunk::Chunk::new(
                orphan_id.clone(),
                0,
                "orphan chunk",
                "native_text",
            )],
            None,
            &Default::default(),
        )
        .await
        .unwrap();

    let report = h.watch.reconcile().await.unwrap();

    assert_eq!(report.files_found, 1);
    assert_eq!(report.imported_folders, 1);
    assert_eq!(report.removed_missing_documents, 1);

    // The orphan is gone everywhere.
    assert!(h.documents.get(&orphan_id).await.unwrap().is_none());
    assert!(h.vector.points_for_document(orphan_id.as_str()).is_empty());

    // The discovered file is tracked.
    let scope = Scope::global();
    let research = h
        .folders
        .find_child("Research", None, &scope)
        .await
        .unwrap()
        .expect("imported folder");
    assert!(h
        .documents
        .find_by_filename_and_context("found.md", None, &scope, Some(&research.folder_id))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn second_reconcile_is_idempotent() {
    let h = harness();
    std::fs::create_dir_all(h.root.join("Global")).unwrap();
    std::fs::write(h.root.join("Global/a.md"), "content a").unwrap();

    let first = h.watch.reconcile().await.unwrap();
    assert_eq!(first.files_found, 1);

    let second = h.watch.reconcile().await.unwrap();
    assert_eq!(second.files_found, 0);
    assert_eq!(second.files_already_tracked, 1);
    assert_eq!(second.removed_missing_documents, 0);
    assert_eq!(h.documents.len(), 1);
}

#[tokio::test]
async fn rename_on_disk_patches_without_reembedding() {
    let h = harness();
    let dir = h.root.join("Global/Alpha");
    std::fs::create_dir_all(&dir).unwrap();
    let old_path = dir.join("a.md");
    std::fs::write(&old_path, "stable content that does not change").unwrap();

    h.watch.handle_file_changed(&old_path).await.unwrap();
    let scope = Scope::global();
    let alpha = h.folders.find_child("Alpha", None, &scope).await.unwrap().unwrap();
    let doc = h
        .documents
        .find_by_filename_and_context("a.md", None, &scope, Some(&alpha.folder_id))
        .await
        .unwrap()
        .unwrap();
    wait_for_completed(&h.documents, &doc.document_id).await;
    let points_before = h.vector.point_count();

    // Plain rename in the same directory.
    let new_path = dir.join("b.md");
    std::fs::rename(&old_path, &new_path).unwrap();
    h.watch.handle_file_moved(&old_path, &new_path).await.unwrap();

    // One row, new filename, payloads patched, no re-embedding.
    assert_eq!(h.documents.len(), 1);
    let renamed = h.documents.get(&doc.document_id).await.unwrap().unwrap();
    assert_eq!(renamed.filename, "b.md");
    assert_eq!(h.vector.point_count(), points_before);
    let points = h.vector.points_for_document(doc.document_id.as_str());
    assert!(points
        .iter()
        .all(|p| p.get("document_filename").and_then(|v| v.as_str()) == Some("b.md")));
}

#[tokio::test]
async fn file_delete_removes_row_and_points() {
    let h = harness();
    std::fs::create_dir_all(h.root.join("Global")).unwrap();
    let file = h.root.join("Global/gone.md");
    std::fs::write(&file, "soon to be deleted").unwrap();

    h.watch.handle_file_changed(&file).await.unwrap();
    let doc = h
        .documents
        .find_by_filename_and_context("gone.md", None, &Scope::global(), None)
        .await
        .unwrap()
        .unwrap();
    wait_for_completed(&h.documents, &doc.document_id).await;

    std::fs::remove_file(&file).unwrap();
    h.watch.handle_file_deleted(&file).await.unwrap();

    assert!(h.documents.get(&doc.document_id).await.unwrap().is_none());
    assert!(h.vector.points_for_document(doc.document_id.as_str()).is_empty());
}

#[tokio::test]
async fn programmatic_move_is_a_noop() {
    let h = harness();
    // A move whose destination already resolves in the database (the
    // application moved the row first) must not duplicate anything.
    let UploadOutcome::Created { .. } = h
        .service
        .upload(b"body", "moved.md", None, Scope::global(), &[])
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };
    let before = h.documents.len();

    let from = h.root.join("Global/old-location.md");
    let to = h.root.join("Global/moved.md");
    h.watch.handle_file_moved(&from, &to).await.unwrap();

    assert_eq!(h.documents.len(), before);
}
