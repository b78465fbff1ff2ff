// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the upload pipeline: dedup short-circuit, the
//! org fast path, status progression, payload enrichment, metadata
//! updates, and the delete round-trip.

use std::sync::Arc;
use std::time::Duration;

use citadel_core::application::document_service::{
    DefaultContentProcessor, DocumentService, NoopKnowledgeGraph, UploadOutcome,
};
use citadel_core::application::folder_engine::FolderEngine;
use citadel_core::application::paths::PathResolver;
use citadel_core::domain::document::{
    DocumentCategory, DocumentFilter, DocumentId, DocumentType, DocumentUpdate, ProcessingStatus,
    Scope,
};
use citadel_core::domain::repository::{DocumentRepository, FolderRepository, UserDirectory};
use citadel_core::infrastructure::event_bus::EventBus;
use citadel_core::infrastructure::memory::{
    InMemoryDocumentRepository, InMemoryFolderRepository, InMemoryUserDirectory,
    InMemoryVectorIndex,
};
use citadel_core::infrastructure::vector::{SearchOptions, VectorIndex};

struct Harness {
    service: Arc<DocumentService>,
    documents: InMemoryDocumentRepository,
    vector: Arc<InMemoryVectorIndex>,
    _root: tempfile::TempDir,
}

fn harness() -> Harness {
    let root = tempfile::tempdir().expect("tempdir");
    let users = InMemoryUserDirectory::new();
    users.insert("alice", "uid-alice");

    let documents = InMemoryDocumentRepository::new();
    let folders = InMemoryFolderRepository::new();
    let vector = Arc::new(InMemoryVectorIndex::new());

    let documents_dyn: Arc<dyn DocumentRepository> = Arc::new(documents.clone());
    let folders_dyn: Arc<dyn FolderRepository> = Arc::new(folders);
    let users_dyn: Arc<dyn UserDirectory> = Arc::new(users);

    let service = DocumentService::new(
        documents_dyn,
        Arc::new(FolderEngine::new(folders_dyn)),
        vector.clone(),
        Arc::new(DefaultContentProcessor),
        Arc::new(NoopKnowledgeGraph),
        EventBus::with_default_capacity(),
        Arc::new(PathResolver::new(root.path(), users_dyn)),
    );

    Harness {
        service,
        documents,
        vector,
        _root: root,
    }
}

async fn wait_for_status(
    documents: &InMemoryDocumentRepository,
    id: &DocumentId,
    status: ProcessingStatus,
) {
    for _ in 0..200 {
        if let Ok(Some(doc)) = documents.get(id).await {
            if doc.processing_status == status {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("document {id} never reached {status:?}");
}

fn chain(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn markdown_upload_completes_with_embeddings() {
    let h = harness();
    let outcome = h
        .service
        .upload(
            b"# Hello\n\nSome markdown body that will be chunked and embedded.",
            "doc.md",
            None,
            Scope::user("uid-alice"),
            &chain(&["Notes", "Weekly"]),
        )
        .await
        .unwrap();

    let UploadOutcome::Created {
        document_id,
        status,
    } = outcome
    else {
        panic!("expected creation");
    };
    assert_eq!(status, ProcessingStatus::Processing);

    wait_for_status(&h.documents, &document_id, ProcessingStatus::Completed).await;

    let doc = h.documents.get(&document_id).await.unwrap().unwrap();
    assert_eq!(doc.doc_type, DocumentType::Md);
    assert!(doc.folder_id.is_some());
    assert!(doc.chunk_count.unwrap_or(0) >= 1);

    let points = h.vector.points_for_document(document_id.as_str());
    assert!(!points.is_empty());
    // Payload enrichment: the filename rides along for search display.
    assert_eq!(
        points[0].get("document_filename").and_then(|v| v.as_str()),
        Some("doc.md")
    );
}

#[tokio::test]
async fn duplicate_upload_short_circuits() {
    let h = harness();
    let bytes = b"identical bytes";

    let first = h
        .service
        .upload(bytes, "a.md", None, Scope::user("uid-alice"), &[])
        .await
        .unwrap();
    let UploadOutcome::Created { document_id, .. } = first else {
        panic!("expected creation");
    };
    wait_for_status(&h.documents, &document_id, ProcessingStatus::Completed).await;
    let points_before = h.vector.point_count();

    let second = h
        .service
        .upload(bytes, "a.md", None, Scope::user("uid-alice"), &[])
        .await
        .unwrap();
    match second {
        UploadOutcome::Duplicate { existing_id, .. } => assert_eq!(existing_id, document_id),
        other => panic!("expected duplicate, got {other:?}"),
    }

    assert_eq!(h.documents.len(), 1);
    assert_eq!(h.vector.point_count(), points_before);
}

#[tokio::test]
async fn org_files_complete_synchronously_without_vectors() {
    let h = harness();
    let outcome = h
        .service
        .upload(
            b"* Heading\nSome org content",
            "notes.org",
            None,
            Scope::global(),
            &[],
        )
        .await
        .unwrap();

    let UploadOutcome::Created {
        document_id,
        status,
    } = outcome
    else {
        panic!("expected creation");
    };
    // Fast path: already completed when the call returns.
    assert_eq!(status, ProcessingStatus::Completed);
    assert_eq!(h.vector.point_count(), 0);
    assert!(h
        .documents
        .get(&document_id)
        .await
        .unwrap()
        .unwrap()
        .processing_status
        == ProcessingStatus::Completed);
}

#[tokio::test]
async fn metadata_update_patches_vector_payloads() {
    let h = harness();
    let UploadOutcome::Created { document_id, .. } = h
        .service
        .upload(
            b"Liberty and the pursuit of happiness, discussed at length.",
            "liberty.md",
            None,
            Scope::global(),
            &[],
        )
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };
    wait_for_status(&h.documents, &document_id, ProcessingStatus::Completed).await;

    h.service
        .update_metadata(
            &document_id,
            &DocumentUpdate {
                category: Some(DocumentCategory::Constitutional),
                tags: Some(vec!["liberty".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Filtered by the new category: hit.
    let hits = h
        .vector
        .search_similar(
            "liberty happiness",
            &SearchOptions {
                limit: 10,
                score_threshold: 0.1,
                filter_category: Some("constitutional".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!hits.is_empty());

    // Filtered by a category it never had: no hit.
    let misses = h
        .vector
        .search_similar(
            "liberty happiness",
            &SearchOptions {
                limit: 10,
                score_threshold: 0.1,
                filter_category: Some("technical".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(misses.is_empty());

    // Tag filters follow the update the same way.
    let by_new_tag = h
        .vector
        .search_similar(
            "liberty happiness",
            &SearchOptions {
                limit: 10,
                score_threshold: 0.1,
                filter_tags: Some(vec!["liberty".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!by_new_tag.is_empty());
    let by_old_tag = h
        .vector
        .search_similar(
            "liberty happiness",
            &SearchOptions {
                limit: 10,
                score_threshold: 0.1,
                filter_tags: Some(vec!["draft".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(by_old_tag.is_empty());
}

#[tokio::test]
async fn upload_list_delete_list_round_trip() {
    let h = harness();
    let UploadOutcome::Created { document_id, .. } = h
        .service
        .upload(
            b"Ephemeral document body",
            "ephemeral.md",
            None,
            Scope::global(),
            &[],
        )
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };
    wait_for_status(&h.documents, &document_id, ProcessingStatus::Completed).await;

    let (listed, total) = h
        .documents
        .filter_documents(&DocumentFilter::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(listed.len(), 1);

    assert!(h.service.delete(&document_id, true).await.unwrap());

    let (listed, total) = h
        .documents
        .filter_documents(&DocumentFilter::default())
        .await
        .unwrap();
    assert_eq!(total, 0);
    assert!(listed.is_empty());
    assert_eq!(h.vector.point_count(), 0);
}

#[tokio::test]
async fn adjacent_chunks_are_annotated_and_penalized() {
    let h = harness();
    // Enough text to produce several chunks.
    let body = (0..40)
        .map(|i| format!("Paragraph {i} about distributed systems and consensus algorithms."))
        .collect::<Vec<_>>()
        .join("\n\n");
    let UploadOutcome::Created { document_id, .. } = h
        .service
        .upload(body.as_bytes(), "dist.md", None, Scope::global(), &[])
        .await
        .unwrap()
    else {
        panic!("expected creation");
    };
    wait_for_status(&h.documents, &document_id, ProcessingStatus::Completed).await;

    let hits = h
        .vector
        .search_similar(
            "consensus algorithms",
            &SearchOptions {
                limit: 1,
                score_threshold: 0.1,
                include_adjacent: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let primary: Vec<_> = hits.iter().filter(|h| !h.is_adjacent).collect();
    let adjacent: Vec<_> = hits.iter().filter(|h| h.is_adjacent).collect();
    assert_eq!(primary.len(), 1);
    assert!(!adjacent.is_empty());
    for neighbor in adjacent {
        assert!((neighbor.chunk_index - primary[0].chunk_index).abs() == 1);
        assert!(neighbor.score < primary[0].score);
    }
}
