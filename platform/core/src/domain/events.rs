// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain events published over the in-process event bus.
//!
//! These are advisory notifications for UI consumers; a dropped event never
//! affects correctness. Anything authoritative lives in the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::{DocumentId, ProcessingStatus};
use crate::domain::folder::FolderId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    DocumentStatusUpdate {
        document_id: DocumentId,
        status: ProcessingStatus,
        folder_id: Option<FolderId>,
        user_id: Option<String>,
        filename: String,
    },
    FileCreated {
        document_id: DocumentId,
        filename: String,
        folder_id: Option<FolderId>,
        user_id: Option<String>,
    },
    FileDeleted {
        document_id: DocumentId,
        filename: String,
        user_id: Option<String>,
    },
    FolderCreated {
        folder_id: FolderId,
        name: String,
        user_id: Option<String>,
    },
    FolderDeleted {
        folder_id: FolderId,
        name: String,
        user_id: Option<String>,
    },
    FolderMoved {
        folder_id: FolderId,
        name: String,
        user_id: Option<String>,
    },
    /// Fallback when the watcher saw a tree change it cannot attribute to a
    /// specific row; clients should re-sync.
    FolderTreeRefresh {
        at: DateTime<Utc>,
    },
}

impl PlatformEvent {
    pub fn tree_refresh() -> Self {
        Self::FolderTreeRefresh { at: Utc::now() }
    }
}
