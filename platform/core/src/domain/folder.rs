// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Folder Domain Model
//!
//! Folders form a directed tree per scope. Uniqueness is enforced by the
//! database through partial unique indexes whose shape differs for root vs.
//! non-root and user vs. team vs. global folders; [`FolderShape`] names the
//! six shapes so repository code and migrations agree on the conflict
//! targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::document::{CollectionKind, DocumentCategory, Scope};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(String);

impl FolderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFolder {
    pub folder_id: FolderId,
    pub name: String,
    pub parent_folder_id: Option<FolderId>,
    pub user_id: Option<String>,
    pub team_id: Option<String>,
    pub collection: CollectionKind,
    /// Category/tags pushed down to documents dropped into this folder
    /// when `inherit_tags` is set.
    pub category: Option<DocumentCategory>,
    pub tags: Vec<String>,
    pub inherit_tags: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentFolder {
    pub fn new(name: impl Into<String>, parent: Option<FolderId>, scope: Scope) -> Self {
        let now = Utc::now();
        Self {
            folder_id: FolderId::new(),
            name: name.into(),
            parent_folder_id: parent,
            user_id: scope.user_id,
            team_id: scope.team_id,
            collection: scope.collection,
            category: None,
            tags: Vec::new(),
            inherit_tags: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope {
            collection: self.collection,
            user_id: self.user_id.clone(),
            team_id: self.team_id.clone(),
        }
    }

    pub fn shape(&self) -> FolderShape {
        FolderShape::classify(
            self.parent_folder_id.is_some(),
            self.collection,
            self.user_id.is_some(),
            self.team_id.is_some(),
        )
    }
}

/// The six UPSERT shapes. Each maps to one partial unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderShape {
    RootTeam,
    RootUser,
    RootGlobal,
    ChildTeam,
    ChildUser,
    ChildGlobal,
}

impl FolderShape {
    pub fn classify(has_parent: bool, collection: CollectionKind, has_user: bool, has_team: bool) -> Self {
        match (has_parent, collection, has_user, has_team) {
            (false, CollectionKind::Team, _, true) => Self::RootTeam,
            (false, _, true, _) => Self::RootUser,
            (false, _, false, _) => Self::RootGlobal,
            (true, CollectionKind::Team, _, true) => Self::ChildTeam,
            (true, _, true, _) => Self::ChildUser,
            (true, _, false, _) => Self::ChildGlobal,
        }
    }

    /// `ON CONFLICT` clause matching the partial unique index for this shape.
    pub fn conflict_target(&self) -> &'static str {
        match self {
            Self::RootTeam => {
                "(team_id, name, collection_type) WHERE parent_folder_id IS NULL AND team_id IS NOT NULL"
            }
            Self::RootUser => {
                "(user_id, name, collection_type) WHERE parent_folder_id IS NULL AND user_id IS NOT NULL"
            }
            Self::RootGlobal => {
                "(name, collection_type) WHERE parent_folder_id IS NULL AND user_id IS NULL"
            }
            Self::ChildTeam => {
                "(team_id, name, parent_folder_id, collection_type) WHERE parent_folder_id IS NOT NULL AND team_id IS NOT NULL"
            }
            Self::ChildUser => {
                "(user_id, name, parent_folder_id, collection_type) WHERE parent_folder_id IS NOT NULL AND user_id IS NOT NULL"
            }
            Self::ChildGlobal => {
                "(name, parent_folder_id, collection_type) WHERE parent_folder_id IS NOT NULL AND user_id IS NULL"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_classification_covers_all_six() {
        assert_eq!(
            FolderShape::classify(false, CollectionKind::Team, false, true),
            FolderShape::RootTeam
        );
        assert_eq!(
            FolderShape::classify(false, CollectionKind::User, true, false),
            FolderShape::RootUser
        );
        assert_eq!(
            FolderShape::classify(false, CollectionKind::Global, false, false),
            FolderShape::RootGlobal
        );
        assert_eq!(
            FolderShape::classify(true, CollectionKind::Team, false, true),
            FolderShape::ChildTeam
        );
        assert_eq!(
            FolderShape::classify(true, CollectionKind::User, true, false),
            FolderShape::ChildUser
        );
        assert_eq!(
            FolderShape::classify(true, CollectionKind::Global, false, false),
            FolderShape::ChildGlobal
        );
    }

    #[test]
    fn conflict_targets_match_index_predicates() {
        // Root shapes must not reference parent_folder_id in the column list.
        assert!(!FolderShape::RootUser.conflict_target().starts_with("(user_id, name, parent"));
        // Child shapes must include parent_folder_id.
        assert!(FolderShape::ChildUser.conflict_target().contains("parent_folder_id, collection_type"));
        assert!(FolderShape::ChildGlobal
            .conflict_target()
            .contains("WHERE parent_folder_id IS NOT NULL AND user_id IS NULL"));
    }
}
