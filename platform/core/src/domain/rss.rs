// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! RSS Domain Model
//!
//! Feeds and articles. A feed's identity is derived from its URL (plus the
//! owning user for user-scoped feeds) so re-adding the same feed converges
//! on one row. `is_polling` is the mutual-exclusion latch: at most one poll
//! per feed is ever in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedId(String);

impl FeedId {
    /// Derive the feed id from its URL and optional owning user.
    pub fn derive(url: &str, user_id: Option<&str>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        if let Some(uid) = user_id {
            hasher.update(b"|");
            hasher.update(uid.as_bytes());
        }
        Self(hex::encode(&hasher.finalize()[..16]))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssFeed {
    pub feed_id: FeedId,
    pub url: String,
    pub name: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Poll interval in seconds.
    pub check_interval: i64,
    pub last_check: Option<DateTime<Utc>>,
    /// Null user = global feed.
    pub user_id: Option<String>,
    pub is_polling: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RssFeed {
    pub fn new(url: impl Into<String>, name: impl Into<String>, user_id: Option<String>) -> Self {
        let url = url.into();
        let now = Utc::now();
        Self {
            feed_id: FeedId::derive(&url, user_id.as_deref()),
            url,
            name: name.into(),
            category: None,
            tags: Vec::new(),
            check_interval: 3600,
            last_check: None,
            user_id,
            is_polling: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleId(String);

impl ArticleId {
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

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssArticle {
    pub article_id: ArticleId,
    pub feed_id: FeedId,
    pub title: String,
    pub description: Option<String>,
    pub full_text: Option<String>,
    pub full_html: Option<String>,
    pub images: Vec<String>,
    pub link: String,
    pub published_date: Option<DateTime<Utc>>,
    pub is_processed: bool,
    pub is_read: bool,
    /// Dedup key over normalized title/link/description.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RssArticle {
    pub fn new(
        feed_id: FeedId,
        title: impl Into<String>,
        link: impl Into<String>,
        description: Option<String>,
        published_date: Option<DateTime<Utc>>,
    ) -> Self {
        let title = title.into();
        let link = link.into();
        let content_hash = article_content_hash(&title, &link, description.as_deref());
        Self {
            article_id: ArticleId::new(),
            feed_id,
            title,
            description,
            full_text: None,
            full_html: None,
            images: Vec::new(),
            link,
            published_date,
            is_processed: false,
            is_read: false,
            content_hash,
            created_at: Utc::now(),
        }
    }
}

/// Content hash for article dedup. Whitespace runs collapse and case folds
/// so that feeds which re-publish with trivial edits do not duplicate.
pub fn article_content_hash(title: &str, link: &str, description: Option<&str>) -> String {
    let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalize(title).as_bytes());
    hasher.update(b"|");
    hasher.update(normalize(link).as_bytes());
    if let Some(desc) = description {
        hasher.update(b"|");
        hasher.update(normalize(desc).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// A per-user subscription to a global feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSubscription {
    pub feed_id: FeedId,
    pub user_id: String,
    pub subscribed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_id_depends_on_scope() {
        let global = FeedId::derive("https://example.com/feed.xml", None);
        let global_again = FeedId::derive("https://example.com/feed.xml", None);
        let alice = FeedId::derive("https://example.com/feed.xml", Some("alice"));
        assert_eq!(global, global_again);
        assert_ne!(global, alice);
    }

    #[test]
    fn article_hash_ignores_whitespace_variants() {
        let a = article_content_hash("Big  News", "https://x/1", Some("body text"));
        let b = article_content_hash("big news", "https://x/1", Some("Body   text"));
        assert_eq!(a, b);
        let c = article_content_hash("big news", "https://x/2", Some("body text"));
        assert_ne!(a, c);
    }
}
