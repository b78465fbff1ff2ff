// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL RSS Repositories
//!
//! Feeds and articles. The poll latch is a compare-and-set on
//! `is_polling`: the UPDATE's WHERE clause is the whole mutual-exclusion
//! protocol, rows-affected is the verdict. Every latch transition also
//! bumps `updated_at` so the stuck-feed predicate stays accurate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::sync::Arc;

use crate::domain::repository::{ArticleRepository, FeedRepository, RepositoryError};
use crate::domain::rss::{ArticleId, FeedId, RssArticle, RssFeed};
use crate::infrastructure::db::{DatabaseManager, SqlValue};

const FEED_COLUMNS: &str =
    "feed_id, url, name, category, tags, check_interval, last_check, user_id, is_polling, \
     created_at, updated_at";

const ARTICLE_COLUMNS: &str =
    "article_id, feed_id, title, description, full_text, full_html, images, link, \
     published_date, is_processed, is_read, content_hash, created_at";

fn db_err(e: crate::infrastructure::db::DbError) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

pub struct PostgresFeedRepository {
    db: Arc<DatabaseManager>,
}

impl PostgresFeedRepository {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    fn row_to_feed(row: &PgRow) -> Result<RssFeed, RepositoryError> {
        let map_err = |e: sqlx::Error| RepositoryError::Database(e.to_string());
        let feed_id: String = row.try_get("feed_id").map_err(map_err)?;
        Ok(RssFeed {
            feed_id: FeedId::from_string(feed_id),
            url: row.try_get("url").map_err(map_err)?,
            name: row.try_get("name").map_err(map_err)?,
            category: row.try_get("category").map_err(map_err)?,
            tags: row
                .try_get::<Option<Vec<String>>, _>("tags")
                .map_err(map_err)?
                .unwrap_or_default(),
            check_interval: row.try_get("check_interval").map_err(map_err)?,
            last_check: row.try_get("last_check").map_err(map_err)?,
            user_id: row.try_get("user_id").map_err(map_err)?,
            is_polling: row
                .try_get::<Option<bool>, _>("is_polling")
                .map_err(map_err)?
                .unwrap_or(false),
            created_at: row.try_get("created_at").map_err(map_err)?,
            updated_at: row.try_get("updated_at").map_err(map_err)?,
        })
    }
}

#[async_trait]
impl FeedRepository for PostgresFeedRepository {
    async fn upsert(&self, feed: &RssFeed) -> Result<(), RepositoryError> {
        let sql = format!(
            "INSERT INTO rss_feeds ({FEED_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (feed_id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 category = EXCLUDED.category, \
                 tags = EXCLUDED.tags, \
                 check_interval = EXCLUDED.check_interval, \
                 updated_at = EXCLUDED.updated_at"
        );
        self.db
            .exec(
                &sql,
                vec![
                    SqlValue::Text(feed.feed_id.to_string()),
                    SqlValue::Text(feed.url.clone()),
                    SqlValue::Text(feed.name.clone()),
                    SqlValue::TextOpt(feed.category.clone()),
                    SqlValue::TextArray(feed.tags.clone()),
                    SqlValue::I64(feed.check_interval),
                    SqlValue::TimestampOpt(feed.last_check),
                    SqlValue::TextOpt(feed.user_id.clone()),
                    SqlValue::Bool(feed.is_polling),
                    SqlValue::Timestamp(feed.created_at),
                    SqlValue::Timestamp(feed.updated_at),
                ],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn get(&self, id: &FeedId) -> Result<Option<RssFeed>, RepositoryError> {
        let sql = format!("SELECT {FEED_COLUMNS} FROM rss_feeds WHERE feed_id = $1");
        let row = self
            .db
            .fetch_one(&sql, vec![SqlValue::Text(id.to_string())], None)
            .await
            .map_err(db_err)?;
        row.as_ref().map(Self::row_to_feed).transpose()
    }

    async fn list(&self, user_id: Option<&str>) -> Result<Vec<RssFeed>, RepositoryError> {
        let (sql, args) = match user_id {
            Some(uid) => (
                format!("SELECT {FEED_COLUMNS} FROM rss_feeds WHERE user_id = $1 ORDER BY name ASC"),
                vec![SqlValue::Text(uid.to_string())],
            ),
            None => (
                format!("SELECT {FEED_COLUMNS} FROM rss_feeds WHERE user_id IS NULL ORDER BY name ASC"),
                vec![],
            ),
        };
        let rows = self.db.fetch_all(&sql, args, None).await.map_err(db_err)?;
        rows.iter().map(Self::row_to_feed).collect()
    }

    async fn feeds_needing_poll(&self, user_id: Option<&str>) -> Result<Vec<RssFeed>, RepositoryError> {
        let scope_clause = match user_id {
            Some(_) => "user_id = $1 AND ",
            None => "",
        };
        let sql = format!(
            "SELECT {FEED_COLUMNS} FROM rss_feeds \
             WHERE {scope_clause}(last_check IS NULL OR \
                    last_check + (check_interval || ' seconds')::interval < NOW()) \
               AND (is_polling IS NULL OR is_polling = false) \
             ORDER BY last_check ASC NULLS FIRST \
             LIMIT 10"
        );
        let args = match user_id {
            Some(uid) => vec![SqlValue::Text(uid.to_string())],
            None => vec![],
        };
        let rows = self.db.fetch_all(&sql, args, None).await.map_err(db_err)?;
        rows.iter().map(Self::row_to_feed).collect()
    }

    async fn try_claim(&self, id: &FeedId) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE rss_feeds SET is_polling = true, updated_at = NOW() \
                 WHERE feed_id = $1 AND (is_polling IS NULL OR is_polling = false)",
                vec![SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    async fn release(&self, id: &FeedId) -> Result<(), RepositoryError> {
        self.db
            .exec(
                "UPDATE rss_feeds SET last_check = NOW(), is_polling = false, updated_at = NOW() \
                 WHERE feed_id = $1",
                vec![SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn release_without_progress(&self, id: &FeedId) -> Result<(), RepositoryError> {
        self.db
            .exec(
                "UPDATE rss_feeds SET is_polling = false, updated_at = NOW() WHERE feed_id = $1",
                vec![SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn reset_stuck(&self, stuck_for: chrono::Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - stuck_for;
        self.db
            .exec(
                "UPDATE rss_feeds SET is_polling = false, updated_at = NOW() \
                 WHERE is_polling = true AND updated_at < $1",
                vec![SqlValue::Timestamp(cutoff)],
                None,
            )
            .await
            .map_err(db_err)
    }

    async fn delete(&self, id: &FeedId) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "DELETE FROM rss_feeds WHERE feed_id = $1",
                vec![SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }
}

pub struct PostgresArticleRepository {
    db: Arc<DatabaseManager>,
}

impl PostgresArticleRepository {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    fn row_to_article(row: &PgRow) -> Result<RssArticle, RepositoryError> {
        let map_err = |e: sqlx::Error| RepositoryError::Database(e.to_string());
        let article_id: String = row.try_get("article_id").map_err(map_err)?;
        let feed_id: String = row.try_get("feed_id").map_err(map_err)?;
        Ok(RssArticle {
            article_id: ArticleId::from_string(article_id),
            feed_id: FeedId::from_string(feed_id),
            title: row.try_get("title").map_err(map_err)?,
            description: row.try_get("description").map_err(map_err)?,
            full_text: row.try_get("full_text").map_err(map_err)?,
            full_html: row.try_get("full_html").map_err(map_err)?,
            images: row
                .try_get::<Option<Vec<String>>, _>("images")
                .map_err(map_err)?
                .unwrap_or_default(),
            link: row.try_get("link").map_err(map_err)?,
            published_date: row.try_get("published_date").map_err(map_err)?,
            is_processed: row.try_get("is_processed").map_err(map_err)?,
            is_read: row.try_get("is_read").map_err(map_err)?,
            content_hash: row.try_get("content_hash").map_err(map_err)?,
            created_at: row.try_get("created_at").map_err(map_err)?,
        })
    }
}

#[async_trait]
impl ArticleRepository for PostgresArticleRepository {
    async fn insert_if_new(&self, article: &RssArticle) -> Result<bool, RepositoryError> {
        // Dedup by (feed_id, content_hash) OR (feed_id, link).
        let exists: Option<i64> = self
            .db
            .fetch_val(
                "SELECT 1 FROM rss_articles \
                 WHERE feed_id = $1 AND (content_hash = $2 OR link = $3) LIMIT 1",
                vec![
                    SqlValue::Text(article.feed_id.to_string()),
                    SqlValue::Text(article.content_hash.clone()),
                    SqlValue::Text(article.link.clone()),
                ],
                None,
            )
            .await
            .map_err(db_err)?;
        if exists.is_some() {
            return Ok(false);
        }

        let sql = format!(
            "INSERT INTO rss_articles ({ARTICLE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT DO NOTHING"
        );
        let affected = self
            .db
            .exec(
                &sql,
                vec![
                    SqlValue::Text(article.article_id.to_string()),
                    SqlValue::Text(article.feed_id.to_string()),
                    SqlValue::Text(article.title.clone()),
                    SqlValue::TextOpt(article.description.clone()),
                    SqlValue::TextOpt(article.full_text.clone()),
                    SqlValue::TextOpt(article.full_html.clone()),
                    SqlValue::TextArray(article.images.clone()),
                    SqlValue::Text(article.link.clone()),
                    SqlValue::TimestampOpt(article.published_date),
                    SqlValue::Bool(article.is_processed),
                    SqlValue::Bool(article.is_read),
                    SqlValue::Text(article.content_hash.clone()),
                    SqlValue::Timestamp(article.created_at),
                ],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    async fn get(&self, id: &ArticleId) -> Result<Option<RssArticle>, RepositoryError> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM rss_articles WHERE article_id = $1");
        let row = self
            .db
            .fetch_one(&sql, vec![SqlValue::Text(id.to_string())], None)
            .await
            .map_err(db_err)?;
        row.as_ref().map(Self::row_to_article).transpose()
    }

    async fn set_full_content(
        &self,
        id: &ArticleId,
        full_text: &str,
        full_html: Option<&str>,
        images: &[String],
    ) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE rss_articles SET full_text = $1, full_html = $2, images = $3 \
                 WHERE article_id = $4",
                vec![
                    SqlValue::Text(full_text.to_string()),
                    SqlValue::TextOpt(full_html.map(|h| h.to_string())),
                    SqlValue::TextArray(images.to_vec()),
                    SqlValue::Text(id.to_string()),
                ],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    async fn mark_processed(&self, id: &ArticleId) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE rss_articles SET is_processed = true WHERE article_id = $1",
                vec![SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    async fn mark_read(&self, id: &ArticleId, read: bool) -> Result<bool, RepositoryError> {
        let affected = self
            .db
            .exec(
                "UPDATE rss_articles SET is_read = $1 WHERE article_id = $2",
                vec![SqlValue::Bool(read), SqlValue::Text(id.to_string())],
                None,
            )
            .await
            .map_err(db_err)?;
        Ok(affected > 0)
    }

    async fn list_by_feed(&self, feed: &FeedId, limit: i64) -> Result<Vec<RssArticle>, RepositoryError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM rss_articles WHERE feed_id = $1 \
             ORDER BY published_date DESC NULLS LAST LIMIT $2"
        );
        let rows = self
            .db
            .fetch_all(
                &sql,
                vec![SqlValue::Text(feed.to_string()), SqlValue::I64(limit)],
                None,
            )
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_article).collect()
    }

    async fn list_unprocessed(&self, limit: i64) -> Result<Vec<RssArticle>, RepositoryError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM rss_articles WHERE is_processed = false \
             ORDER BY created_at ASC LIMIT $1"
        );
        let rows = self
            .db
            .fetch_all(&sql, vec![SqlValue::I64(limit)], None)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_article).collect()
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<RssArticle>, RepositoryError> {
        let sql = format!(
            "DELETE FROM rss_articles \
             WHERE COALESCE(published_date, created_at) < $1 \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let rows = self
            .db
            .fetch_all(&sql, vec![SqlValue::Timestamp(cutoff)], None)
            .await
            .map_err(db_err)?;
        rows.iter().map(Self::row_to_article).collect()
    }
}
