// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # RSS Scheduler & Ingestor
//!
//! Interval-driven feed polling with per-feed mutual exclusion. Entry is a
//! compare-and-set on `is_polling`; release happens on every exit path,
//! including cancellation, via a scope guard whose drop handler runs even
//! when the future is dropped mid-poll. A cleanup task resets feeds stuck
//! polling past the timeout, and a retention task purges old articles and
//! their derived documents.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::document_service::{DocumentService, UploadOutcome};
use crate::application::task_fabric::{TaskFabric, TaskHandler, TaskSpec};
use crate::config::RssSettings;
use crate::domain::document::{DocumentType, Scope};
use crate::domain::repository::{ArticleRepository, FeedRepository};
use crate::domain::rss::{ArticleId, FeedId, RssArticle, RssFeed};
use crate::infrastructure::crawler::Crawler;

/// Outcome of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// This caller won the latch and polled; n new articles were saved.
    Polled { new_articles: usize },
    /// Another poll holds the latch; fast rejection, nothing fetched.
    AlreadyPolling,
    /// The poll interval has not elapsed yet.
    NotDue,
    /// Feed id unknown.
    NotFound,
}

pub struct RssService {
    feeds: Arc<dyn FeedRepository>,
    articles: Arc<dyn ArticleRepository>,
    documents: Arc<DocumentService>,
    crawler: Crawler,
    http: reqwest::Client,
    settings: RssSettings,
    /// Self-handle for detaching the initial forced poll.
    weak: std::sync::Weak<RssService>,
}

impl RssService {
    pub fn new(
        feeds: Arc<dyn FeedRepository>,
        articles: Arc<dyn ArticleRepository>,
        documents: Arc<DocumentService>,
        settings: RssSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            feeds,
            articles,
            documents,
            crawler: Crawler::new(),
            http: reqwest::Client::new(),
            settings,
            weak: weak.clone(),
        })
    }

    pub fn feeds(&self) -> &Arc<dyn FeedRepository> {
        &self.feeds
    }

    pub fn articles(&self) -> &Arc<dyn ArticleRepository> {
        &self.articles
    }

    // ------------------------------------------------------------------
    // Feed management
    // ------------------------------------------------------------------

    /// Create (or update) a feed and poll it immediately.
    pub async fn create_feed(
        &self,
        url: &str,
        name: &str,
        user_id: Option<String>,
    ) -> Result<RssFeed> {
        let feed = RssFeed::new(url, name, user_id);
        self.feeds.upsert(&feed).await?;
        info!(feed_id = %feed.feed_id, url, "feed created, forcing initial poll");

        if let Some(service) = self.weak.upgrade() {
            let feed_id = feed.feed_id.clone();
            tokio::spawn(async move {
                if let Err(e) = service.poll_feed(&feed_id, true).await {
                    warn!(feed_id = %feed_id, error = %e, "initial poll failed");
                }
            });
        }
        Ok(feed)
    }

    // ------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------

    /// Poll every eligible feed once. Feeds poll concurrently with each
    /// other; each individual feed is protected by its latch.
    pub async fn poll_eligible(&self) -> Result<usize> {
        let eligible = self.feeds.feeds_needing_poll(None).await?;
        let count = eligible.len();
        let polls = eligible.iter().map(|feed| async move {
            if let Err(e) = self.poll_feed(&feed.feed_id, false).await {
                warn!(feed_id = %feed.feed_id, error = %e, "poll failed");
            }
        });
        futures::future::join_all(polls).await;
        Ok(count)
    }

    /// Poll one feed. `force` skips the interval check but never the
    /// latch: two polls for the same feed cannot overlap.
    pub async fn poll_feed(&self, feed_id: &FeedId, force: bool) -> Result<PollOutcome> {
        let Some(feed) = self.feeds.get(feed_id).await? else {
            return Ok(PollOutcome::NotFound);
        };

        if !force {
            let due = match feed.last_check {
                None => true,
                Some(last) => last + chrono::Duration::seconds(feed.check_interval) < Utc::now(),
            };
            if !due {
                debug!(feed_id = %feed_id, "feed not due");
                return Ok(PollOutcome::NotDue);
            }
        }

        // CAS entry: losing the race is a fast, cheap rejection.
        if !self.feeds.try_claim(feed_id).await? {
            debug!(feed_id = %feed_id, "poll latch held elsewhere");
            return Ok(PollOutcome::AlreadyPolling);
        }

        // Release is guaranteed on every exit path: if this future is
        // dropped or errors before the happy-path release below, the guard
        // spawns the latch release from its drop handler.
        let guard = scopeguard::guard(
            (self.feeds.clone(), feed_id.clone()),
            |(feeds, feed_id)| {
                tokio::spawn(async move {
                    if let Err(e) = feeds.release_without_progress(&feed_id).await {
                        error!(feed_id = %feed_id, error = %e, "latch release failed");
                    }
                });
            },
        );

        let result = self.fetch_and_persist(&feed).await;

        let (feeds, feed_id) = scopeguard::ScopeGuard::into_inner(guard);
        match result {
            Ok(new_articles) => {
                feeds.release(&feed_id).await?;
                info!(feed_id = %feed_id, new_articles, "poll complete");
                Ok(PollOutcome::Polled { new_articles })
            }
            Err(e) => {
                // Failed poll: free the latch but do not advance last_check,
                // so the feed stays at the front of the eligibility order.
                feeds.release_without_progress(&feed_id).await?;
                Err(e)
            }
        }
    }

    async fn fetch_and_persist(&self, feed: &RssFeed) -> Result<usize> {
        let body = self
            .http
            .get(&feed.url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .with_context(|| format!("feed fetch failed: {}", feed.url))?
            .bytes()
            .await?;

        let parsed = feed_rs::parser::parse(body.as_ref())
            .with_context(|| format!("feed parse failed: {}", feed.url))?;

        let mut new_articles = 0usize;
        for entry in parsed.entries {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".to_string());
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();
            if link.is_empty() {
                continue;
            }
            let description = entry.summary.map(|s| s.content);
            let published = entry.published.or(entry.updated);

            let article = RssArticle::new(
                feed.feed_id.clone(),
                title,
                link,
                description,
                published,
            );
            if self.articles.insert_if_new(&article).await? {
                new_articles += 1;
            }
        }
        Ok(new_articles)
    }

    // ------------------------------------------------------------------
    // Article processing
    // ------------------------------------------------------------------

    /// Extract full content for one article, persist it, and materialize a
    /// document in the feed's folder. The document vectorizes like any
    /// other ingest.
    pub async fn process_article(&self, article_id: &ArticleId) -> Result<bool> {
        let Some(article) = self.articles.get(article_id).await? else {
            return Ok(false);
        };
        if article.is_processed {
            return Ok(true);
        }
        let Some(feed) = self.feeds.get(&article.feed_id).await? else {
            anyhow::bail!("feed {} not found for article {}", article.feed_id, article_id);
        };

        let page = self.crawler.crawl_page(&article.link).await?;
        self.articles
            .set_full_content(
                article_id,
                &page.cleaned_text,
                Some(&page.original_html),
                &page.images,
            )
            .await?;

        // Scope from the feed: null user → global, user → user.
        let scope = match &feed.user_id {
            Some(uid) => Scope::user(uid.clone()),
            None => Scope::global(),
        };
        let folder_chain = vec!["RSS".to_string(), feed.name.clone()];
        let filename = format!("{}.txt", sanitize_filename(&article.title));

        let outcome = self
            .documents
            .upload(
                page.cleaned_text.as_bytes(),
                &filename,
                Some(DocumentType::Url),
                scope,
                &folder_chain,
            )
            .await?;
        if let UploadOutcome::Duplicate { existing_id, .. } = &outcome {
            debug!(article_id = %article_id, existing_id = %existing_id, "article content already ingested");
        }

        self.articles.mark_processed(article_id).await?;
        Ok(true)
    }

    /// Batch worker entry: process up to `limit` unprocessed articles.
    pub async fn process_unprocessed(&self, limit: i64) -> Result<usize> {
        let pending = self.articles.list_unprocessed(limit).await?;
        let mut processed = 0;
        for article in pending {
            match self.process_article(&article.article_id).await {
                Ok(true) => processed += 1,
                Ok(false) => {}
                Err(e) => warn!(article_id = %article.article_id, error = %e, "article processing failed"),
            }
        }
        Ok(processed)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Reset feeds stuck `is_polling` past the timeout.
    pub async fn reset_stuck_feeds(&self) -> Result<u64> {
        let stuck_for = chrono::Duration::from_std(self.settings.stuck_poll_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let reset = self.feeds.reset_stuck(stuck_for).await?;
        if reset > 0 {
            warn!(reset, "reset stuck feed poll latches");
        }
        Ok(reset)
    }

    /// Retention purge: drop old articles and delete their derived
    /// documents (rows, points, files).
    pub async fn purge_old_articles(&self) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(self.settings.retention_days);
        let purged = self.articles.purge_older_than(cutoff).await?;

        for article in &purged {
            if !article.is_processed {
                continue;
            }
            let Some(feed) = self.feeds.get(&article.feed_id).await? else {
                continue;
            };
            let scope = match &feed.user_id {
                Some(uid) => Scope::user(uid.clone()),
                None => Scope::global(),
            };
            let filename = format!("{}.txt", sanitize_filename(&article.title));
            let folder_chain = vec!["RSS".to_string(), feed.name.clone()];
            let folder_id = self
                .documents
                .folder_engine()
                .resolve(&scope, &folder_chain)
                .await?;
            if let Some(doc) = self
                .documents
                .repository()
                .find_by_filename_and_context(
                    &filename,
                    scope.user_id.as_deref(),
                    &scope,
                    folder_id.as_ref(),
                )
                .await?
            {
                if let Err(e) = self.documents.delete(&doc.document_id, true).await {
                    warn!(document_id = %doc.document_id, error = %e, "derived document purge failed");
                }
            }
        }

        info!(purged = purged.len(), cutoff = %cutoff, "article retention purge complete");
        Ok(purged.len())
    }

    // ------------------------------------------------------------------
    // Scheduler loop
    // ------------------------------------------------------------------

    /// Tick until cancelled: eligibility poll, stuck-latch cleanup, and a
    /// daily-equivalent retention purge folded into the same loop.
    pub async fn run_scheduler(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.settings.scheduler_interval);
        let mut ticks: u64 = 0;
        let purge_every = (24 * 3600 / self.settings.scheduler_interval.as_secs().max(1)).max(1);

        info!(
            interval_secs = self.settings.scheduler_interval.as_secs(),
            "rss scheduler started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            ticks += 1;

            if let Err(e) = self.poll_eligible().await {
                error!(error = %e, "eligibility poll failed");
            }
            if let Err(e) = self.reset_stuck_feeds().await {
                error!(error = %e, "stuck feed cleanup failed");
            }
            if let Err(e) = self.process_unprocessed(20).await {
                error!(error = %e, "article processing sweep failed");
            }
            if ticks % purge_every == 0 {
                if let Err(e) = self.purge_old_articles().await {
                    error!(error = %e, "retention purge failed");
                }
            }
        }
        info!("rss scheduler stopped");
    }
}

fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim();
    let capped: String = trimmed.chars().take(120).collect();
    if capped.is_empty() {
        "article".to_string()
    } else {
        capped
    }
}

/// Register the fabric-visible RSS tasks with their broker-level limits:
/// the scheduled poll at 1/min, article processing at 2/min with three
/// 60-second-base exponential retries.
pub fn register_rss_tasks(fabric: &Arc<TaskFabric>, rss: Arc<RssService>) {
    let poll_service = rss.clone();
    let poll_handler: TaskHandler = Arc::new(move |_ctx| {
        let service = poll_service.clone();
        Box::pin(async move {
            let polled = service.poll_eligible().await?;
            Ok(serde_json::json!({ "eligible": polled }))
        })
    });
    fabric.register(
        "rss.poll_feeds",
        TaskSpec {
            rate_per_minute: Some(1),
            ..Default::default()
        },
        poll_handler,
    );

    let article_service = rss.clone();
    let article_handler: TaskHandler = Arc::new(move |ctx| {
        let service = article_service.clone();
        Box::pin(async move {
            let article_id: String = serde_json::from_value(
                ctx.payload
                    .get("article_id")
                    .cloned()
                    .unwrap_or_default(),
            )?;
            let processed = service
                .process_article(&ArticleId::from_string(article_id))
                .await?;
            Ok(serde_json::json!({ "processed": processed }))
        })
    });
    fabric.register(
        "rss.process_article",
        TaskSpec {
            rate_per_minute: Some(2),
            retry: crate::application::task_fabric::RetryPolicy {
                attempts: 3,
                base_delay: Duration::from_secs(60),
            },
            ..Default::default()
        },
        article_handler,
    );

    let purge_service = rss;
    let purge_handler: TaskHandler = Arc::new(move |_ctx| {
        let service = purge_service.clone();
        Box::pin(async move {
            let purged = service.purge_old_articles().await?;
            Ok(serde_json::json!({ "purged": purged }))
        })
    });
    fabric.register("rss.purge_old", TaskSpec::default(), purge_handler);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("A/B: C?"), "A_B_ C_");
        assert_eq!(sanitize_filename(""), "article");
        assert!(sanitize_filename(&"x".repeat(500)).chars().count() <= 120);
    }
}
