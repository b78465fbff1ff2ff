// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the feed poll state machine: the claim latch,
//! eligibility ordering, stuck-latch recovery, and a real fetch against a
//! mock feed server.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use citadel_core::application::document_service::{
    DefaultContentProcessor, DocumentService, NoopKnowledgeGraph,
};
use citadel_core::application::folder_engine::FolderEngine;
use citadel_core::application::paths::PathResolver;
use citadel_core::application::rss_service::{PollOutcome, RssService};
use citadel_core::config::RssSettings;
use citadel_core::domain::repository::{
    ArticleRepository, DocumentRepository, FeedRepository, FolderRepository, UserDirectory,
};
use citadel_core::domain::rss::RssFeed;
use citadel_core::infrastructure::event_bus::EventBus;
use citadel_core::infrastructure::memory::{
    InMemoryArticleRepository, InMemoryDocumentRepository, InMemoryFeedRepository,
    InMemoryFolderRepository, InMemoryUserDirectory, InMemoryVectorIndex,
};

struct Harness {
    rss: Arc<RssService>,
    feeds: InMemoryFeedRepository,
    articles: InMemoryArticleRepository,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let feeds = InMemoryFeedRepository::new();
    let articles = InMemoryArticleRepository::new();

    let documents: Arc<dyn DocumentRepository> = Arc::new(InMemoryDocumentRepository::new());
    let folders: Arc<dyn FolderRepository> = Arc::new(InMemoryFolderRepository::new());
    let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());

    let service = DocumentService::new(
        documents,
        Arc::new(FolderEngine::new(folders)),
        Arc::new(InMemoryVectorIndex::new()),
        Arc::new(DefaultContentProcessor),
        Arc::new(NoopKnowledgeGraph),
        EventBus::with_default_capacity(),
        Arc::new(PathResolver::new(dir.path(), users)),
    );

    let rss = RssService::new(
        Arc::new(feeds.clone()),
        Arc::new(articles.clone()),
        service,
        RssSettings::default(),
    );

    Harness {
        rss,
        feeds,
        articles,
        _dir: dir,
    }
}

const FEED_XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Test Feed</title>
  <item>
    <title>First article</title>
    <link>https://example.com/articles/1</link>
    <description>Body one</description>
  </item>
  <item>
    <title>Second article</title>
    <link>https://example.com/articles/2</link>
    <description>Body two</description>
  </item>
</channel></rss>"#;

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let h = harness();
    let feed = RssFeed::new("https://example.com/feed.xml", "Race Feed", None);
    h.feeds.upsert(&feed).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..100 {
        let feeds = h.feeds.clone();
        let id = feed.feed_id.clone();
        handles.push(tokio::spawn(async move { feeds.try_claim(&id).await.unwrap() }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one claim must win the latch");

    // The latch is observed true for exactly that one claim.
    let claims: Vec<_> = h
        .feeds
        .claim_log()
        .into_iter()
        .filter(|(id, claimed)| *claimed && id == &feed.feed_id)
        .collect();
    assert_eq!(claims.len(), 1);
}

#[tokio::test]
async fn poll_is_rejected_while_latch_is_held() {
    let h = harness();
    let feed = RssFeed::new("https://example.com/feed.xml", "Held Feed", None);
    h.feeds.upsert(&feed).await.unwrap();

    assert!(h.feeds.try_claim(&feed.feed_id).await.unwrap());

    // Even a forced poll cannot enter while the latch is held.
    for _ in 0..10 {
        let outcome = h.rss.poll_feed(&feed.feed_id, true).await.unwrap();
        assert_eq!(outcome, PollOutcome::AlreadyPolling);
    }

    h.feeds.release(&feed.feed_id).await.unwrap();
    let refreshed = h.feeds.get(&feed.feed_id).await.unwrap().unwrap();
    assert!(!refreshed.is_polling);
    assert!(refreshed.last_check.is_some());
}

#[tokio::test]
async fn poll_fetches_persists_and_dedups() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/rss+xml")
        .with_body(FEED_XML)
        .expect_at_least(2)
        .create_async()
        .await;

    let h = harness();
    let feed = RssFeed::new(format!("{}/feed.xml", server.url()), "Mock Feed", None);
    h.feeds.upsert(&feed).await.unwrap();

    let outcome = h.rss.poll_feed(&feed.feed_id, true).await.unwrap();
    assert_eq!(outcome, PollOutcome::Polled { new_articles: 2 });
    assert_eq!(h.articles.len(), 2);

    // A second poll of identical content saves nothing new.
    let outcome = h.rss.poll_feed(&feed.feed_id, true).await.unwrap();
    assert_eq!(outcome, PollOutcome::Polled { new_articles: 0 });
    assert_eq!(h.articles.len(), 2);

    // The latch was released and last_check advanced on both polls.
    let refreshed = h.feeds.get(&feed.feed_id).await.unwrap().unwrap();
    assert!(!refreshed.is_polling);
    assert!(refreshed.last_check.is_some());

    mock.assert_async().await;
}

#[tokio::test]
async fn failed_poll_releases_without_advancing_last_check() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/feed.xml")
        .with_status(500)
        .create_async()
        .await;

    let h = harness();
    let mut feed = RssFeed::new(format!("{}/feed.xml", server.url()), "Broken Feed", None);
    feed.last_check = None;
    h.feeds.upsert(&feed).await.unwrap();

    // feed-rs will fail on the empty error body.
    let result = h.rss.poll_feed(&feed.feed_id, true).await;
    assert!(result.is_err());

    let refreshed = h.feeds.get(&feed.feed_id).await.unwrap().unwrap();
    assert!(!refreshed.is_polling, "latch must release on failure");
    assert!(
        refreshed.last_check.is_none(),
        "a failed poll must not count as progress"
    );
}

#[tokio::test]
async fn eligibility_orders_never_checked_first() {
    let h = harness();

    let mut never = RssFeed::new("https://a.example/feed", "Never", None);
    never.last_check = None;
    let mut stale = RssFeed::new("https://b.example/feed", "Stale", None);
    stale.last_check = Some(Utc::now() - chrono::Duration::hours(10));
    stale.check_interval = 60;
    let mut fresh = RssFeed::new("https://c.example/feed", "Fresh", None);
    fresh.last_check = Some(Utc::now());
    fresh.check_interval = 3600;

    for feed in [&never, &stale, &fresh] {
        h.feeds.upsert(feed).await.unwrap();
    }

    let eligible = h.feeds.feeds_needing_poll(None).await.unwrap();
    let names: Vec<&str> = eligible.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Never", "Stale"], "NULLS FIRST, fresh excluded");
}

#[tokio::test]
async fn stuck_latches_are_reset() {
    let h = harness();
    let mut feed = RssFeed::new("https://stuck.example/feed", "Stuck", None);
    feed.is_polling = true;
    feed.updated_at = Utc::now() - chrono::Duration::hours(1);
    h.feeds.upsert(&feed).await.unwrap();

    let reset = h.rss.reset_stuck_feeds().await.unwrap();
    assert_eq!(reset, 1);
    assert!(!h.feeds.get(&feed.feed_id).await.unwrap().unwrap().is_polling);

    // A freshly claimed latch is not "stuck".
    let recent = RssFeed::new("https://fine.example/feed", "Fine", None);
    h.feeds.upsert(&recent).await.unwrap();
    assert!(h.feeds.try_claim(&recent.feed_id).await.unwrap());
    let reset = h.rss.reset_stuck_feeds().await.unwrap();
    assert_eq!(reset, 0);
}

#[tokio::test]
async fn retention_purge_respects_cutoff() {
    let h = harness();
    let feed = RssFeed::new("https://old.example/feed", "Old Feed", None);
    h.feeds.upsert(&feed).await.unwrap();

    let mut old = citadel_core::domain::rss::RssArticle::new(
        feed.feed_id.clone(),
        "Ancient news",
        "https://old.example/1",
        None,
        Some(Utc::now() - chrono::Duration::days(30)),
    );
    old.is_processed = false;
    let recent = citadel_core::domain::rss::RssArticle::new(
        feed.feed_id.clone(),
        "Recent news",
        "https://old.example/2",
        None,
        Some(Utc::now() - chrono::Duration::days(2)),
    );
    h.articles.insert_if_new(&old).await.unwrap();
    h.articles.insert_if_new(&recent).await.unwrap();

    let purged = h.rss.purge_old_articles().await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(h.articles.len(), 1);
    assert!(h.articles.get(&recent.article_id).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(10)).await;
}
