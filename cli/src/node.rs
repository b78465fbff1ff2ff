// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Node wiring: construct the full service graph from configuration and
//! run until interrupted.
//!
//! Startup order matters: the database manager and vector gateway come up
//! first, reconciliation runs to completion, and only then does the live
//! filesystem observer start. The RSS scheduler and task fabric run for
//! the life of the node.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use citadel_core::application::document_service::{
    DefaultContentProcessor, DocumentService, NoopKnowledgeGraph,
};
use citadel_core::application::folder_engine::FolderEngine;
use citadel_core::application::paths::PathResolver;
use citadel_core::application::reconciler::WatchService;
use citadel_core::application::rss_service::{register_rss_tasks, RssService};
use citadel_core::application::task_fabric::{register_orchestrator_query, TaskFabric};
use citadel_core::config::Settings;
use citadel_core::domain::repository::{
    ArticleRepository, DocumentRepository, FeedRepository, FolderRepository, UserDirectory,
};
use citadel_core::infrastructure::agent_client::AgentStreamClient;
use citadel_core::infrastructure::db::{DatabaseManager, ExecutionMode};
use citadel_core::infrastructure::event_bus::EventBus;
use citadel_core::infrastructure::kv_cache::ResultStash;
use citadel_core::infrastructure::repositories::{
    PostgresArticleRepository, PostgresDocumentRepository, PostgresFeedRepository,
    PostgresFolderRepository, PostgresUserDirectory,
};
use citadel_core::infrastructure::vector::{
    EmbeddingProvider, HttpEmbeddingProvider, VectorIndexGateway,
};
use citadel_core::infrastructure::watcher::{FsWatcher, PathFilter};

/// Everything a command needs to act on the platform.
pub struct Wiring {
    pub settings: Settings,
    pub db: Arc<DatabaseManager>,
    pub documents: Arc<dyn DocumentRepository>,
    pub folders: Arc<dyn FolderRepository>,
    pub feeds: Arc<dyn FeedRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub vector: Arc<VectorIndexGateway>,
    pub events: EventBus,
    pub paths: Arc<PathResolver>,
    pub folder_engine: Arc<FolderEngine>,
    pub document_service: Arc<DocumentService>,
    pub rss: Arc<RssService>,
}

pub async fn wire(config_path: &Path) -> Result<Wiring> {
    let settings = Settings::load(config_path)
        .with_context(|| format!("cannot load configuration from {}", config_path.display()))?;

    let db = DatabaseManager::connect(settings.database.clone(), ExecutionMode::Pooled)
        .await
        .context("database manager startup failed")?;

    let documents: Arc<dyn DocumentRepository> =
        Arc::new(PostgresDocumentRepository::new(db.clone()));
    let folders: Arc<dyn FolderRepository> = Arc::new(PostgresFolderRepository::new(db.clone()));
    let feeds: Arc<dyn FeedRepository> = Arc::new(PostgresFeedRepository::new(db.clone()));
    let articles: Arc<dyn ArticleRepository> =
        Arc::new(PostgresArticleRepository::new(db.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(PostgresUserDirectory::new(db.clone()));

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        settings.vector.embedding_endpoint.clone(),
        settings.vector.embedding_batch_size,
        settings.vector.vector_dimension,
    ));
    let vector = Arc::new(
        VectorIndexGateway::connect(settings.vector.clone(), embedder)
            .await
            .context("vector gateway startup failed")?,
    );

    let events = EventBus::with_default_capacity();
    let paths = Arc::new(PathResolver::new(settings.uploads_root.clone(), users.clone()));
    let folder_engine = Arc::new(FolderEngine::new(folders.clone()));

    let document_service = DocumentService::new(
        documents.clone(),
        folder_engine.clone(),
        vector.clone(),
        Arc::new(DefaultContentProcessor),
        Arc::new(NoopKnowledgeGraph),
        events.clone(),
        paths.clone(),
    );

    let rss = RssService::new(
        feeds.clone(),
        articles.clone(),
        document_service.clone(),
        settings.rss.clone(),
    );

    Ok(Wiring {
        settings,
        db,
        documents,
        folders,
        feeds,
        articles,
        users,
        vector,
        events,
        paths,
        folder_engine,
        document_service,
        rss,
    })
}

pub async fn serve(config_path: &Path) -> Result<()> {
    let wiring = wire(config_path).await?;
    let cancel = CancellationToken::new();

    // Task fabric with the built-in handlers.
    let fabric = TaskFabric::new(8);
    register_rss_tasks(&fabric, wiring.rss.clone());
    match AgentStreamClient::connect(
        &wiring.settings.orchestrator.endpoint,
        wiring.settings.orchestrator.max_message_bytes,
    )
    .await
    {
        Ok(client) => {
            let stash = ResultStash::connect(
                &wiring.settings.redis.url,
                wiring.settings.redis.result_ttl,
            )
            .await
            .context("redis stash startup failed")?;
            register_orchestrator_query(&fabric, client, stash);
        }
        Err(e) => warn!(error = %e, "agent orchestrator unavailable, query task disabled"),
    }

    // Startup reconciliation, strictly before the live observer.
    let watch_service = WatchService::new(
        wiring.document_service.clone(),
        wiring.folder_engine.clone(),
        wiring.documents.clone(),
        wiring.folders.clone(),
        wiring.vector.clone(),
        wiring.paths.clone(),
        wiring.events.clone(),
    );
    let report = watch_service
        .reconcile()
        .await
        .context("startup reconciliation failed")?;
    info!(?report, "reconciliation finished, starting live observer");

    let (watcher, watch_rx) = FsWatcher::start(&wiring.settings.uploads_root, PathFilter)
        .context("filesystem watcher startup failed")?;
    let watch_task = tokio::spawn(watch_service.clone().run(watch_rx, cancel.clone()));

    let scheduler_task = tokio::spawn(wiring.rss.clone().run_scheduler(cancel.clone()));

    info!("citadel node is up");
    tokio::signal::ctrl_c().await.context("signal wait failed")?;
    info!("shutting down");

    cancel.cancel();
    fabric.shutdown();
    let _ = watch_task.await;
    let _ = scheduler_task.await;
    drop(watcher);
    wiring.db.close().await;
    Ok(())
}
