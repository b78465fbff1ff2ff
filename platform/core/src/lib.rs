// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # citadel-core
//!
//! The coordination heart of the CITADEL knowledge platform. This crate owns
//! the domain model, application use-cases, and infrastructure wiring that
//! keep three authoritative stores — the Postgres metadata store, the Qdrant
//! vector index, and the on-disk upload tree — consistent while background
//! workers, scheduled pollers, a filesystem watcher, and a streaming agent
//! orchestrator all act on the same entities concurrently.
//!
//! ## Bounded Contexts Implemented
//!
//! | Bounded Context | Domain files |
//! |---|---|
//! | **Document Lifecycle** | [`domain::document`], [`domain::chunk`] |
//! | **Folder Hierarchy** | [`domain::folder`] |
//! | **Task Fabric** | [`domain::task`] |
//! | **RSS Ingestion** | [`domain::rss`] |
//! | **Notifications** | [`domain::events`] |
//!
//! ## Layer Structure
//!
//! ```text
//! application/    ← Use-cases: document service, folder engine, task fabric,
//!     ↓             RSS scheduler, filesystem reconciler, PDF classifier
//! domain/         ← Aggregates, value objects, domain events, repository traits
//!     ↓
//! infrastructure/ ← Postgres repos, Qdrant gateway, redis stash, notify
//!                   watcher, gRPC stream client, crawler, event bus
//! ```
//!
//! ## Integration Tests
//!
//! See `platform/core/tests/` for integration tests covering the upload
//! pipeline, startup reconciliation, and the feed poll state machine.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
