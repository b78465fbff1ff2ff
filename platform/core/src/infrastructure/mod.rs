// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: Postgres repositories, Qdrant gateway, redis stash,
//! filesystem watcher, gRPC stream client, crawler, event bus.

pub mod agent_client;
pub mod crawler;
pub mod db;
pub mod event_bus;
pub mod kv_cache;
pub mod memory;
pub mod repositories;
pub mod vector;
pub mod watcher;
