// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! The canonical subgraphs. Each is a reusable compiled state machine with
//! a strict input/output contract, because subgraphs call one another.

pub mod assessment;
pub mod document_analysis;
pub mod fact_verification;
pub mod fiction;
pub mod knowledge_synthesis;
pub mod retrieval;
