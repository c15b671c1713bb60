// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: the knowledge store service and its write queue

pub mod batcher;
pub mod knowledge_store;

pub use batcher::OperationBatcher;
pub use knowledge_store::{
    IntegrationOutcome, KnowledgeStore, KnowledgeStoreError, StoreStats, UnderstandingReport,
};
