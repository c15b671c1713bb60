// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Persistence Provider Interface
//!
//! Durable backing store contract for the knowledge store. The in-memory
//! graph is the fast-path source of truth; the provider is a write-behind
//! log that is read back only by `KnowledgeStore::initialize`.
//!
//! | Implementation | Backend |
//! |----------------|---------|
//! | `InMemoryPersistenceProvider` | process memory (development, tests) |
//! | `PostgresPersistenceProvider` | PostgreSQL via sqlx |
//!
//! Implementations live in `crate::infrastructure::repositories` and are
//! selected from `PersistenceConfig` by `provider_factory`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::pattern::{Pattern, PatternId, PatternRelation, PatternUsage};

/// One queued relation write.
///
/// Providers must tolerate receiving the same operation more than once:
/// a failed flush is replayed in full on the next trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RelationWriteOp {
    Insert(PatternRelation),
    UpdateWeight {
        source_id: PatternId,
        target_id: PatternId,
        relation_type: String,
        weight: f64,
    },
}

impl RelationWriteOp {
    pub fn update_weight(relation: &PatternRelation) -> Self {
        RelationWriteOp::UpdateWeight {
            source_id: relation.source_id,
            target_id: relation.target_id,
            relation_type: relation.relation_type.clone(),
            weight: relation.weight,
        }
    }
}

/// Everything a provider holds, as returned by [`PersistenceProvider::load_all`].
#[derive(Debug, Clone, Default)]
pub struct LoadedKnowledge {
    pub patterns: Vec<Pattern>,
    pub relations: Vec<PatternRelation>,
}

#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    /// Load every stored pattern and relation.
    async fn load_all(&self) -> Result<LoadedKnowledge, PersistenceError>;

    /// Insert or update a pattern, returning it with its assigned id.
    async fn upsert_pattern(&self, pattern: &Pattern) -> Result<Pattern, PersistenceError>;

    /// Apply a batch of relation writes, all or nothing.
    async fn write_batch(&self, operations: &[RelationWriteOp]) -> Result<(), PersistenceError>;

    /// Store a usage record and return the pattern's total usage count.
    async fn record_usage(&self, usage: &PatternUsage) -> Result<u64, PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Persistence unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => PersistenceError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                PersistenceError::Unavailable(err.to_string())
            }
            _ => PersistenceError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}
