// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Persistence Provider Implementations
//!
//! Infrastructure implementations of [`PersistenceProvider`].
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Durable storage behind the knowledge store's write-behind cache
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresPersistenceProvider** - PostgreSQL tables, one transaction per batch
//! - **InMemoryPersistenceProvider** - process memory, for development and tests
//!
//! Both treat a relation insert for an existing `(source, target, type)` as a
//! no-op, so a replayed batch is harmless.

pub mod postgres;

pub use postgres::PostgresPersistenceProvider;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::pattern::{Pattern, PatternId, PatternRelation, PatternUsage};
use crate::domain::repository::{
    LoadedKnowledge, PersistenceError, PersistenceProvider, RelationWriteOp,
};

#[derive(Default)]
struct InMemoryState {
    patterns: Vec<Pattern>,
    positions: HashMap<PatternId, usize>,
    relations: Vec<PatternRelation>,
    usages: Vec<PatternUsage>,
    written_operations: usize,
    batches_written: usize,
}

impl InMemoryState {
    fn apply(&mut self, op: &RelationWriteOp) {
        match op {
            RelationWriteOp::Insert(relation) => {
                let exists = self.relations.iter().any(|r| {
                    r.source_id == relation.source_id
                        && r.target_id == relation.target_id
                        && r.relation_type == relation.relation_type
                });
                if !exists {
                    self.relations.push(relation.clone());
                }
            }
            RelationWriteOp::UpdateWeight {
                source_id,
                target_id,
                relation_type,
                weight,
            } => {
                if let Some(relation) = self.relations.iter_mut().find(|r| {
                    &r.source_id == source_id
                        && &r.target_id == target_id
                        && &r.relation_type == relation_type
                }) {
                    relation.weight = *weight;
                }
            }
        }
    }
}

/// Process-memory provider. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPersistenceProvider {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryPersistenceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing knowledge. Patterns without an id get one.
    pub fn with_knowledge(patterns: Vec<Pattern>, relations: Vec<PatternRelation>) -> Self {
        let provider = Self::new();
        {
            let mut state = provider.state.write();
            for mut pattern in patterns {
                let id = *pattern.id.get_or_insert_with(PatternId::new);
                let position = state.patterns.len();
                state.patterns.push(pattern);
                state.positions.insert(id, position);
            }
            state.relations = relations;
        }
        provider
    }

    pub fn patterns(&self) -> Vec<Pattern> {
        self.state.read().patterns.clone()
    }

    pub fn relations(&self) -> Vec<PatternRelation> {
        self.state.read().relations.clone()
    }

    pub fn usages(&self) -> Vec<PatternUsage> {
        self.state.read().usages.clone()
    }

    /// Total operations received through `write_batch`, replays included.
    pub fn written_operations(&self) -> usize {
        self.state.read().written_operations
    }

    pub fn batches_written(&self) -> usize {
        self.state.read().batches_written
    }
}

#[async_trait]
impl PersistenceProvider for InMemoryPersistenceProvider {
    async fn load_all(&self) -> Result<LoadedKnowledge, PersistenceError> {
        let state = self.state.read();
        Ok(LoadedKnowledge {
            patterns: state.patterns.clone(),
            relations: state.relations.clone(),
        })
    }

    async fn upsert_pattern(&self, pattern: &Pattern) -> Result<Pattern, PersistenceError> {
        let mut stored = pattern.clone();
        let id = *stored.id.get_or_insert_with(PatternId::new);

        let mut state = self.state.write();
        let existing = state.positions.get(&id).copied();
        match existing {
            Some(position) => state.patterns[position] = stored.clone(),
            None => {
                let position = state.patterns.len();
                state.patterns.push(stored.clone());
                state.positions.insert(id, position);
            }
        }
        Ok(stored)
    }

    async fn write_batch(&self, operations: &[RelationWriteOp]) -> Result<(), PersistenceError> {
        let mut state = self.state.write();
        for op in operations {
            state.apply(op);
        }
        state.written_operations += operations.len();
        state.batches_written += 1;
        Ok(())
    }

    async fn record_usage(&self, usage: &PatternUsage) -> Result<u64, PersistenceError> {
        let mut state = self.state.write();
        state.usages.push(usage.clone());
        let count = state
            .usages
            .iter()
            .filter(|u| u.pattern_id == usage.pattern_id)
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::Metadata;

    #[tokio::test]
    async fn test_upsert_assigns_and_keeps_identity() {
        let provider = InMemoryPersistenceProvider::new();
        let stored = provider
            .upsert_pattern(&Pattern::new("Retry", "loop", ""))
            .await
            .unwrap();
        let id = stored.id.expect("id assigned");

        let mut changed = stored.clone();
        changed.update_template("loop with backoff");
        let again = provider.upsert_pattern(&changed).await.unwrap();

        assert_eq!(again.id, Some(id));
        assert_eq!(provider.patterns().len(), 1);
        assert_eq!(provider.patterns()[0].template, "loop with backoff");
    }

    #[tokio::test]
    async fn test_replayed_batch_is_idempotent() {
        let provider = InMemoryPersistenceProvider::new();
        let a = PatternId::new();
        let b = PatternId::new();
        let batch = vec![
            RelationWriteOp::Insert(PatternRelation::new(a, b, "uses", 0.5)),
            RelationWriteOp::UpdateWeight {
                source_id: a,
                target_id: b,
                relation_type: "uses".to_string(),
                weight: 0.7,
            },
        ];

        provider.write_batch(&batch).await.unwrap();
        provider.write_batch(&batch).await.unwrap();

        let relations = provider.relations();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].weight, 0.7);
        assert_eq!(provider.written_operations(), 4);
        assert_eq!(provider.batches_written(), 2);
    }

    #[tokio::test]
    async fn test_usage_count_is_per_pattern() {
        let provider = InMemoryPersistenceProvider::new();
        let a = PatternId::new();
        let b = PatternId::new();

        assert_eq!(provider.record_usage(&PatternUsage::new(a, Metadata::new())).await.unwrap(), 1);
        assert_eq!(provider.record_usage(&PatternUsage::new(b, Metadata::new())).await.unwrap(), 1);
        assert_eq!(provider.record_usage(&PatternUsage::new(a, Metadata::new())).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_seeded_knowledge_loads_in_order() {
        let provider = InMemoryPersistenceProvider::with_knowledge(
            vec![Pattern::new("first", "", ""), Pattern::new("second", "", "")],
            Vec::new(),
        );
        let loaded = provider.load_all().await.unwrap();
        let names: Vec<&str> = loaded.patterns.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert!(loaded.patterns.iter().all(|p| p.id.is_some()));
    }
}
