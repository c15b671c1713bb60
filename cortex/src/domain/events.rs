// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the knowledge store.
//! Published to the `EventBus` after each state change commits in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::PatternId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnowledgeEvent {
    /// A new pattern was stored and cached
    PatternDiscovered {
        pattern_id: PatternId,
        name: String,
        focus_area: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A candidate matched an existing pattern and was not stored
    PatternDeduplicated {
        existing_id: PatternId,
        candidate_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Template, description or tags of a pattern changed
    PatternUpdated {
        pattern_id: PatternId,
        timestamp: DateTime<Utc>,
    },

    /// A relation was added to the graph and queued for persistence
    RelationAdded {
        source_id: PatternId,
        target_id: PatternId,
        relation_type: String,
        weight: f64,
        timestamp: DateTime<Utc>,
    },

    /// A relation weight changed (usage reinforcement, strengthen, weaken)
    RelationWeightChanged {
        source_id: PatternId,
        target_id: PatternId,
        relation_type: String,
        old_weight: f64,
        new_weight: f64,
        timestamp: DateTime<Utc>,
    },

    PatternUsed {
        pattern_id: PatternId,
        usage_count: u64,
        timestamp: DateTime<Utc>,
    },

    BatchFlushed {
        operations: usize,
        timestamp: DateTime<Utc>,
    },

    /// Flush failed; the operations stay queued
    BatchFlushFailed {
        operations: usize,
        error: String,
        timestamp: DateTime<Utc>,
    },

    StoreInitialized {
        patterns: usize,
        relations: usize,
        timestamp: DateTime<Utc>,
    },
}

impl KnowledgeEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            KnowledgeEvent::PatternDiscovered { timestamp, .. } => *timestamp,
            KnowledgeEvent::PatternDeduplicated { timestamp, .. } => *timestamp,
            KnowledgeEvent::PatternUpdated { timestamp, .. } => *timestamp,
            KnowledgeEvent::RelationAdded { timestamp, .. } => *timestamp,
            KnowledgeEvent::RelationWeightChanged { timestamp, .. } => *timestamp,
            KnowledgeEvent::PatternUsed { timestamp, .. } => *timestamp,
            KnowledgeEvent::BatchFlushed { timestamp, .. } => *timestamp,
            KnowledgeEvent::BatchFlushFailed { timestamp, .. } => *timestamp,
            KnowledgeEvent::StoreInitialized { timestamp, .. } => *timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            KnowledgeEvent::PatternDiscovered { .. } => "pattern_discovered",
            KnowledgeEvent::PatternDeduplicated { .. } => "pattern_deduplicated",
            KnowledgeEvent::PatternUpdated { .. } => "pattern_updated",
            KnowledgeEvent::RelationAdded { .. } => "relation_added",
            KnowledgeEvent::RelationWeightChanged { .. } => "relation_weight_changed",
            KnowledgeEvent::PatternUsed { .. } => "pattern_used",
            KnowledgeEvent::BatchFlushed { .. } => "batch_flushed",
            KnowledgeEvent::BatchFlushFailed { .. } => "batch_flush_failed",
            KnowledgeEvent::StoreInitialized { .. } => "store_initialized",
        }
    }

    /// True when the event is about `pattern_id`, as a node or as either
    /// end of a relation.
    pub fn concerns(&self, pattern_id: &PatternId) -> bool {
        match self {
            KnowledgeEvent::PatternDiscovered { pattern_id: id, .. }
            | KnowledgeEvent::PatternUpdated { pattern_id: id, .. }
            | KnowledgeEvent::PatternUsed { pattern_id: id, .. } => id == pattern_id,
            KnowledgeEvent::PatternDeduplicated { existing_id, .. } => existing_id == pattern_id,
            KnowledgeEvent::RelationAdded {
                source_id, target_id, ..
            }
            | KnowledgeEvent::RelationWeightChanged {
                source_id, target_id, ..
            } => source_id == pattern_id || target_id == pattern_id,
            KnowledgeEvent::BatchFlushed { .. }
            | KnowledgeEvent::BatchFlushFailed { .. }
            | KnowledgeEvent::StoreInitialized { .. } => false,
        }
    }
}
