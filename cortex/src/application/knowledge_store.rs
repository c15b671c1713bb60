// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # KnowledgeStore: Pattern Cache, Relations & Write-Behind Persistence
//!
//! Application service that accumulates, deduplicates, relates and serves
//! patterns for the research actors.
//!
//! ## State
//!
//! The [`PatternGraph`] (nodes, edges, identity index, relation-key set), the
//! pending [`OperationBatcher`] queue and the tag registry live behind one
//! `parking_lot::RwLock`. Every mutation updates all of them inside a single
//! write guard, and no guard is ever held across an `.await`, so queries never
//! wait on the persistence provider.
//!
//! ## Persistence
//!
//! - Pattern inserts are written through: the provider assigns the id.
//! - Relation inserts and weight changes are written behind: they hit the
//!   graph first, are queued, and are flushed in one batch when the queue
//!   reaches `batch_size` or on [`KnowledgeStore::save`] /
//!   [`KnowledgeStore::cleanup`].
//! - A failed flush keeps the whole queue for the next trigger. Flushes
//!   triggered from `add_relation` / `record_usage` only log the failure.
//!
//! In-memory relations are lost if the process dies before a flush;
//! [`KnowledgeStore::initialize`] is the only reconciliation point.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::batcher::OperationBatcher;
use crate::domain::{
    keys, related_ids, ConfidenceMetrics, CortexConfig, Finding, FindingContent, KnowledgeEvent,
    KnowledgeSnapshot, KnowledgeState, Metadata, MetadataValue, Pattern, PatternDraft,
    PatternGraph, PatternId, PatternRelation, PatternUpdate, PatternUsage, PersistenceError,
    PersistenceProvider, RelationKeying, RelationWriteOp, RelationshipRecord,
    SimilarityDeduplicator, Tag, WeightPolicy,
};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::provider_factory::create_persistence_provider;

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeStoreError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Persistence provider returned pattern '{0}' without an id")]
    MissingIdentity(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result of [`KnowledgeStore::integrate_finding`].
#[derive(Debug, Clone)]
pub enum IntegrationOutcome {
    /// Stored pattern, or the existing duplicate it matched
    Pattern(Pattern),
    /// `added` is false when the relation key was already tracked
    Relation { added: bool },
    /// Observation indexed as a catch-all pattern
    Indexed(Pattern),
}

#[derive(Debug, Clone, Default)]
pub struct UnderstandingReport {
    pub patterns: Vec<Pattern>,
    pub relations_added: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub patterns: usize,
    pub relations: usize,
    pub pending_operations: usize,
    pub tags: usize,
}

struct StoreState {
    graph: PatternGraph,
    batcher: OperationBatcher,
    tags: HashMap<String, Tag>,
}

impl StoreState {
    fn new(keying: RelationKeying, batch_size: usize) -> Self {
        Self {
            graph: PatternGraph::new(keying),
            batcher: OperationBatcher::new(batch_size),
            tags: HashMap::new(),
        }
    }

    /// Registered tag for `name`, or a fresh one.
    fn resolve_tag(&self, name: &str) -> Tag {
        self.tags
            .get(name)
            .cloned()
            .unwrap_or_else(|| Tag::new(name))
    }

    fn register_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a Tag>) {
        for tag in tags {
            self.tags
                .entry(tag.name.clone())
                .or_insert_with(|| tag.clone());
        }
    }

    fn build_pattern(&self, draft: PatternDraft) -> Pattern {
        let tags: Vec<Tag> = draft.tags.iter().map(|name| self.resolve_tag(name)).collect();
        Pattern::new(draft.name, draft.template, draft.description)
            .with_tags(tags)
            .with_metadata(draft.metadata)
    }

    /// Re-apply a queued operation on top of freshly loaded state.
    fn replay(&mut self, op: &RelationWriteOp) {
        match op {
            RelationWriteOp::Insert(relation) => {
                self.graph.insert_relation(relation.clone());
            }
            RelationWriteOp::UpdateWeight {
                source_id,
                target_id,
                relation_type,
                weight,
            } => {
                let weight = *weight;
                self.graph.adjust_relation(
                    source_id,
                    target_id,
                    Some(relation_type.as_str()),
                    |relation| relation.weight = weight,
                );
            }
        }
    }
}

pub struct KnowledgeStore {
    provider: Arc<dyn PersistenceProvider>,
    state: RwLock<StoreState>,
    /// Serialises dedup-check + provider upsert + cache insert.
    insert_lock: Mutex<()>,
    /// Serialises snapshot + write_batch + acknowledge.
    flush_lock: Mutex<()>,
    deduplicator: SimilarityDeduplicator,
    weight_policy: WeightPolicy,
    keying: RelationKeying,
    batch_size: usize,
    event_bus: EventBus,
}

impl KnowledgeStore {
    /// Build a store without validating `config`; see [`KnowledgeStore::try_new`].
    pub fn new(provider: Arc<dyn PersistenceProvider>, config: &CortexConfig) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "knowledge store built from an invalid config"
        );
        Self {
            provider,
            state: RwLock::new(StoreState::new(config.relation_keying, config.batch_size)),
            insert_lock: Mutex::new(()),
            flush_lock: Mutex::new(()),
            deduplicator: SimilarityDeduplicator::new(config.similarity_threshold),
            weight_policy: WeightPolicy::new(
                config.usage_weight_divisor,
                config.max_relation_weight,
            ),
            keying: config.relation_keying,
            batch_size: config.batch_size,
            event_bus: EventBus::new(config.event_channel_capacity.max(1)),
        }
    }

    /// Build a store, rejecting configs that fail [`CortexConfig::validate`].
    pub fn try_new(
        provider: Arc<dyn PersistenceProvider>,
        config: &CortexConfig,
    ) -> Result<Self, KnowledgeStoreError> {
        config
            .validate()
            .map_err(|e| KnowledgeStoreError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(provider, config))
    }

    /// Validate the config, build its provider and load the store.
    pub async fn connect(config: &CortexConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| KnowledgeStoreError::InvalidConfig(e.to_string()))?;
        let provider = create_persistence_provider(&config.persistence).await?;
        let store = Self::try_new(provider, config)?;
        store.initialize().await?;
        Ok(store)
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Load every pattern and relation from the provider into a fresh cache.
    ///
    /// The new state replaces the old one in a single swap, so a failed load
    /// leaves the store exactly as it was. Operations still queued for
    /// persistence are replayed on top of the loaded state and stay queued.
    pub async fn initialize(&self) -> Result<(), KnowledgeStoreError> {
        let _insert = self.insert_lock.lock().await;
        let _flush = self.flush_lock.lock().await;

        let loaded = self.provider.load_all().await.map_err(|e| {
            warn!(error = %e, "Failed to load knowledge from persistence provider");
            e
        })?;

        let mut fresh = StoreState::new(self.keying, self.batch_size);
        for pattern in loaded.patterns {
            fresh.register_tags(pattern.tags.iter());
            let name = pattern.name.clone();
            if fresh.graph.upsert_pattern(pattern).is_none() {
                warn!(pattern = %name, "Skipping stored pattern without id");
            }
        }
        for relation in loaded.relations {
            fresh.graph.insert_relation(relation);
        }

        let (patterns, relations, pending) = {
            let mut state = self.state.write();
            for op in state.batcher.snapshot() {
                fresh.replay(&op);
                fresh.batcher.enqueue(op);
            }
            *state = fresh;
            (
                state.graph.pattern_count(),
                state.graph.relation_count(),
                state.batcher.len(),
            )
        };

        gauge!("cortex_pending_operations").set(pending as f64);
        info!(patterns, relations, pending, "Knowledge store initialized");
        self.event_bus.publish(KnowledgeEvent::StoreInitialized {
            patterns,
            relations,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Write every queued relation operation in one batch.
    ///
    /// Returns the number of operations written. On failure nothing is
    /// dequeued; dropping the future mid-write has the same effect.
    pub async fn flush(&self) -> Result<usize, KnowledgeStoreError> {
        let _flush = self.flush_lock.lock().await;

        let batch = self.state.read().batcher.snapshot();
        if batch.is_empty() {
            return Ok(0);
        }

        match self.provider.write_batch(&batch).await {
            Ok(()) => {
                let remaining = {
                    let mut state = self.state.write();
                    state.batcher.acknowledge(batch.len());
                    state.batcher.len()
                };
                counter!("cortex_flushes_total", "outcome" => "success").increment(1);
                gauge!("cortex_pending_operations").set(remaining as f64);
                info!(operations = batch.len(), remaining, "Flushed relation batch");
                self.event_bus.publish(KnowledgeEvent::BatchFlushed {
                    operations: batch.len(),
                    timestamp: Utc::now(),
                });
                Ok(batch.len())
            }
            Err(e) => {
                counter!("cortex_flushes_total", "outcome" => "failure").increment(1);
                warn!(
                    operations = batch.len(),
                    error = %e,
                    "Relation batch flush failed; operations remain queued"
                );
                self.event_bus.publish(KnowledgeEvent::BatchFlushFailed {
                    operations: batch.len(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e.into())
            }
        }
    }

    pub async fn save(&self) -> Result<usize, KnowledgeStoreError> {
        self.flush().await
    }

    /// Final flush before the store is dropped.
    pub async fn cleanup(&self) -> Result<(), KnowledgeStoreError> {
        let written = self.flush().await?;
        info!(written, "Knowledge store cleaned up");
        Ok(())
    }

    /// Flush triggered by crossing the batch threshold. Failures stay queued.
    async fn flush_due(&self) {
        if let Err(e) = self.flush().await {
            debug!(error = %e, "Threshold flush failed");
        }
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    pub fn get(&self, id: &PatternId) -> Option<Pattern> {
        self.state.read().graph.get(id).cloned()
    }

    /// Store a pattern unless a similar one is already cached.
    ///
    /// A duplicate returns the existing pattern unchanged.
    pub async fn add_pattern(&self, draft: PatternDraft) -> Result<Pattern, KnowledgeStoreError> {
        let _insert = self.insert_lock.lock().await;

        let duplicate = {
            let state = self.state.read();
            self.deduplicator
                .find_similar(state.graph.patterns(), &draft.name, &draft.template)
                .cloned()
        };

        if let Some(existing) = duplicate {
            counter!("cortex_duplicates_suppressed_total").increment(1);
            debug!(candidate = %draft.name, existing = %existing.name, "Duplicate pattern suppressed");
            if let Some(existing_id) = existing.id {
                self.event_bus.publish(KnowledgeEvent::PatternDeduplicated {
                    existing_id,
                    candidate_name: draft.name,
                    timestamp: Utc::now(),
                });
            }
            return Ok(existing);
        }

        self.store_new_pattern(draft).await
    }

    /// Persist and cache a pattern. Callers hold `insert_lock`.
    async fn store_new_pattern(&self, draft: PatternDraft) -> Result<Pattern, KnowledgeStoreError> {
        let pattern = self.state.read().build_pattern(draft);

        let stored = self.provider.upsert_pattern(&pattern).await?;
        let id = stored
            .id
            .ok_or_else(|| KnowledgeStoreError::MissingIdentity(stored.name.clone()))?;

        {
            let mut state = self.state.write();
            state.register_tags(stored.tags.iter());
            state.graph.upsert_pattern(stored.clone());
        }

        counter!("cortex_patterns_stored_total").increment(1);
        debug!(pattern_id = %id, name = %stored.name, "Stored pattern");
        self.event_bus.publish(KnowledgeEvent::PatternDiscovered {
            pattern_id: id,
            name: stored.name.clone(),
            focus_area: stored.focus_area().map(str::to_string),
            timestamp: Utc::now(),
        });
        Ok(stored)
    }

    /// Mutate template, description or tags of a cached pattern.
    ///
    /// Unknown ids yield `Ok(None)`. An empty update returns the pattern as is.
    pub async fn update_pattern(
        &self,
        id: &PatternId,
        update: PatternUpdate,
    ) -> Result<Option<Pattern>, KnowledgeStoreError> {
        let _insert = self.insert_lock.lock().await;

        let updated = {
            let state = self.state.read();
            let Some(current) = state.graph.get(id) else {
                warn!(pattern_id = %id, "Update requested for unknown pattern");
                return Ok(None);
            };
            if update.is_empty() {
                return Ok(Some(current.clone()));
            }

            let mut pattern = current.clone();
            if let Some(template) = update.template {
                pattern.update_template(template);
            }
            if let Some(description) = update.description {
                pattern.update_description(description);
            }
            for name in &update.add_tags {
                pattern.add_tag(state.resolve_tag(name));
            }
            for name in &update.remove_tags {
                pattern.remove_tag(name);
            }
            pattern
        };

        let stored = self.provider.upsert_pattern(&updated).await?;
        {
            let mut state = self.state.write();
            state.register_tags(stored.tags.iter());
            state.graph.upsert_pattern(stored.clone());
        }

        debug!(pattern_id = %id, "Updated pattern");
        self.event_bus.publish(KnowledgeEvent::PatternUpdated {
            pattern_id: *id,
            timestamp: Utc::now(),
        });
        Ok(Some(stored))
    }

    /// Cached patterns in insertion order, optionally restricted to one focus area.
    pub fn patterns(&self, focus_area: Option<&str>) -> Vec<Pattern> {
        let state = self.state.read();
        state
            .graph
            .patterns()
            .filter(|p| focus_area.is_none_or(|area| p.focus_area() == Some(area)))
            .cloned()
            .collect()
    }

    /// Case-insensitive term search over name, description, template and tags.
    ///
    /// Ranked by number of matching terms, ties broken by insertion order.
    pub fn find_patterns(&self, query: &str, limit: usize) -> Vec<Pattern> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        let state = self.state.read();
        let mut ranked: Vec<(usize, usize, &Pattern)> = state
            .graph
            .patterns()
            .enumerate()
            .filter_map(|(position, pattern)| {
                let haystack = format!(
                    "{} {} {} {}",
                    pattern.name,
                    pattern.description,
                    pattern.template,
                    pattern.tag_names().join(" ")
                )
                .to_lowercase();
                let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (hits > 0).then_some((hits, position, pattern))
            })
            .collect();

        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(_, _, pattern)| pattern.clone())
            .collect()
    }

    // ========================================================================
    // Relations
    // ========================================================================

    /// Add a relation to the graph and queue it for persistence.
    ///
    /// Returns `false` without touching anything when the relation key is
    /// already tracked: the first call's type and weight win. Endpoints need
    /// not be cached yet. Crossing the batch threshold flushes inline; a
    /// failed flush is logged, not returned.
    pub async fn add_relation(
        &self,
        source_id: PatternId,
        target_id: PatternId,
        relation_type: impl Into<String>,
        weight: f64,
    ) -> bool {
        let relation = PatternRelation::new(source_id, target_id, relation_type, weight);

        let (added, due, pending) = {
            let mut state = self.state.write();
            if state.graph.insert_relation(relation.clone()) {
                let due = state.batcher.enqueue(RelationWriteOp::Insert(relation.clone()));
                (true, due, state.batcher.len())
            } else {
                (false, false, state.batcher.len())
            }
        };

        if !added {
            debug!(
                source = %source_id,
                target = %target_id,
                relation_type = %relation.relation_type,
                "Relation already tracked; ignoring"
            );
            return false;
        }

        counter!("cortex_relations_queued_total").increment(1);
        gauge!("cortex_pending_operations").set(pending as f64);
        debug!(
            source = %source_id,
            target = %target_id,
            relation_type = %relation.relation_type,
            weight,
            "Queued relation"
        );
        self.event_bus.publish(KnowledgeEvent::RelationAdded {
            source_id,
            target_id,
            relation_type: relation.relation_type,
            weight,
            timestamp: Utc::now(),
        });

        if due {
            self.flush_due().await;
        }
        true
    }

    /// Add `amount` to a tracked relation's weight.
    ///
    /// Negative or non-finite amounts are rejected with `false`.
    pub async fn strengthen_relation(
        &self,
        source_id: PatternId,
        target_id: PatternId,
        relation_type: Option<&str>,
        amount: f64,
    ) -> bool {
        self.adjust_relation(source_id, target_id, relation_type, amount, move |r| {
            r.strengthen(amount)
        })
        .await
    }

    /// Subtract `amount` from a tracked relation's weight, flooring at 0.0.
    ///
    /// Negative or non-finite amounts are rejected with `false`.
    pub async fn weaken_relation(
        &self,
        source_id: PatternId,
        target_id: PatternId,
        relation_type: Option<&str>,
        amount: f64,
    ) -> bool {
        self.adjust_relation(source_id, target_id, relation_type, amount, move |r| r.weaken(amount))
            .await
    }

    async fn adjust_relation<F>(
        &self,
        source_id: PatternId,
        target_id: PatternId,
        relation_type: Option<&str>,
        amount: f64,
        adjust: F,
    ) -> bool
    where
        F: FnOnce(&mut PatternRelation) + Send,
    {
        if !amount.is_finite() || amount < 0.0 {
            warn!(source = %source_id, target = %target_id, amount, "Rejected relation weight adjustment");
            return false;
        }

        let outcome = {
            let mut state = self.state.write();
            let mut old_weight = 0.0;
            let adjusted = state
                .graph
                .adjust_relation(&source_id, &target_id, relation_type, |relation| {
                    old_weight = relation.weight;
                    adjust(relation);
                });
            adjusted.map(|relation| {
                let due = state.batcher.enqueue(RelationWriteOp::update_weight(&relation));
                (old_weight, relation, due)
            })
        };

        let Some((old_weight, relation, due)) = outcome else {
            debug!(source = %source_id, target = %target_id, "No such relation to adjust");
            return false;
        };

        self.publish_weight_change(old_weight, relation);
        if due {
            self.flush_due().await;
        }
        true
    }

    fn publish_weight_change(&self, old_weight: f64, relation: PatternRelation) {
        self.event_bus.publish(KnowledgeEvent::RelationWeightChanged {
            source_id: relation.source_id,
            target_id: relation.target_id,
            relation_type: relation.relation_type,
            old_weight,
            new_weight: relation.weight,
            timestamp: Utc::now(),
        });
    }

    /// Patterns reachable from `id` within `depth` outgoing hops.
    pub fn related(
        &self,
        id: &PatternId,
        relation_type: Option<&str>,
        depth: usize,
    ) -> Vec<Pattern> {
        let state = self.state.read();
        related_ids(&state.graph, id, relation_type, depth)
            .into_iter()
            .filter_map(|related| state.graph.get(&related).cloned())
            .collect()
    }

    pub fn all_connections(&self) -> Vec<RelationshipRecord> {
        let state = self.state.read();
        state.graph.relations().map(relationship_record).collect()
    }

    // ========================================================================
    // Usage & confidence
    // ========================================================================

    /// Record a usage and reinforce every outgoing relation of the pattern.
    ///
    /// Each outgoing weight becomes `weight * (1 + usage_count / divisor)`,
    /// where `usage_count` is the pattern's total usages including this one.
    /// Unknown patterns are ignored and yield `Ok(None)`.
    pub async fn record_usage(
        &self,
        pattern_id: &PatternId,
        context: Metadata,
    ) -> Result<Option<u64>, KnowledgeStoreError> {
        let known = self.state.read().graph.contains_pattern(pattern_id);
        if !known {
            warn!(pattern_id = %pattern_id, "Usage recorded for unknown pattern; ignoring");
            return Ok(None);
        }

        let usage = PatternUsage::new(*pattern_id, context);
        let usage_count = self.provider.record_usage(&usage).await?;

        let policy = self.weight_policy;
        let (changes, due) = {
            let mut state = self.state.write();
            let mut old_weights = Vec::new();
            let updated = state.graph.reweight_outgoing(pattern_id, |weight| {
                old_weights.push(weight);
                policy.reinforce(weight, usage_count)
            });
            let mut due = false;
            for relation in &updated {
                due |= state.batcher.enqueue(RelationWriteOp::update_weight(relation));
            }
            (old_weights.into_iter().zip(updated).collect::<Vec<_>>(), due)
        };

        counter!("cortex_usages_recorded_total").increment(1);
        debug!(
            pattern_id = %pattern_id,
            usage_count,
            reinforced = changes.len(),
            "Recorded pattern usage"
        );
        self.event_bus.publish(KnowledgeEvent::PatternUsed {
            pattern_id: *pattern_id,
            usage_count,
            timestamp: Utc::now(),
        });
        for (old_weight, relation) in changes {
            self.publish_weight_change(old_weight, relation);
        }

        if due {
            self.flush_due().await;
        }
        Ok(Some(usage_count))
    }

    pub fn confidence_metrics(&self) -> ConfidenceMetrics {
        ConfidenceMetrics::compute(&self.state.read().graph)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Distinct focus areas of cached patterns, sorted.
    pub fn all_focus_areas(&self) -> Vec<String> {
        let state = self.state.read();
        focus_areas_of(&state.graph)
    }

    /// Focus areas visible to an actor. No per-actor tracking: every actor
    /// sees all of them.
    pub fn focus_areas(&self, actor_id: &str) -> Vec<String> {
        debug!(actor_id, "Focus areas requested");
        self.all_focus_areas()
    }

    /// Patterns, relationships and focus areas read under one lock.
    pub fn get_current_state(&self) -> KnowledgeSnapshot {
        let state = self.state.read();
        KnowledgeSnapshot {
            patterns: state.graph.patterns().cloned().collect(),
            relationships: state.graph.relations().map(relationship_record).collect(),
            focus_areas: focus_areas_of(&state.graph),
        }
    }

    pub fn pending_operations(&self) -> usize {
        self.state.read().batcher.len()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.state.read();
        StoreStats {
            patterns: state.graph.pattern_count(),
            relations: state.graph.relation_count(),
            pending_operations: state.batcher.len(),
            tags: state.tags.len(),
        }
    }

    // ========================================================================
    // Findings
    // ========================================================================

    /// Translate a finding into store mutations.
    ///
    /// Pattern findings get `confidence`, `focus_area` and `timestamp`
    /// merged into their metadata; connections use the finding confidence
    /// as weight; anything else is indexed.
    pub async fn integrate_finding(
        &self,
        finding: Finding,
    ) -> Result<IntegrationOutcome, KnowledgeStoreError> {
        match &finding.content {
            FindingContent::Pattern(draft) => {
                let mut draft = draft.clone();
                draft
                    .metadata
                    .insert(keys::CONFIDENCE.to_string(), finding.confidence.into());
                if let Some(area) = &finding.focus_area {
                    draft
                        .metadata
                        .insert(keys::FOCUS_AREA.to_string(), area.clone().into());
                }
                draft.metadata.insert(
                    keys::TIMESTAMP.to_string(),
                    finding.timestamp.to_rfc3339().into(),
                );
                let pattern = self.add_pattern(draft).await?;
                Ok(IntegrationOutcome::Pattern(pattern))
            }
            FindingContent::Connection {
                from,
                to,
                relation_type,
            } => {
                let added = self
                    .add_relation(*from, *to, relation_type.clone(), finding.confidence)
                    .await;
                Ok(IntegrationOutcome::Relation { added })
            }
            FindingContent::Observation { .. } => {
                let pattern = self.index_finding(&finding).await?;
                Ok(IntegrationOutcome::Indexed(pattern))
            }
        }
    }

    /// Store any finding as a catch-all pattern with an empty template.
    ///
    /// Skips similarity dedup: indexed findings share the name
    /// `Finding: <type>` and would otherwise collapse into one.
    pub async fn index_finding(&self, finding: &Finding) -> Result<Pattern, KnowledgeStoreError> {
        let finding_type = finding.finding_type().to_string();

        let mut metadata = Metadata::new();
        metadata.insert(keys::TYPE.to_string(), "finding".into());
        metadata.insert(keys::FINDING_TYPE.to_string(), finding_type.clone().into());
        metadata.insert(keys::CONFIDENCE.to_string(), finding.confidence.into());
        metadata.insert(
            keys::CONTEXT.to_string(),
            MetadataValue::Map(finding.context.clone()),
        );
        metadata.insert(
            keys::TIMESTAMP.to_string(),
            finding.timestamp.to_rfc3339().into(),
        );
        if let Some(area) = &finding.focus_area {
            metadata.insert(keys::FOCUS_AREA.to_string(), area.clone().into());
        }

        let draft = PatternDraft::new(format!("Finding: {}", finding_type), "")
            .description(finding.summary())
            .tags([finding_type])
            .metadata(metadata);

        let _insert = self.insert_lock.lock().await;
        self.store_new_pattern(draft).await
    }

    /// Bulk-apply an actor's understanding: every pattern through
    /// `add_pattern` (with `context` and a timestamp in its metadata), then
    /// every relationship through `add_relation`.
    pub async fn integrate_understanding(
        &self,
        knowledge: KnowledgeState,
        context: Metadata,
    ) -> Result<UnderstandingReport, KnowledgeStoreError> {
        let mut report = UnderstandingReport::default();
        let timestamp = Utc::now().to_rfc3339();

        for mut draft in knowledge.patterns {
            draft
                .metadata
                .insert(keys::CONTEXT.to_string(), MetadataValue::Map(context.clone()));
            draft
                .metadata
                .insert(keys::TIMESTAMP.to_string(), timestamp.clone().into());
            report.patterns.push(self.add_pattern(draft).await?);
        }

        for record in knowledge.relationships {
            if self
                .add_relation(record.from, record.to, record.relation_type, record.weight)
                .await
            {
                report.relations_added += 1;
            }
        }

        info!(
            patterns = report.patterns.len(),
            relations_added = report.relations_added,
            "Integrated actor understanding"
        );
        Ok(report)
    }
}

fn relationship_record(relation: &PatternRelation) -> RelationshipRecord {
    RelationshipRecord {
        from: relation.source_id,
        to: relation.target_id,
        relation_type: relation.relation_type.clone(),
        weight: relation.weight,
    }
}

fn focus_areas_of(graph: &PatternGraph) -> Vec<String> {
    graph
        .patterns()
        .filter_map(Pattern::focus_area)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
