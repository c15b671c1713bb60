// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory pattern graph.
//!
//! Nodes are pattern identities carrying a cached snapshot of the pattern,
//! edges are [`PatternRelation`]s. The identity index and the relation-key
//! dedup set are views over the petgraph storage and are only ever updated
//! together with it, inside the same `&mut self` call.

use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::pattern::{Pattern, PatternId, PatternRelation};

/// How relations are deduplicated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKeying {
    /// At most one edge per ordered `(source, target)` pair.
    #[default]
    Pair,
    /// At most one edge per `(source, target, relation_type)`.
    Typed,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationKey {
    pub source_id: PatternId,
    pub target_id: PatternId,
    pub relation_type: Option<String>,
}

impl RelationKey {
    pub fn for_relation(keying: RelationKeying, relation: &PatternRelation) -> Self {
        Self::new(
            keying,
            relation.source_id,
            relation.target_id,
            Some(&relation.relation_type),
        )
    }

    pub fn new(
        keying: RelationKeying,
        source_id: PatternId,
        target_id: PatternId,
        relation_type: Option<&str>,
    ) -> Self {
        let relation_type = match keying {
            RelationKeying::Pair => None,
            RelationKeying::Typed => relation_type.map(str::to_string),
        };
        Self {
            source_id,
            target_id,
            relation_type,
        }
    }
}

/// Node payload. `snapshot` is `None` for endpoints only known through a relation.
#[derive(Debug, Clone)]
struct PatternNode {
    id: PatternId,
    snapshot: Option<Pattern>,
}

pub struct PatternGraph {
    graph: StableDiGraph<PatternNode, PatternRelation>,
    identities: HashMap<PatternId, NodeIndex>,
    relation_keys: HashMap<RelationKey, EdgeIndex>,
    keying: RelationKeying,
    pattern_count: usize,
}

impl PatternGraph {
    pub fn new(keying: RelationKeying) -> Self {
        Self {
            graph: StableDiGraph::new(),
            identities: HashMap::new(),
            relation_keys: HashMap::new(),
            keying,
            pattern_count: 0,
        }
    }

    fn ensure_node(&mut self, id: PatternId) -> NodeIndex {
        if let Some(&idx) = self.identities.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(PatternNode { id, snapshot: None });
        self.identities.insert(id, idx);
        idx
    }

    /// Insert or refresh the cached snapshot of a stored pattern.
    ///
    /// Returns `None` when the pattern has no identity yet.
    pub fn upsert_pattern(&mut self, pattern: Pattern) -> Option<PatternId> {
        let id = pattern.id?;
        let idx = self.ensure_node(id);
        let node = self.graph.node_weight_mut(idx)?;
        if node.snapshot.is_none() {
            self.pattern_count += 1;
        }
        node.snapshot = Some(pattern);
        Some(id)
    }

    pub fn get(&self, id: &PatternId) -> Option<&Pattern> {
        let idx = self.identities.get(id)?;
        self.graph.node_weight(*idx)?.snapshot.as_ref()
    }

    /// True when a snapshot of the pattern is cached.
    pub fn contains_pattern(&self, id: &PatternId) -> bool {
        self.get(id).is_some()
    }

    /// True when the id is a node, cached or placeholder.
    pub fn contains_node(&self, id: &PatternId) -> bool {
        self.identities.contains_key(id)
    }

    /// Cached patterns in insertion order.
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> + '_ {
        self.graph
            .node_indices()
            .filter_map(move |idx| self.graph.node_weight(idx))
            .filter_map(|node| node.snapshot.as_ref())
    }

    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    pub fn relation_count(&self) -> usize {
        debug_assert_eq!(
            self.relation_keys.len(),
            self.graph.edge_count(),
            "relation key set diverged from graph edges"
        );
        self.graph.edge_count()
    }

    /// Add an edge unless its key is already tracked.
    ///
    /// Unknown endpoints become placeholder nodes. Returns `false` for a
    /// duplicate key, leaving the existing edge untouched.
    pub fn insert_relation(&mut self, relation: PatternRelation) -> bool {
        let key = RelationKey::for_relation(self.keying, &relation);
        if self.relation_keys.contains_key(&key) {
            return false;
        }
        let source = self.ensure_node(relation.source_id);
        let target = self.ensure_node(relation.target_id);
        let edge = self.graph.add_edge(source, target, relation);
        self.relation_keys.insert(key, edge);
        debug_assert_eq!(self.relation_keys.len(), self.graph.edge_count());
        true
    }

    /// First edge `source -> target`, optionally restricted to one relation type.
    pub fn find_edge(
        &self,
        source_id: &PatternId,
        target_id: &PatternId,
        relation_type: Option<&str>,
    ) -> Option<&PatternRelation> {
        let edge = self.find_edge_index(source_id, target_id, relation_type)?;
        self.graph.edge_weight(edge)
    }

    fn find_edge_index(
        &self,
        source_id: &PatternId,
        target_id: &PatternId,
        relation_type: Option<&str>,
    ) -> Option<EdgeIndex> {
        let source = *self.identities.get(source_id)?;
        let target = *self.identities.get(target_id)?;
        self.graph
            .edges_connecting(source, target)
            .find(|edge| relation_type.is_none_or(|t| edge.weight().relation_type == t))
            .map(|edge| edge.id())
    }

    /// Apply `adjust` to a tracked edge and return its new state.
    pub fn adjust_relation<F>(
        &mut self,
        source_id: &PatternId,
        target_id: &PatternId,
        relation_type: Option<&str>,
        adjust: F,
    ) -> Option<PatternRelation>
    where
        F: FnOnce(&mut PatternRelation),
    {
        let edge = self.find_edge_index(source_id, target_id, relation_type)?;
        let relation = self.graph.edge_weight_mut(edge)?;
        adjust(relation);
        Some(relation.clone())
    }

    /// Outgoing neighbour ids, optionally filtered by relation type.
    pub fn successors(&self, id: &PatternId, relation_type: Option<&str>) -> Vec<PatternId> {
        let Some(&idx) = self.identities.get(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|edge| relation_type.is_none_or(|t| edge.weight().relation_type == t))
            .filter_map(|edge| self.graph.node_weight(edge.target()))
            .map(|node| node.id)
            .collect()
    }

    /// Rewrite the weight of every outgoing edge and return the updated edges.
    pub fn reweight_outgoing<F>(&mut self, id: &PatternId, mut reweight: F) -> Vec<PatternRelation>
    where
        F: FnMut(f64) -> f64,
    {
        let Some(&idx) = self.identities.get(id) else {
            return Vec::new();
        };
        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();

        let mut updated = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Some(relation) = self.graph.edge_weight_mut(edge) {
                relation.weight = reweight(relation.weight);
                updated.push(relation.clone());
            }
        }
        updated
    }

    /// All edges in insertion order.
    pub fn relations(&self) -> impl Iterator<Item = &PatternRelation> + '_ {
        self.graph
            .edge_indices()
            .filter_map(move |edge| self.graph.edge_weight(edge))
    }
}

impl Default for PatternGraph {
    fn default() -> Self {
        Self::new(RelationKeying::default())
    }
}
