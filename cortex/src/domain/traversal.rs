// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bounded-depth reachability over outgoing edges.

use std::collections::HashSet;

use super::graph::PatternGraph;
use super::pattern::PatternId;

/// Ids reachable from `start` within `depth` hops, excluding `start` itself.
///
/// Expansion is level by level along outgoing edges only, keeping edges of
/// `relation_type` when one is given. Results are in discovery order.
/// `depth == 0` or an unknown start yields nothing.
pub fn related_ids(
    graph: &PatternGraph,
    start: &PatternId,
    relation_type: Option<&str>,
    depth: usize,
) -> Vec<PatternId> {
    if depth == 0 || !graph.contains_node(start) {
        return Vec::new();
    }

    let mut visited: HashSet<PatternId> = HashSet::from([*start]);
    let mut reached = Vec::new();
    let mut frontier = vec![*start];

    for _ in 0..depth {
        let mut next = Vec::new();
        for id in &frontier {
            for neighbour in graph.successors(id, relation_type) {
                if visited.insert(neighbour) {
                    reached.push(neighbour);
                    next.push(neighbour);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::{Pattern, PatternRelation};

    fn add(graph: &mut PatternGraph, name: &str) -> PatternId {
        let mut pattern = Pattern::new(name, "", "");
        pattern.id = Some(PatternId::new());
        graph.upsert_pattern(pattern).unwrap()
    }

    #[test]
    fn test_cycle_does_not_revisit_start() {
        let mut graph = PatternGraph::default();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        graph.insert_relation(PatternRelation::new(a, b, "uses", 1.0));
        graph.insert_relation(PatternRelation::new(b, a, "uses", 1.0));

        assert_eq!(related_ids(&graph, &a, None, 5), vec![b]);
    }

    #[test]
    fn test_edges_are_not_followed_backwards() {
        let mut graph = PatternGraph::default();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        graph.insert_relation(PatternRelation::new(a, b, "uses", 1.0));

        assert!(related_ids(&graph, &b, None, 3).is_empty());
    }

    #[test]
    fn test_zero_depth_and_unknown_start() {
        let mut graph = PatternGraph::default();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        graph.insert_relation(PatternRelation::new(a, b, "uses", 1.0));

        assert!(related_ids(&graph, &a, None, 0).is_empty());
        assert!(related_ids(&graph, &PatternId::new(), None, 2).is_empty());
    }

    #[test]
    fn test_type_filter_applies_at_every_hop() {
        let mut graph = PatternGraph::default();
        let a = add(&mut graph, "a");
        let b = add(&mut graph, "b");
        let c = add(&mut graph, "c");
        let d = add(&mut graph, "d");
        graph.insert_relation(PatternRelation::new(a, b, "uses", 1.0));
        graph.insert_relation(PatternRelation::new(b, c, "extends", 1.0));
        graph.insert_relation(PatternRelation::new(b, d, "uses", 1.0));

        assert_eq!(related_ids(&graph, &a, Some("uses"), 2), vec![b, d]);
    }
}
