// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Relation weight reinforcement and aggregate confidence gauges.

use serde::{Deserialize, Serialize};

use super::graph::PatternGraph;

/// Aggregate confidence over the cached graph.
///
/// Informational only. Values may exceed 1.0 once usage reinforcement has
/// pushed relation weights above 1.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub pattern_confidence: f64,
    pub relation_confidence: f64,
    pub overall_confidence: f64,
}

impl ConfidenceMetrics {
    pub fn compute(graph: &PatternGraph) -> Self {
        let (pattern_sum, pattern_count) = graph
            .patterns()
            .fold((0.0, 0usize), |(sum, n), p| (sum + p.confidence(), n + 1));
        let (relation_sum, relation_count) = graph
            .relations()
            .fold((0.0, 0usize), |(sum, n), r| (sum + r.weight, n + 1));

        let pattern_confidence = pattern_sum / pattern_count.max(1) as f64;
        let relation_confidence = relation_sum / relation_count.max(1) as f64;

        Self {
            pattern_confidence,
            relation_confidence,
            overall_confidence: (pattern_confidence + relation_confidence) / 2.0,
        }
    }
}

/// Usage-driven weight growth: `weight * (1 + usage_count / usage_divisor)`,
/// optionally saturating at `max_weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightPolicy {
    pub usage_divisor: f64,
    pub max_weight: Option<f64>,
}

impl WeightPolicy {
    pub const DEFAULT_USAGE_DIVISOR: f64 = 100.0;

    pub fn new(usage_divisor: f64, max_weight: Option<f64>) -> Self {
        Self {
            usage_divisor,
            max_weight,
        }
    }

    pub fn reinforcement_factor(&self, usage_count: u64) -> f64 {
        1.0 + usage_count as f64 / self.usage_divisor
    }

    pub fn reinforce(&self, weight: f64, usage_count: u64) -> f64 {
        self.clamp(weight * self.reinforcement_factor(usage_count))
    }

    pub fn clamp(&self, weight: f64) -> f64 {
        match self.max_weight {
            Some(cap) => weight.min(cap),
            None => weight,
        }
    }
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_USAGE_DIVISOR, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::{keys, MetadataValue, Pattern, PatternId, PatternRelation};

    #[test]
    fn test_reinforcement_is_multiplicative_and_unbounded_by_default() {
        let policy = WeightPolicy::default();
        assert!((policy.reinforce(1.0, 1) - 1.01).abs() < 1e-12);
        assert!((policy.reinforce(1.01, 2) - 1.0302).abs() < 1e-12);
        assert!(policy.reinforce(50.0, 500) > 50.0);
    }

    #[test]
    fn test_cap_saturates() {
        let policy = WeightPolicy::new(100.0, Some(1.5));
        assert_eq!(policy.reinforce(1.4, 50), 1.5);
        assert_eq!(policy.clamp(0.3), 0.3);
    }

    #[test]
    fn test_empty_graph_metrics_are_zero() {
        let metrics = ConfidenceMetrics::compute(&PatternGraph::default());
        assert_eq!(metrics, ConfidenceMetrics::default());
    }

    #[test]
    fn test_metrics_average_patterns_and_edges() {
        let mut graph = PatternGraph::default();
        let mut ids = Vec::new();
        for confidence in [0.2, 0.6] {
            let mut pattern = Pattern::new("p", "", "");
            pattern.id = Some(PatternId::new());
            pattern
                .metadata
                .insert(keys::CONFIDENCE.to_string(), MetadataValue::Number(confidence));
            ids.push(graph.upsert_pattern(pattern).unwrap());
        }
        graph.insert_relation(PatternRelation::new(ids[0], ids[1], "uses", 0.8));

        let metrics = ConfidenceMetrics::compute(&graph);
        assert!((metrics.pattern_confidence - 0.4).abs() < 1e-12);
        assert!((metrics.relation_confidence - 0.8).abs() < 1e-12);
        assert!((metrics.overall_confidence - 0.6).abs() < 1e-12);
    }
}
