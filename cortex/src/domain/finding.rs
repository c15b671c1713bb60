// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Findings and Knowledge Snapshots
//!
//! Boundary types exchanged with the research actors:
//!
//! - [`Finding`]: ephemeral input describing a discovered pattern, a
//!   connection between patterns, or any other observation.
//! - [`KnowledgeState`]: bulk understanding handed over when an actor is
//!   torn down.
//! - [`KnowledgeSnapshot`]: the store's current state as seen by actors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pattern::{Metadata, Pattern, PatternDraft, PatternId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindingContent {
    /// A reusable pattern worth storing.
    Pattern(PatternDraft),

    /// A directed relationship between two known patterns.
    Connection {
        from: PatternId,
        to: PatternId,
        relation_type: String,
    },

    /// Any other observation; indexed as a catch-all pattern.
    Observation {
        finding_type: String,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub content: FindingContent,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_area: Option<String>,
    #[serde(default)]
    pub context: Metadata,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    fn with_content(content: FindingContent, confidence: f64) -> Self {
        Self {
            content,
            confidence,
            focus_area: None,
            context: Metadata::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn pattern(draft: PatternDraft, confidence: f64) -> Self {
        Self::with_content(FindingContent::Pattern(draft), confidence)
    }

    pub fn connection(
        from: PatternId,
        to: PatternId,
        relation_type: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self::with_content(
            FindingContent::Connection {
                from,
                to,
                relation_type: relation_type.into(),
            },
            confidence,
        )
    }

    pub fn observation(
        finding_type: impl Into<String>,
        content: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self::with_content(
            FindingContent::Observation {
                finding_type: finding_type.into(),
                content: content.into(),
            },
            confidence,
        )
    }

    pub fn with_focus_area(mut self, focus_area: impl Into<String>) -> Self {
        self.focus_area = Some(focus_area.into());
        self
    }

    pub fn with_context(mut self, context: Metadata) -> Self {
        self.context = context;
        self
    }

    /// "pattern", "connection", or the observation's own type.
    pub fn finding_type(&self) -> &str {
        match &self.content {
            FindingContent::Pattern(_) => "pattern",
            FindingContent::Connection { .. } => "connection",
            FindingContent::Observation { finding_type, .. } => finding_type,
        }
    }

    /// Human-readable rendering of the content, used as the description of
    /// indexed findings.
    pub fn summary(&self) -> String {
        match &self.content {
            FindingContent::Pattern(draft) if draft.description.is_empty() => draft.name.clone(),
            FindingContent::Pattern(draft) => format!("{}: {}", draft.name, draft.description),
            FindingContent::Connection { from, to, relation_type } => {
                format!("{} -[{}]-> {}", from, relation_type, to)
            }
            FindingContent::Observation { content, .. } => content.clone(),
        }
    }
}

/// A relationship as exchanged with actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub from: PatternId,
    pub to: PatternId,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(default = "default_relationship_weight")]
    pub weight: f64,
}

fn default_relationship_weight() -> f64 {
    1.0
}

/// Bulk understanding from an actor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeState {
    #[serde(default)]
    pub patterns: Vec<PatternDraft>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

/// Current contents of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub patterns: Vec<Pattern>,
    pub relationships: Vec<RelationshipRecord>,
    pub focus_areas: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finding_type_names() {
        let p = Finding::pattern(PatternDraft::new("Retry", "loop"), 0.9);
        let c = Finding::connection(PatternId::new(), PatternId::new(), "uses", 0.4);
        let o = Finding::observation("insight", "Retries hide outages", 0.3);

        assert_eq!(p.finding_type(), "pattern");
        assert_eq!(c.finding_type(), "connection");
        assert_eq!(o.finding_type(), "insight");
    }

    #[test]
    fn test_relationship_weight_defaults_to_one() {
        let json = serde_json::json!({
            "from": PatternId::new(),
            "to": PatternId::new(),
            "type": "extends",
        });
        let record: RelationshipRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.weight, 1.0);
        assert_eq!(record.relation_type, "extends");
    }

    #[test]
    fn test_finding_content_tagging() {
        let finding = Finding::observation("question", "Why does X fail?", 0.2)
            .with_focus_area("debugging");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["content"]["type"], "observation");
        assert_eq!(json["content"]["finding_type"], "question");
        assert_eq!(json["focus_area"], "debugging");
    }
}
