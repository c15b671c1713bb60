// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern Domain Model
//!
//! A [`Pattern`] is a named, reusable knowledge unit: a template body plus
//! free text, shared [`Tag`]s and an open [`Metadata`] bag. Patterns are
//! linked by directed, typed, weighted [`PatternRelation`]s and every
//! application of a pattern is recorded as a [`PatternUsage`].
//!
//! Identity is assigned by the persistence provider on first write, so a
//! freshly built `Pattern` carries `id: None` until it has been stored.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default step used by [`PatternRelation::strengthen`] / [`PatternRelation::weaken`].
pub const DEFAULT_WEIGHT_STEP: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub Uuid);

impl PatternId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PatternId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata keys the store itself reads or writes.
pub mod keys {
    pub const CONFIDENCE: &str = "confidence";
    pub const FOCUS_AREA: &str = "focus_area";
    pub const LANGUAGE: &str = "language";
    pub const FRAMEWORK: &str = "framework";
    pub const TIMESTAMP: &str = "timestamp";
    pub const CONTEXT: &str = "context";
    pub const TYPE: &str = "type";
    pub const FINDING_TYPE: &str = "finding_type";
}

/// A single metadata value.
///
/// Closed set of variants so pattern attributes stay statically typed while
/// remaining extensible through nested maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
    Map(BTreeMap<String, MetadataValue>),
}

pub type Metadata = BTreeMap<String, MetadataValue>;

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MetadataValue>> {
        match self {
            MetadataValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<Metadata> for MetadataValue {
    fn from(value: Metadata) -> Self {
        MetadataValue::Map(value)
    }
}

/// Shared label entity. Equality, ordering and hashing use `name` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// Stored, reusable knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: Option<PatternId>,
    pub name: String,
    pub template: String,
    pub description: String,
    pub tags: BTreeSet<Tag>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Pattern {
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            template: template.into(),
            description: description.into(),
            tags: BTreeSet::new(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add a tag. Returns `false` when the tag was already present.
    pub fn add_tag(&mut self, tag: Tag) -> bool {
        let inserted = self.tags.insert(tag);
        if inserted {
            self.mark_updated();
        }
        inserted
    }

    /// Remove a tag by name. Returns `false` when no such tag was attached.
    pub fn remove_tag(&mut self, name: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t.name != name);
        let removed = self.tags.len() != before;
        if removed {
            self.mark_updated();
        }
        removed
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    pub fn update_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
        self.mark_updated();
    }

    pub fn update_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.mark_updated();
    }

    fn mark_updated(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// `metadata.confidence`, or 0.0 when missing or not numeric.
    pub fn confidence(&self) -> f64 {
        self.metadata
            .get(keys::CONFIDENCE)
            .and_then(MetadataValue::as_f64)
            .unwrap_or(0.0)
    }

    pub fn focus_area(&self) -> Option<&str> {
        self.metadata.get(keys::FOCUS_AREA).and_then(MetadataValue::as_str)
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata.get(keys::LANGUAGE).and_then(MetadataValue::as_str)
    }

    pub fn framework(&self) -> Option<&str> {
        self.metadata.get(keys::FRAMEWORK).and_then(MetadataValue::as_str)
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }
}

/// Caller-supplied content for a new pattern, before dedup and identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternDraft {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl PatternDraft {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// In-place mutation applied by `KnowledgeStore::update_pattern`.
#[derive(Debug, Clone, Default)]
pub struct PatternUpdate {
    pub template: Option<String>,
    pub description: Option<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

impl PatternUpdate {
    pub fn is_empty(&self) -> bool {
        self.template.is_none()
            && self.description.is_none()
            && self.add_tags.is_empty()
            && self.remove_tags.is_empty()
    }
}

/// Directed, typed, weighted edge between two patterns.
///
/// `relation_type` is free-form ("implements", "uses", "relates_to", ...).
/// `created_at` never changes after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRelation {
    pub source_id: PatternId,
    pub target_id: PatternId,
    pub relation_type: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl PatternRelation {
    pub fn new(
        source_id: PatternId,
        target_id: PatternId,
        relation_type: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            source_id,
            target_id,
            relation_type: relation_type.into(),
            weight,
            created_at: Utc::now(),
        }
    }

    /// Increase weight. No upper clamp; the result never drops below 0.0.
    pub fn strengthen(&mut self, amount: f64) {
        self.weight = (self.weight + amount).max(0.0);
    }

    /// Decrease weight, floor-clamped at 0.0.
    pub fn weaken(&mut self, amount: f64) {
        self.weight = (self.weight - amount).max(0.0);
    }
}

/// Record that a pattern was applied. Input signal for weight reinforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternUsage {
    pub pattern_id: PatternId,
    pub context: Metadata,
    pub used_at: DateTime<Utc>,
}

impl PatternUsage {
    pub fn new(pattern_id: PatternId, context: Metadata) -> Self {
        Self {
            pattern_id,
            context,
            used_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pattern_has_no_identity() {
        let pattern = Pattern::new("Retry", "for i in range(3): ...", "retry loop");
        assert!(pattern.id.is_none());
        assert!(pattern.updated_at.is_none());
        assert_eq!(pattern.confidence(), 0.0);
    }

    #[test]
    fn test_tag_mutations_touch_updated_at_only() {
        let mut pattern = Pattern::new("Retry", "loop", "");
        let created = pattern.created_at;

        assert!(pattern.add_tag(Tag::new("resilience")));
        assert!(pattern.updated_at.is_some());
        assert_eq!(pattern.created_at, created);

        // Re-adding the same tag is a no-op
        let stamp = pattern.updated_at;
        assert!(!pattern.add_tag(Tag::new("resilience")));
        assert_eq!(pattern.updated_at, stamp);

        assert!(pattern.remove_tag("resilience"));
        assert!(!pattern.remove_tag("resilience"));
        assert!(pattern.tags.is_empty());
    }

    #[test]
    fn test_tags_compare_by_name() {
        let a = Tag::new("react");
        let mut b = Tag::new("react");
        b.created_at = a.created_at - chrono::Duration::days(3);
        assert_eq!(a, b);

        let set: BTreeSet<Tag> = [a, b, Tag::new("hooks")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_template_and_description_updates() {
        let mut pattern = Pattern::new("Retry", "v1", "old");
        pattern.update_template("v2");
        pattern.update_description("new");
        assert_eq!(pattern.template, "v2");
        assert_eq!(pattern.description, "new");
        assert!(pattern.updated_at.unwrap() >= pattern.created_at);
    }

    #[test]
    fn test_relation_weaken_floors_at_zero() {
        let mut rel = PatternRelation::new(PatternId::new(), PatternId::new(), "uses", 0.15);
        rel.weaken(DEFAULT_WEIGHT_STEP);
        assert!((rel.weight - 0.05).abs() < 1e-12);
        rel.weaken(1.0);
        assert_eq!(rel.weight, 0.0);
        rel.strengthen(2.5);
        assert_eq!(rel.weight, 2.5);
        rel.strengthen(-4.0);
        assert_eq!(rel.weight, 0.0);
    }

    #[test]
    fn test_metadata_accessors() {
        let pattern = Pattern::new("Hook", "useState()", "").with_metadata(Metadata::from([
            (keys::CONFIDENCE.to_string(), MetadataValue::Number(0.75)),
            (keys::FOCUS_AREA.to_string(), MetadataValue::from("react")),
            (keys::LANGUAGE.to_string(), MetadataValue::from("typescript")),
        ]));
        assert_eq!(pattern.confidence(), 0.75);
        assert_eq!(pattern.focus_area(), Some("react"));
        assert_eq!(pattern.language(), Some("typescript"));
        assert_eq!(pattern.framework(), None);
    }

    #[test]
    fn test_metadata_json_shape() {
        let mut nested = Metadata::new();
        nested.insert("actor".to_string(), MetadataValue::from("researcher-1"));
        let metadata = Metadata::from([
            ("confidence".to_string(), MetadataValue::Number(0.5)),
            ("verified".to_string(), MetadataValue::Bool(true)),
            ("context".to_string(), MetadataValue::Map(nested)),
        ]);

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["confidence"], serde_json::json!(0.5));
        assert_eq!(json["context"]["actor"], serde_json::json!("researcher-1"));

        let parsed: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, metadata);
    }
}
