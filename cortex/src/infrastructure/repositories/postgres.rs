// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Persistence Provider
//!
//! `PersistenceProvider` backed by the `cortex_*` tables (see
//! [`Database::ensure_schema`](crate::infrastructure::db::Database::ensure_schema)).
//!
//! - Patterns upsert on `id`; tags are shared rows in `cortex_tags` linked
//!   through `cortex_pattern_tags`.
//! - `write_batch` runs in one transaction. Relation inserts use
//!   `ON CONFLICT DO NOTHING` on `(source_id, target_id, relation_type)`, so a
//!   replayed batch changes nothing.
//! - Patterns load in first-insert order (`seq`), which keeps similarity
//!   dedup deterministic across restarts.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::pattern::{
    Metadata, Pattern, PatternId, PatternRelation, PatternUsage, Tag,
};
use crate::domain::repository::{
    LoadedKnowledge, PersistenceError, PersistenceProvider, RelationWriteOp,
};

pub struct PostgresPersistenceProvider {
    pool: PgPool,
}

impl PostgresPersistenceProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_tags(&self) -> Result<HashMap<Uuid, BTreeSet<Tag>>, PersistenceError> {
        let rows = sqlx::query(
            r#"
            SELECT pt.pattern_id, t.name, t.created_at
            FROM cortex_pattern_tags pt
            JOIN cortex_tags t ON t.name = pt.tag_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<Uuid, BTreeSet<Tag>> = HashMap::new();
        for row in rows {
            let pattern_id: Uuid = row.try_get("pattern_id")?;
            tags.entry(pattern_id).or_default().insert(Tag {
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(tags)
    }
}

fn parse_pattern_row(row: &PgRow, tags: &mut HashMap<Uuid, BTreeSet<Tag>>) -> Result<Pattern, PersistenceError> {
    let id: Uuid = row.try_get("id")?;
    let metadata_json: serde_json::Value = row.try_get("metadata")?;
    let metadata: Metadata = serde_json::from_value(metadata_json)?;
    let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at")?;

    Ok(Pattern {
        id: Some(PatternId(id)),
        name: row.try_get("name")?,
        template: row.try_get("template")?,
        description: row.try_get("description")?,
        tags: tags.remove(&id).unwrap_or_default(),
        metadata,
        created_at: row.try_get("created_at")?,
        updated_at,
    })
}

fn parse_relation_row(row: &PgRow) -> Result<PatternRelation, PersistenceError> {
    let source_id: Uuid = row.try_get("source_id")?;
    let target_id: Uuid = row.try_get("target_id")?;
    Ok(PatternRelation {
        source_id: PatternId(source_id),
        target_id: PatternId(target_id),
        relation_type: row.try_get("relation_type")?,
        weight: row.try_get("weight")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl PersistenceProvider for PostgresPersistenceProvider {
    async fn load_all(&self) -> Result<LoadedKnowledge, PersistenceError> {
        let mut tags = self.load_tags().await?;

        let pattern_rows = sqlx::query(
            r#"
            SELECT id, name, template, description, metadata, created_at, updated_at
            FROM cortex_patterns
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut patterns = Vec::with_capacity(pattern_rows.len());
        for row in &pattern_rows {
            patterns.push(parse_pattern_row(row, &mut tags)?);
        }

        let relation_rows = sqlx::query(
            r#"
            SELECT source_id, target_id, relation_type, weight, created_at
            FROM cortex_pattern_relations
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut relations = Vec::with_capacity(relation_rows.len());
        for row in &relation_rows {
            relations.push(parse_relation_row(row)?);
        }

        tracing::debug!(
            patterns = patterns.len(),
            relations = relations.len(),
            "Loaded knowledge from PostgreSQL"
        );
        Ok(LoadedKnowledge { patterns, relations })
    }

    async fn upsert_pattern(&self, pattern: &Pattern) -> Result<Pattern, PersistenceError> {
        let mut stored = pattern.clone();
        let id = *stored.id.get_or_insert_with(PatternId::new);
        let metadata_json = serde_json::to_value(&stored.metadata)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cortex_patterns (
                id, name, template, description, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                template = EXCLUDED.template,
                description = EXCLUDED.description,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(id.0)
        .bind(&stored.name)
        .bind(&stored.template)
        .bind(&stored.description)
        .bind(metadata_json)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::Database(format!("Failed to save pattern: {}", e)))?;

        for tag in &stored.tags {
            sqlx::query(
                r#"
                INSERT INTO cortex_tags (name, created_at)
                VALUES ($1, $2)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(&tag.name)
            .bind(tag.created_at)
            .execute(&mut *tx)
            .await?;
        }

        // Tags keep the registry's original created_at
        let names: Vec<String> = stored.tags.iter().map(|t| t.name.clone()).collect();
        let tag_rows = sqlx::query("SELECT name, created_at FROM cortex_tags WHERE name = ANY($1)")
            .bind(&names)
            .fetch_all(&mut *tx)
            .await?;
        let mut tags = BTreeSet::new();
        for row in &tag_rows {
            tags.insert(Tag {
                name: row.try_get("name")?,
                created_at: row.try_get("created_at")?,
            });
        }

        sqlx::query("DELETE FROM cortex_pattern_tags WHERE pattern_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        if !names.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO cortex_pattern_tags (pattern_id, tag_name)
                SELECT $1, UNNEST($2::text[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id.0)
            .bind(&names)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        stored.tags = tags;
        Ok(stored)
    }

    async fn write_batch(&self, operations: &[RelationWriteOp]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        for op in operations {
            match op {
                RelationWriteOp::Insert(relation) => {
                    sqlx::query(
                        r#"
                        INSERT INTO cortex_pattern_relations (
                            source_id, target_id, relation_type, weight, created_at
                        )
                        VALUES ($1, $2, $3, $4, $5)
                        ON CONFLICT (source_id, target_id, relation_type) DO NOTHING
                        "#,
                    )
                    .bind(relation.source_id.0)
                    .bind(relation.target_id.0)
                    .bind(&relation.relation_type)
                    .bind(relation.weight)
                    .bind(relation.created_at)
                    .execute(&mut *tx)
                    .await?;
                }
                RelationWriteOp::UpdateWeight {
                    source_id,
                    target_id,
                    relation_type,
                    weight,
                } => {
                    sqlx::query(
                        r#"
                        UPDATE cortex_pattern_relations
                        SET weight = $4
                        WHERE source_id = $1 AND target_id = $2 AND relation_type = $3
                        "#,
                    )
                    .bind(source_id.0)
                    .bind(target_id.0)
                    .bind(relation_type)
                    .bind(*weight)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn record_usage(&self, usage: &PatternUsage) -> Result<u64, PersistenceError> {
        let context_json = serde_json::to_value(&usage.context)?;

        let mut tx = self.pool.begin().await?;

        // Serialises concurrent usages of one pattern until commit, so each
        // caller counts its own insert and every earlier one
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(usage.pattern_id.0.to_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO cortex_pattern_usages (pattern_id, context, used_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(usage.pattern_id.0)
        .bind(context_json)
        .bind(usage.used_at)
        .execute(&mut *tx)
        .await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cortex_pattern_usages WHERE pattern_id = $1")
                .bind(usage.pattern_id.0)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(count.max(0) as u64)
    }
}
