// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into [`PostgresPersistenceProvider`](super::repositories::PostgresPersistenceProvider),
//! and owns the cortex schema bootstrap.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Idempotent DDL for the cortex tables.
///
/// Relations carry no foreign keys: a relation may be recorded before its
/// endpoints are stored.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cortex_patterns (
        id UUID PRIMARY KEY,
        seq BIGSERIAL,
        name TEXT NOT NULL,
        template TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cortex_tags (
        name TEXT PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cortex_pattern_tags (
        pattern_id UUID NOT NULL REFERENCES cortex_patterns(id) ON DELETE CASCADE,
        tag_name TEXT NOT NULL REFERENCES cortex_tags(name),
        PRIMARY KEY (pattern_id, tag_name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cortex_pattern_relations (
        id BIGSERIAL PRIMARY KEY,
        source_id UUID NOT NULL,
        target_id UUID NOT NULL,
        relation_type TEXT NOT NULL,
        weight DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (source_id, target_id, relation_type)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cortex_pattern_usages (
        id BIGSERIAL PRIMARY KEY,
        pattern_id UUID NOT NULL,
        context JSONB NOT NULL DEFAULT '{}'::jsonb,
        used_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cortex_pattern_usages_pattern ON cortex_pattern_usages (pattern_id)",
];

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the cortex tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Cortex schema ensured");
        Ok(())
    }
}
