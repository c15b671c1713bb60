// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provider Factory
//!
//! Creates the concrete [`PersistenceProvider`] for the configured backend,
//! so the application layer only ever sees the trait object.

use std::sync::Arc;

use anyhow::Context;

use crate::domain::config::PersistenceConfig;
use crate::domain::repository::PersistenceProvider;
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryPersistenceProvider, PostgresPersistenceProvider,
};

/// Creates a PersistenceProvider implementation based on the configured backend.
///
/// The PostgreSQL backend connects and bootstraps its schema before returning.
pub async fn create_persistence_provider(
    config: &PersistenceConfig,
) -> anyhow::Result<Arc<dyn PersistenceProvider>> {
    match config {
        PersistenceConfig::InMemory => {
            tracing::info!("Using in-memory cortex persistence");
            Ok(Arc::new(InMemoryPersistenceProvider::new()))
        }
        PersistenceConfig::Postgres {
            connection_string,
            max_connections,
        } => {
            let database = Database::new(connection_string, *max_connections)
                .await
                .context("Failed to connect to cortex database")?;
            database
                .ensure_schema()
                .await
                .context("Failed to bootstrap cortex schema")?;
            tracing::info!(max_connections, "Using PostgreSQL cortex persistence");
            Ok(Arc::new(PostgresPersistenceProvider::new(
                database.get_pool().clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::Pattern;

    #[tokio::test]
    async fn test_in_memory_backend() {
        let provider = create_persistence_provider(&PersistenceConfig::InMemory)
            .await
            .unwrap();
        let stored = provider
            .upsert_pattern(&Pattern::new("Retry", "loop", ""))
            .await
            .unwrap();
        assert!(stored.id.is_some());
    }
}
