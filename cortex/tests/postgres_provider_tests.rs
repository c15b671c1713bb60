// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run with a live database:
//! `DATABASE_URL=postgres://... cargo test -p aegis-cortex -- --ignored`

use std::collections::BTreeSet;
use std::sync::Arc;

use aegis_cortex::domain::pattern::{
    Metadata, Pattern, PatternId, PatternRelation, PatternUsage, Tag,
};
use aegis_cortex::domain::repository::{PersistenceProvider, RelationWriteOp};
use aegis_cortex::infrastructure::db::Database;
use aegis_cortex::infrastructure::repositories::PostgresPersistenceProvider;

async fn provider() -> PostgresPersistenceProvider {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let database = Database::new(&url, 2).await.unwrap();
    database.ensure_schema().await.unwrap();
    PostgresPersistenceProvider::new(database.get_pool().clone())
}

#[tokio::test]
#[ignore]
async fn test_pattern_upsert_and_load() {
    let provider = provider().await;
    let pattern = Pattern::new("Retry", "for i in range(3): ...", "retry loop")
        .with_tags([Tag::new("resilience")]);

    let stored = provider.upsert_pattern(&pattern).await.unwrap();
    let id = stored.id.unwrap();

    let mut changed = stored.clone();
    changed.update_template("loop with backoff");
    let again = provider.upsert_pattern(&changed).await.unwrap();
    assert_eq!(again.id, Some(id));

    let loaded = provider.load_all().await.unwrap();
    let found = loaded.patterns.iter().find(|p| p.id == Some(id)).unwrap();
    assert_eq!(found.template, "loop with backoff");
    assert!(found.has_tag("resilience"));
}

#[tokio::test]
#[ignore]
async fn test_replayed_batch_is_idempotent() {
    let provider = provider().await;
    let (a, b) = (PatternId::new(), PatternId::new());
    let batch = vec![
        RelationWriteOp::Insert(PatternRelation::new(a, b, "uses", 0.5)),
        RelationWriteOp::UpdateWeight {
            source_id: a,
            target_id: b,
            relation_type: "uses".to_string(),
            weight: 0.8,
        },
    ];

    provider.write_batch(&batch).await.unwrap();
    provider.write_batch(&batch).await.unwrap();

    let loaded = provider.load_all().await.unwrap();
    let matching: Vec<_> = loaded
        .relations
        .iter()
        .filter(|r| r.source_id == a && r.target_id == b)
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].weight, 0.8);
}

#[tokio::test]
#[ignore]
async fn test_usage_count_accumulates() {
    let provider = provider().await;
    let id = PatternId::new();

    assert_eq!(provider.record_usage(&PatternUsage::new(id, Metadata::new())).await.unwrap(), 1);
    assert_eq!(provider.record_usage(&PatternUsage::new(id, Metadata::new())).await.unwrap(), 2);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_usages_get_distinct_counts() {
    let provider = Arc::new(provider().await);
    let id = PatternId::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let provider = provider.clone();
        handles.push(tokio::spawn(async move {
            provider
                .record_usage(&PatternUsage::new(id, Metadata::new()))
                .await
                .unwrap()
        }));
    }

    let mut counts = BTreeSet::new();
    for handle in handles {
        counts.insert(handle.await.unwrap());
    }
    assert_eq!(counts, (1..=8).collect::<BTreeSet<u64>>());
}
