//! End-to-end tests for catalog ingestion against the mock source
//!
//! These tests verify:
//! 1. Batched streaming and progress accounting
//! 2. Per-item drop tolerance
//! 3. Fatal index failures
//! 4. Classification lookups through the shared cache
//! 5. Stable identity across re-ingestion

use dexlab_ingest::source::{AbilitySlot, NamedRef, Sprites, StatEntry, TypeSlot};
use dexlab_ingest::*;
use dexlab_store::WorkingSet;
use std::sync::Arc;
use std::time::Duration;

fn named(name: &str, url: &str) -> NamedRef {
    NamedRef {
        name: name.to_string(),
        url: url.to_string(),
    }
}

fn species_url(species: u64) -> String {
    format!("mock://species/{species}")
}

fn detail_url(id: u64) -> String {
    format!("mock://pokemon/{id}")
}

fn record(id: u64, species: u64) -> RawSourceRecord {
    RawSourceRecord {
        id,
        name: format!("mon-{id}"),
        sprites: Sprites {
            front_default: Some(format!("mock://img/{id}.png")),
        },
        types: vec![TypeSlot {
            kind: named(if id % 2 == 0 { "water" } else { "fire" }, ""),
        }],
        stats: vec![StatEntry {
            base_stat: id as u32,
            stat: named("hp", ""),
        }],
        abilities: vec![AbilitySlot {
            ability: named("blaze", ""),
        }],
        species: named("species", &species_url(species)),
    }
}

/// `n` records, each with its own species labelled generation-ii.
fn catalog(n: u64) -> MockCatalogSource {
    (1..=n).fold(MockCatalogSource::new(), |source, id| {
        source.with_record(&detail_url(id), record(id, id), "generation-ii")
    })
}

fn config(batch_size: usize) -> IngestConfig {
    IngestConfig {
        batch_size,
        ..Default::default()
    }
}

// ============================================================================
// Streaming and progress
// ============================================================================

#[tokio::test]
async fn test_batches_stream_in_index_order() {
    let ingestor = Ingestor::new(Arc::new(catalog(45)), &config(20));
    let mut batches: Vec<Vec<u64>> = Vec::new();

    let summary = ingestor
        .ingest(
            |rows| batches.push(rows.iter().map(|r| r.source_id).collect()),
            |_| {},
        )
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(
        batches.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![20, 20, 5]
    );
    let flat: Vec<u64> = batches.into_iter().flatten().collect();
    assert_eq!(flat, (1..=45).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let source = catalog(45)
        .failing_record(&detail_url(3))
        .failing_record(&detail_url(44));
    let ingestor = Ingestor::new(Arc::new(source), &config(20));
    let mut reports = Vec::new();

    ingestor
        .ingest(|_| {}, |progress| reports.push(progress))
        .await
        .unwrap();

    let done: Vec<usize> = reports.iter().map(|p| p.done).collect();
    assert_eq!(done, vec![20, 40, 45]);
    assert!(reports.iter().all(|p| p.total == 45 && p.done <= p.total));
    assert!(reports.last().unwrap().is_complete());
}

#[tokio::test]
async fn test_total_ignores_reported_count() {
    let source = catalog(5).with_reported_count(1302);
    let ingestor = Ingestor::new(Arc::new(source), &config(2));
    let mut last = None;

    let summary = ingestor
        .ingest(|_| {}, |progress| last = Some(progress))
        .await
        .unwrap();

    assert_eq!(summary.total, 5);
    assert_eq!(last, Some(IngestProgress { done: 5, total: 5 }));
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_failed_items_are_dropped_not_fatal() {
    let source = catalog(10)
        .failing_record(&detail_url(2))
        .failing_record(&detail_url(5))
        .failing_record(&detail_url(9));
    let ingestor = Ingestor::new(Arc::new(source), &config(10));
    let mut emitted = Vec::new();

    let summary = ingestor
        .ingest(|rows| emitted.push(rows.len()), |_| {})
        .await
        .unwrap();

    assert_eq!(emitted, vec![7]);
    assert_eq!(summary.fetched, 7);
    assert_eq!(summary.dropped, 3);
}

#[tokio::test]
async fn test_index_failure_is_fatal() {
    let source = catalog(3).failing_index();
    let ingestor = Ingestor::new(Arc::new(source), &config(20));
    let mut called = false;

    let result = ingestor.ingest(|_| called = true, |_| {}).await;

    assert!(matches!(result, Err(IngestError::Index(_))));
    assert!(!called);
}

#[tokio::test]
async fn test_failed_classification_defaults_and_keeps_row() {
    let source = catalog(2).failing_classification(&species_url(1));
    let ingestor = Ingestor::new(Arc::new(source), &config(20));
    let mut rows = Vec::new();

    ingestor.ingest(|batch| rows.extend(batch), |_| {}).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].classification, DEFAULT_CLASSIFICATION);
    assert_eq!(rows[1].classification, 2);
    assert!(ingestor.cache().get(&species_url(1)).is_none());
}

#[tokio::test]
async fn test_failed_classification_is_retried_next_run() {
    let source = Arc::new(catalog(2).failing_classification(&species_url(1)));
    let ingestor = Ingestor::new(source.clone(), &config(20));

    let mut first = Vec::new();
    ingestor.ingest(|batch| first.extend(batch), |_| {}).await.unwrap();
    assert_eq!(first[0].classification, DEFAULT_CLASSIFICATION);

    source.heal_classification(&species_url(1));
    let mut second = Vec::new();
    ingestor.ingest(|batch| second.extend(batch), |_| {}).await.unwrap();

    assert_eq!(second[0].classification, 2);
    assert_eq!(ingestor.cache().get(&species_url(1)), Some(2));
    // species 2 was cached by the first run; only the failed one is refetched
    assert_eq!(source.classification_calls(), 3);
}

// ============================================================================
// Lookup cache through the orchestrator
// ============================================================================

#[tokio::test]
async fn test_shared_species_resolved_once_per_run() {
    // twelve forms of one species, spread over three concurrent batches
    let source = (1..=12).fold(MockCatalogSource::new(), |source, id| {
        source.with_record(&detail_url(id), record(id, 1), "generation-iv")
    });
    let source = Arc::new(source.with_latency(Duration::from_millis(10)));
    let ingestor = Ingestor::new(source.clone(), &config(5));
    let mut rows = Vec::new();

    let summary = ingestor
        .ingest(|batch| rows.extend(batch), |_| {})
        .await
        .unwrap();

    assert_eq!(source.classification_calls(), 1);
    assert_eq!(summary.classification_lookups, 1);
    assert!(rows.iter().all(|r| r.classification == 4));
}

#[tokio::test]
async fn test_cache_survives_across_runs() {
    let source = Arc::new(catalog(4));
    let cache = Arc::new(LookupCache::new());

    let first = Ingestor::new(source.clone(), &config(2)).with_cache(Arc::clone(&cache));
    first.ingest(|_| {}, |_| {}).await.unwrap();
    let second = Ingestor::new(source.clone(), &config(2)).with_cache(Arc::clone(&cache));
    let summary = second.ingest(|_| {}, |_| {}).await.unwrap();

    assert_eq!(source.classification_calls(), 4);
    assert_eq!(summary.classification_lookups, 0);
    assert_eq!(source.record_calls(), 8);
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let ingestor = Ingestor::new(Arc::new(catalog(25)), &config(10));
    let set = WorkingSet::new();

    ingestor
        .ingest(|rows| {
            set.append_batch(rows);
        }, |_| {})
        .await
        .unwrap();
    ingestor
        .ingest(|rows| {
            set.append_batch(rows);
        }, |_| {})
        .await
        .unwrap();

    assert_eq!(set.len(), 25);
    let row = set.get("pokeapi-7").unwrap();
    assert_eq!(row.name, "Mon-7");
    assert_eq!(row.stats.hp, 7);
    assert_eq!(row.categories, vec!["fire"]);
    assert_eq!(row.classification, 2);
}
