//! End-to-end runs on virtual time.

use super::fixtures::{catalog, config, polling_config, LostAckService, TableEmbedder};
use crate::memory_index::MemoryIndexService;
use crate::progress::{Phase, ProgressEvent, ProgressReporter};
use crate::types::{FailureStage, ProductRecord, Recommendation};
use crate::vector_index::{IndexHandle, VectorIndexService};
use prodrec_core::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn queries(list: &[&str]) -> Vec<String> {
    list.iter().map(|q| q.to_string()).collect()
}

async fn vector_count(service: &MemoryIndexService) -> u64 {
    service
        .index("product-recommend")
        .await
        .unwrap()
        .describe_stats()
        .await
        .unwrap()
        .total_vector_count
}

#[tokio::test(start_paused = true)]
async fn test_reference_timings_on_first_and_second_run() {
    let service = MemoryIndexService::new();
    let embedder = TableEmbedder::catalog();
    let config = config();

    let start = Instant::now();
    let summary = crate::run_pipeline(
        &service,
        &embedder,
        &config,
        &catalog(),
        &queries(&["fitness gear"]),
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();
    // New index: ready immediately, then the 30s consistency wait
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(summary.index, "product-recommend");
    assert_eq!(summary.report.succeeded, 3);
    assert_eq!(summary.results[0].recommendation.matches()[0].id, "P2");

    let start = Instant::now();
    crate::run_pipeline(
        &service,
        &embedder,
        &config,
        &catalog(),
        &[],
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();
    // Existing index: 5s reset settle plus 30s consistency wait
    assert_eq!(start.elapsed(), Duration::from_secs(35));
}

#[tokio::test(start_paused = true)]
async fn test_reingestion_is_idempotent() {
    let service = MemoryIndexService::new().with_visibility_lag(Duration::from_secs(2));
    let embedder = TableEmbedder::catalog();
    let config = polling_config();

    let mut records = catalog();
    records.push(ProductRecord::new("P1", "bluetooth speaker", "Audio", "39.99", "IN"));

    for _ in 0..2 {
        let summary = crate::run_pipeline(
            &service,
            &embedder,
            &config,
            &records,
            &queries(&["bluetooth speaker"]),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();

        assert_eq!(summary.report.attempted, 4);
        assert_eq!(summary.report.succeeded, 4);
        assert_eq!(summary.report.distinct_ids, 3);
        assert_eq!(vector_count(&service).await, 3);

        // Last write for P1 wins
        let best = &summary.results[0].recommendation.matches()[0];
        assert_eq!(best.id, "P1");
        let category = best.metadata.as_ref().and_then(|m| m.category.as_deref());
        assert_eq!(category, Some("Audio"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_malformed_record_is_contained() {
    let service = MemoryIndexService::new();
    let embedder = TableEmbedder::catalog();
    let mut records = catalog();
    records[1].unitprice = "nineteen".to_string();

    let summary = crate::run_pipeline(
        &service,
        &embedder,
        &config(),
        &records,
        &queries(&["bluetooth speaker"]),
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();

    let report = &summary.report;
    assert_eq!(report.succeeded, report.attempted - 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].product_id, "P2");
    assert_eq!(report.failures[0].stage, FailureStage::Validate);
    assert!(report.failures[0].message.contains("nineteen"));
    assert_eq!(vector_count(&service).await, 2);

    let mut ids: Vec<&str> = summary.results[0]
        .recommendation
        .matches()
        .iter()
        .map(|m| m.id.as_str())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["P1", "P3"]);
}

#[tokio::test(start_paused = true)]
async fn test_queries_against_empty_catalog() {
    let service = MemoryIndexService::new();
    let embedder = TableEmbedder::catalog();

    let summary = crate::run_pipeline(
        &service,
        &embedder,
        &polling_config(),
        &[],
        &queries(&["fitness gear", "yoga mat"]),
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();

    assert_eq!(summary.report.attempted, 0);
    assert!(summary
        .results
        .iter()
        .all(|r| r.recommendation == Recommendation::EmptyIndex));
}

#[tokio::test(start_paused = true)]
async fn test_applied_write_with_lost_ack_does_not_stall_settle() {
    let service = LostAckService::new(MemoryIndexService::new(), "P2");
    let embedder = TableEmbedder::catalog();

    let start = Instant::now();
    let summary = crate::run_pipeline(
        &service,
        &embedder,
        &polling_config(),
        &catalog(),
        &queries(&["fitness gear"]),
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();

    let report = &summary.report;
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.distinct_ids, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].product_id, "P2");
    assert_eq!(report.failures[0].stage, FailureStage::Upsert);

    // Three vectors are visible against two acknowledged; that still settles
    assert!(start.elapsed() < Duration::from_secs(60));
    assert_eq!(summary.results[0].recommendation.matches()[0].id, "P2");
}

#[tokio::test(start_paused = true)]
async fn test_settle_timeout_keeps_report_and_results() {
    let service = MemoryIndexService::new().with_visibility_lag(Duration::from_secs(120));
    let embedder = TableEmbedder::catalog();

    let start = Instant::now();
    let summary = crate::run_pipeline(
        &service,
        &embedder,
        &polling_config(),
        &catalog(),
        &queries(&["fitness gear"]),
        &ProgressReporter::noop(),
    )
    .await
    .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(60));
    assert!(start.elapsed() < Duration::from_secs(120));
    assert_eq!(summary.report.succeeded, 3);
    assert_eq!(summary.results[0].recommendation, Recommendation::EmptyIndex);
}

#[tokio::test(start_paused = true)]
async fn test_index_that_never_becomes_ready_ends_run() {
    let service =
        MemoryIndexService::new().with_provisioning_delay(Duration::from_secs(24 * 3600));
    let embedder = TableEmbedder::catalog();

    let err = crate::run_pipeline(
        &service,
        &embedder,
        &config(),
        &catalog(),
        &queries(&["fitness gear"]),
        &ProgressReporter::noop(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::IndexNotReady { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_progress_phases_in_order() {
    let service = MemoryIndexService::new();
    let embedder = TableEmbedder::catalog();
    let phases = Arc::new(Mutex::new(Vec::new()));
    let sink = phases.clone();
    let progress = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
        let mut phases = sink.lock().unwrap();
        if phases.last() != Some(&event.phase) {
            phases.push(event.phase);
        }
    }));

    crate::run_pipeline(
        &service,
        &embedder,
        &config(),
        &catalog()[..1],
        &queries(&["fitness gear"]),
        &progress,
    )
    .await
    .unwrap();

    assert_eq!(
        *phases.lock().unwrap(),
        vec![
            Phase::Reset,
            Phase::Embed,
            Phase::Upsert,
            Phase::Settle,
            Phase::Query
        ]
    );
}
