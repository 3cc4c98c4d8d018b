//! Ingestion pipeline: embed each product and write it to the index.
//!
//! Every record is handled in isolation. A bad price, an embedding failure or
//! a rejected write is recorded against that record and the run moves on;
//! only an unusable index handle stops it.

use crate::config::IngestConfig;
use crate::embeddings::EmbeddingProvider;
use crate::progress::ProgressReporter;
use crate::types::{FailureStage, IndexEntry, IngestionReport, ProductRecord, RecordFailure};
use crate::vector_index::{IndexHandle, VectorRecord};
use chrono::Utc;
use futures::StreamExt;
use prodrec_core::AppResult;
use std::collections::HashSet;
use tokio::time::Instant;

/// Tuning for one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Entries per upsert request (1 = one write per record)
    pub batch_size: usize,

    /// Descriptions embedded concurrently; results are consumed in input order
    pub embed_concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            embed_concurrency: 1,
        }
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            embed_concurrency: config.embed_concurrency,
        }
    }
}

/// Embed and upsert `records` through `handle`.
///
/// Failures are returned in the report in encounter order. The call itself
/// only fails when the handle becomes unusable (`AppError::IndexUnavailable`),
/// since no later record could be written either.
pub async fn ingest(
    handle: &dyn IndexHandle,
    embedder: &dyn EmbeddingProvider,
    records: &[ProductRecord],
    options: &IngestOptions,
    progress: &ProgressReporter,
) -> AppResult<IngestionReport> {
    let started_at = Utc::now();
    let start = Instant::now();
    let total = records.len() as u64;

    tracing::info!(
        index = handle.name(),
        records = records.len(),
        batch_size = options.batch_size,
        "Starting ingestion"
    );

    let mut writer = BatchWriter::new(handle, options.batch_size.max(1));
    let mut valid = Vec::with_capacity(records.len());

    for (position, record) in records.iter().enumerate() {
        match record.metadata() {
            Ok(metadata) => valid.push((position, record, metadata)),
            Err(message) => writer.fail(position, record, FailureStage::Validate, message),
        }
    }

    let embed_total = valid.len() as u64;
    let embedded = futures::stream::iter(valid.into_iter().map(|(position, record, metadata)| async move {
        let result = embedder.embed(&record.description).await;
        (position, record, metadata, result)
    }))
    .buffered(options.embed_concurrency.max(1));
    let mut embedded = std::pin::pin!(embedded);

    let mut done = 0u64;
    while let Some((position, record, metadata, result)) = embedded.next().await {
        done += 1;
        progress.embed(done, embed_total, embedder.model_name());

        match result {
            Ok(vector) => {
                let entry = IndexEntry {
                    id: record.product_id.clone(),
                    vector,
                    metadata,
                };
                writer.push(position, entry).await?;
            }
            Err(e) => writer.fail(position, record, FailureStage::Embed, e.to_string()),
        }
        progress.upsert(writer.succeeded as u64, total, writer.failures.len() as u64);
    }
    writer.flush().await?;
    progress.upsert(writer.succeeded as u64, total, writer.failures.len() as u64);

    let mut failures = writer.failures;
    failures.sort_by_key(|f| f.position);

    let report = IngestionReport {
        attempted: records.len(),
        succeeded: writer.succeeded,
        distinct_ids: writer.written.len(),
        failures,
        started_at,
        duration_secs: start.elapsed().as_secs_f64(),
    };

    tracing::info!(
        index = handle.name(),
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed(),
        "{}",
        report.summary()
    );
    Ok(report)
}

/// Accumulates entries into upsert batches.
struct BatchWriter<'a> {
    handle: &'a dyn IndexHandle,
    batch_size: usize,
    pending: Vec<(usize, IndexEntry)>,
    succeeded: usize,
    written: HashSet<String>,
    failures: Vec<RecordFailure>,
}

impl<'a> BatchWriter<'a> {
    fn new(handle: &'a dyn IndexHandle, batch_size: usize) -> Self {
        Self {
            handle,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            succeeded: 0,
            written: HashSet::new(),
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, position: usize, record: &ProductRecord, stage: FailureStage, message: String) {
        self.fail_id(position, record.product_id.clone(), stage, message);
    }

    fn fail_id(&mut self, position: usize, product_id: String, stage: FailureStage, message: String) {
        tracing::warn!(
            product_id = %product_id,
            position,
            stage = stage.as_str(),
            "Failed to ingest record: {}",
            message
        );
        self.failures.push(RecordFailure {
            product_id,
            position,
            stage,
            message,
        });
    }

    /// Queue an entry. A batch never holds two writes for one id, so repeated
    /// ids are written in input order and the last one wins.
    async fn push(&mut self, position: usize, entry: IndexEntry) -> AppResult<()> {
        if self.pending.iter().any(|(_, queued)| queued.id == entry.id) {
            self.flush().await?;
        }
        self.pending.push((position, entry));
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> AppResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        let records: Vec<VectorRecord> = batch.iter().map(|(_, entry)| entry.to_record()).collect();

        match self.handle.upsert(&records).await {
            Ok(_) => {
                for (_, entry) in batch {
                    self.mark_written(entry);
                }
                Ok(())
            }
            Err(e) if e.is_fatal_for_batch() => Err(e),
            Err(e) if batch.len() == 1 => {
                if let Some((position, entry)) = batch.into_iter().next() {
                    self.fail_id(position, entry.id, FailureStage::Upsert, e.to_string());
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    entries = batch.len(),
                    "Batch upsert failed ({}), retrying entries one at a time",
                    e
                );
                for (position, entry) in batch {
                    match self.handle.upsert(&[entry.to_record()]).await {
                        Ok(_) => self.mark_written(entry),
                        Err(e) if e.is_fatal_for_batch() => return Err(e),
                        Err(e) => self.fail_id(position, entry.id, FailureStage::Upsert, e.to_string()),
                    }
                }
                Ok(())
            }
        }
    }

    fn mark_written(&mut self, entry: IndexEntry) {
        self.succeeded += 1;
        self.written.insert(entry.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::memory_index::MemoryIndexService;
    use crate::progress::{Phase, ProgressEvent};
    use crate::vector_index::{
        IndexSpec, IndexStats, Metric, Placement, QueryRequest, ScoredVector, VectorIndexService,
    };
    use prodrec_core::AppError;
    use std::sync::{Arc, Mutex};

    async fn memory_handle(dimension: usize) -> Arc<dyn IndexHandle> {
        let service = MemoryIndexService::new();
        service
            .create_index(&IndexSpec {
                name: "products".to_string(),
                dimension,
                metric: Metric::Cosine,
                placement: Placement::default(),
            })
            .await
            .unwrap();
        service.index("products").await.unwrap()
    }

    fn catalog() -> Vec<ProductRecord> {
        vec![
            ProductRecord::new("P1", "Bluetooth speaker", "Electronics", "49.99", "IN"),
            ProductRecord::new("P2", "Yoga mat", "Fitness", "19.50", "US"),
            ProductRecord::new("P3", "Eco-friendly bottle", "Kitchen", "12", "UK"),
        ]
    }

    /// Records every upsert call and rejects writes for chosen ids.
    struct RecordingHandle {
        inner: Arc<dyn IndexHandle>,
        calls: Mutex<Vec<Vec<String>>>,
        reject: Vec<&'static str>,
        unavailable: bool,
    }

    impl RecordingHandle {
        fn new(inner: Arc<dyn IndexHandle>) -> Self {
            Self {
                inner,
                calls: Mutex::new(Vec::new()),
                reject: Vec::new(),
                unavailable: false,
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl IndexHandle for RecordingHandle {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn upsert(&self, records: &[VectorRecord]) -> AppResult<usize> {
            self.calls
                .lock()
                .unwrap()
                .push(records.iter().map(|r| r.id.clone()).collect());
            if self.unavailable {
                return Err(AppError::IndexUnavailable("index deleted".to_string()));
            }
            if records
                .iter()
                .any(|r| self.reject.iter().any(|id| *id == r.id))
            {
                return Err(AppError::Index("payload rejected".to_string()));
            }
            self.inner.upsert(records).await
        }

        async fn delete_all(&self) -> AppResult<()> {
            self.inner.delete_all().await
        }

        async fn describe_stats(&self) -> AppResult<IndexStats> {
            self.inner.describe_stats().await
        }

        async fn query(&self, request: &QueryRequest) -> AppResult<Vec<ScoredVector>> {
            self.inner.query(request).await
        }
    }

    #[tokio::test]
    async fn test_ingest_writes_one_entry_per_record() {
        let handle = RecordingHandle::new(memory_handle(384).await);
        let embedder = TrigramProvider::new(384);

        let report = ingest(
            &handle,
            &embedder,
            &catalog(),
            &IngestOptions::default(),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.distinct_ids, 3);
        assert!(report.is_complete());
        assert_eq!(handle.calls().len(), 3);
        assert_eq!(handle.describe_stats().await.unwrap().total_vector_count, 3);
    }

    #[tokio::test]
    async fn test_batches_flush_before_repeated_id() {
        let handle = RecordingHandle::new(memory_handle(384).await);
        let embedder = TrigramProvider::new(384);
        let records = vec![
            ProductRecord::new("P1", "Bluetooth speaker", "Electronics", "49.99", "IN"),
            ProductRecord::new("P2", "Yoga mat", "Fitness", "19.50", "US"),
            ProductRecord::new("P1", "Waterproof speaker", "Electronics", "59.99", "IN"),
            ProductRecord::new("P3", "Eco-friendly bottle", "Kitchen", "12", "UK"),
        ];
        let options = IngestOptions {
            batch_size: 10,
            embed_concurrency: 4,
        };

        let report = ingest(&handle, &embedder, &records, &options, &ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(
            handle.calls(),
            vec![
                vec!["P1".to_string(), "P2".to_string()],
                vec!["P1".to_string(), "P3".to_string()],
            ]
        );
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.distinct_ids, 3);

        let query = embedder.embed("waterproof speaker").await.unwrap();
        let hits = handle
            .query(&QueryRequest::with_metadata(query, 1))
            .await
            .unwrap();
        assert_eq!(hits[0].id, "P1");
        let metadata = hits[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["description"], "Waterproof speaker");
    }

    #[tokio::test]
    async fn test_rejected_batch_falls_back_to_single_writes() {
        let mut handle = RecordingHandle::new(memory_handle(384).await);
        handle.reject = vec!["P2"];
        let embedder = TrigramProvider::new(384);
        let options = IngestOptions {
            batch_size: 3,
            embed_concurrency: 1,
        };

        let report = ingest(&handle, &embedder, &catalog(), &options, &ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].product_id, "P2");
        assert_eq!(report.failures[0].stage, FailureStage::Upsert);
        assert_eq!(handle.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_failures_reported_in_encounter_order() {
        let mut handle = RecordingHandle::new(memory_handle(384).await);
        handle.reject = vec!["P1"];
        let embedder = TrigramProvider::new(384);
        let records = vec![
            ProductRecord::new("P1", "Bluetooth speaker", "Electronics", "49.99", "IN"),
            ProductRecord::new("P2", "Yoga mat", "Fitness", "free", "US"),
            ProductRecord::new("", "Kettle", "Kitchen", "30", "UK"),
            ProductRecord::new("P4", "Desk lamp", "Home", "25", "UK"),
        ];

        let report = ingest(
            &handle,
            &embedder,
            &records,
            &IngestOptions::default(),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();

        let summary: Vec<(usize, FailureStage)> =
            report.failures.iter().map(|f| (f.position, f.stage)).collect();
        assert_eq!(
            summary,
            vec![
                (0, FailureStage::Upsert),
                (1, FailureStage::Validate),
                (2, FailureStage::Validate),
            ]
        );
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.attempted, 4);
    }

    #[tokio::test]
    async fn test_unavailable_index_aborts_run() {
        let mut handle = RecordingHandle::new(memory_handle(384).await);
        handle.unavailable = true;
        let embedder = TrigramProvider::new(384);

        let result = ingest(
            &handle,
            &embedder,
            &catalog(),
            &IngestOptions::default(),
            &ProgressReporter::noop(),
        )
        .await;

        assert!(matches!(result, Err(AppError::IndexUnavailable(_))));
        assert_eq!(handle.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_each_record() {
        let handle = memory_handle(8).await;
        let embedder = TrigramProvider::new(384);

        let report = ingest(
            handle.as_ref(),
            &embedder,
            &catalog(),
            &IngestOptions::default(),
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.failed(), 3);
        assert!(report.failures[0].message.contains("dimension"));
    }

    #[tokio::test]
    async fn test_embed_progress_counts_only_valid_records() {
        let handle = memory_handle(384).await;
        let embedder = TrigramProvider::new(384);
        let mut records = catalog();
        records[0].unitprice = "n/a".to_string();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let progress = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            if event.phase == Phase::Embed {
                sink.lock().unwrap().push((event.current, event.total));
            }
        }));

        ingest(handle.as_ref(), &embedder, &records, &IngestOptions::default(), &progress)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.last(), Some(&(2, Some(2))));
    }
}
