//! Index lifecycle: make sure exactly one empty, ready target index exists.

use crate::config::TimingConfig;
use crate::consistency::await_empty;
use crate::progress::ProgressReporter;
use crate::vector_index::{IndexHandle, IndexSpec, VectorIndexService};
use prodrec_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Prepare a clean index and return the handle for the rest of the run.
///
/// A missing index is created and polled until ready. An existing index is
/// **emptied**: every stored vector is deleted, irreversibly, and the reset is
/// given time to settle. Repeated runs therefore never accumulate stale
/// entries. Two runs against the same index name at once will race on the
/// reset; that is not supported.
pub async fn ensure_clean_index(
    service: &dyn VectorIndexService,
    spec: &IndexSpec,
    timings: &TimingConfig,
    progress: &ProgressReporter,
) -> AppResult<Arc<dyn IndexHandle>> {
    let names = service.list_index_names().await?;

    if !names.iter().any(|n| n == &spec.name) {
        tracing::info!(
            index = %spec.name,
            dimension = spec.dimension,
            metric = %spec.metric,
            "Creating index"
        );
        progress.reset(&spec.name, "Creating");

        service.create_index(spec).await?;
        wait_until_ready(
            service,
            &spec.name,
            timings.ready_poll_interval(),
            timings.ready_timeout(),
        )
        .await?;

        return service.index(&spec.name).await;
    }

    let existing = service.describe_index(&spec.name).await?;
    if existing.dimension != spec.dimension || existing.metric != spec.metric {
        tracing::warn!(
            index = %spec.name,
            "Existing index is {}-dimensional ({}), configured {}-dimensional ({}); it is reset, not recreated",
            existing.dimension,
            existing.metric,
            spec.dimension,
            spec.metric
        );
    }

    tracing::info!(index = %spec.name, "Index exists, deleting all vectors");
    progress.reset(&spec.name, "Resetting");

    let handle = service.index(&spec.name).await?;
    handle.delete_all().await?;
    await_empty(handle.as_ref(), &timings.reset_settle).await?;

    Ok(handle)
}

/// Poll the control plane until the index reports ready.
///
/// `timeout == None` keeps polling indefinitely.
pub async fn wait_until_ready(
    service: &dyn VectorIndexService,
    name: &str,
    interval: Duration,
    timeout: Option<Duration>,
) -> AppResult<()> {
    let start = Instant::now();

    loop {
        let description = service.describe_index(name).await?;
        if description.ready {
            tracing::info!(
                index = name,
                waited_secs = start.elapsed().as_secs_f64(),
                "Index is ready"
            );
            return Ok(());
        }

        let waited = start.elapsed();
        if let Some(limit) = timeout {
            if waited >= limit {
                return Err(AppError::IndexNotReady {
                    name: name.to_string(),
                    waited_secs: waited.as_secs_f64(),
                });
            }
        }

        tracing::debug!(index = name, "Index not ready, retrying in {:?}", interval);
        tokio::time::sleep(interval).await;
    }
}
