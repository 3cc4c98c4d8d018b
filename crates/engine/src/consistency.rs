//! Waiting for an eventually consistent index to catch up.

use crate::config::SettleStrategy;
use crate::vector_index::IndexHandle;
use prodrec_core::{AppError, AppResult};
use std::time::Duration;
use tokio::time::Instant;

/// Block until queries against `handle` can be trusted after a write phase.
///
/// With [`SettleStrategy::Fixed`] this sleeps and assumes the index caught up.
/// With [`SettleStrategy::Poll`] it reads stats until at least `expected`
/// vectors are visible, failing with `AppError::ConsistencyTimeout` once the
/// timeout passes. A count above `expected` also settles: a write whose
/// acknowledgement was lost may still have been applied.
pub async fn await_consistency(
    handle: &dyn IndexHandle,
    strategy: &SettleStrategy,
    expected: u64,
) -> AppResult<()> {
    settle(handle, strategy, expected, |observed| observed >= expected).await
}

/// Block until a reset is visible: no vectors left in the index.
pub async fn await_empty(handle: &dyn IndexHandle, strategy: &SettleStrategy) -> AppResult<()> {
    settle(handle, strategy, 0, |observed| observed == 0).await
}

async fn settle(
    handle: &dyn IndexHandle,
    strategy: &SettleStrategy,
    expected: u64,
    settled: impl Fn(u64) -> bool,
) -> AppResult<()> {
    match strategy {
        SettleStrategy::Fixed { delay_secs } => {
            tracing::info!(
                index = handle.name(),
                "Waiting {}s for index to settle",
                delay_secs
            );
            tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            Ok(())
        }
        SettleStrategy::Poll {
            interval_ms,
            timeout_secs,
        } => {
            poll_until(
                handle,
                expected,
                settled,
                Duration::from_millis(*interval_ms),
                Duration::from_secs(*timeout_secs),
            )
            .await
        }
    }
}

async fn poll_until(
    handle: &dyn IndexHandle,
    expected: u64,
    settled: impl Fn(u64) -> bool,
    interval: Duration,
    timeout: Duration,
) -> AppResult<()> {
    let start = Instant::now();
    tracing::info!(
        index = handle.name(),
        expected,
        "Polling index stats until vector count settles"
    );

    loop {
        let observed = handle.describe_stats().await?.total_vector_count;
        if settled(observed) {
            tracing::debug!(
                index = handle.name(),
                observed,
                waited_secs = start.elapsed().as_secs_f64(),
                "Index settled"
            );
            return Ok(());
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(AppError::ConsistencyTimeout {
                name: handle.name().to_string(),
                expected,
                observed,
                waited_secs: waited.as_secs_f64(),
            });
        }

        tracing::debug!(index = handle.name(), observed, expected, "Index not settled yet");
        tokio::time::sleep(interval).await;
    }
}
