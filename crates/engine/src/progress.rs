//! Structured progress reporting for pipeline runs.
//!
//! Gives the operator incremental feedback while the index is reset, the
//! catalog is embedded and written, the index settles, and queries run.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reset,
    Embed,
    Upsert,
    Settle,
    Query,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Reset => "reset",
            Phase::Embed => "embed",
            Phase::Upsert => "upsert",
            Phase::Settle => "settle",
            Phase::Query => "query",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event emitted during a run.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,

    /// Work done so far (records embedded, entries written, queries run)
    pub current: u64,

    /// Total expected work, if known
    pub total: Option<u64>,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: Option<f64>,

    pub message: String,

    /// Seconds since the reporter was created
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(phase: Phase, current: u64, total: Option<u64>, message: impl Into<String>) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                0.0
            }
        });

        Self {
            phase,
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a simple user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => format!("{}", self.current),
        };

        let pct = match self.percentage {
            Some(p) => format!(" ({:.0}%)", p),
            None => String::new(),
        };

        format!("[{}] {}{} - {}", self.phase, progress, pct, self.message)
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// Reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);

        tracing::debug!(
            phase = %event.phase,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Progress event"
        );

        callback(event);
    }

    /// Index is being created or cleared.
    pub fn reset(&self, index: &str, action: &str) {
        self.emit(ProgressEvent::new(
            Phase::Reset,
            0,
            None,
            format!("{} index '{}'", action, index),
        ));
    }

    pub fn embed(&self, current: u64, total: u64, model: &str) {
        self.emit(ProgressEvent::new(
            Phase::Embed,
            current,
            Some(total),
            format!("model={}", model),
        ));
    }

    pub fn upsert(&self, current: u64, total: u64, failed: u64) {
        self.emit(ProgressEvent::new(
            Phase::Upsert,
            current,
            Some(total),
            format!("{} failed", failed),
        ));
    }

    pub fn settle(&self, strategy: &str) {
        self.emit(ProgressEvent::new(
            Phase::Settle,
            0,
            None,
            format!("waiting for index consistency ({})", strategy),
        ));
    }

    pub fn query(&self, current: u64, total: u64, query: &str) {
        self.emit(ProgressEvent::new(
            Phase::Query,
            current,
            Some(total),
            format!("'{}'", query),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_event_format() {
        let event = ProgressEvent::new(Phase::Upsert, 5, Some(10), "0 failed");
        let formatted = event.format_simple();
        assert_eq!(formatted, "[upsert] 5/10 (50%) - 0 failed");
    }

    #[test]
    fn test_format_without_total() {
        let event = ProgressEvent::new(Phase::Settle, 0, None, "waiting");
        assert_eq!(event.format_simple(), "[settle] 0 - waiting");
    }

    #[test]
    fn test_progress_reporter_emit() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let reporter = ProgressReporter::new(Arc::new(move |event: ProgressEvent| {
            sink.lock().unwrap().push(event);
        }));

        reporter.embed(3, 10, "trigram-v1");
        reporter.reset("product-recommend", "Resetting");

        let captured = events.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].phase, Phase::Embed);
        assert_eq!(captured[0].current, 3);
        assert!(captured[0].elapsed_secs.is_some());
        assert_eq!(captured[1].message, "Resetting index 'product-recommend'");
    }

    #[test]
    fn test_noop_reporter() {
        let reporter = ProgressReporter::noop();
        reporter.query(1, 1, "kitchen items");
    }
}
