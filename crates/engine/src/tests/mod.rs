//! Scenario tests spanning lifecycle, ingestion, consistency and queries.

mod pipeline_runs;
