//! Command handlers for the prodrec CLI.

pub mod context;
pub mod ingest;
pub mod output;
pub mod recommend;
pub mod run;
pub mod stats;

pub use ingest::IngestCommand;
pub use recommend::RecommendCommand;
pub use run::RunCommand;
pub use stats::StatsCommand;
