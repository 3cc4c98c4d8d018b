//! Ingest command handler.

use super::context::{progress_reporter, CommandContext};
use super::output::{print_json, render_report};
use clap::Args;
use prodrec_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Reset the index and ingest the catalog
///
/// Every vector already in the index is deleted first.
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// CSV catalog to ingest (default: dataset.path from the config)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Return as soon as the writes are acknowledged, without waiting for
    /// the index to become consistent
    #[arg(long)]
    pub no_wait: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let context = CommandContext::new(config)?;
        let records = context.load_records(self.dataset.as_deref())?;

        let (handle, report) = prodrec_engine::reset_and_ingest(
            context.service.as_ref(),
            context.embedder.as_ref(),
            &context.recommender,
            &records,
            !self.no_wait,
            &progress_reporter(self.json),
        )
        .await?;

        if self.json {
            print_json(&serde_json::json!({
                "index": handle.name(),
                "report": report,
            }))?;
        } else {
            println!("{}", render_report(&report));
        }

        Ok(())
    }
}
