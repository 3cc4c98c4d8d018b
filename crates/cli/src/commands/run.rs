//! Run command handler.
//!
//! The full flow: reset the index, ingest the catalog, wait for consistency,
//! then answer queries.

use super::context::{progress_reporter, CommandContext};
use super::output::{print_json, render_report, render_result};
use clap::Args;
use prodrec_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Reset the index, ingest the catalog, and run queries
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Queries to run (default: the configured query list)
    pub queries: Vec<String>,

    /// CSV catalog to ingest (default: dataset.path from the config)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Number of recommendations per query
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing run command");

        let mut context = CommandContext::new(config)?;
        if let Some(top_k) = self.top_k {
            context.recommender.query.top_k = top_k;
        }

        let records = context.load_records(self.dataset.as_deref())?;
        let queries = if self.queries.is_empty() {
            context.recommender.query.queries.clone()
        } else {
            self.queries.clone()
        };

        let summary = prodrec_engine::run_pipeline(
            context.service.as_ref(),
            context.embedder.as_ref(),
            &context.recommender,
            &records,
            &queries,
            &progress_reporter(self.json),
        )
        .await?;

        if self.json {
            print_json(&summary)?;
        } else {
            println!("{}", render_report(&summary.report));
            for result in &summary.results {
                println!();
                println!("{}", render_result(result));
            }
        }

        Ok(())
    }
}
