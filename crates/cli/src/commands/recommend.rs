//! Recommend command handler.

use super::context::{progress_reporter, CommandContext};
use super::output::{print_json, render_result};
use clap::Args;
use prodrec_core::{config::AppConfig, AppResult};
use prodrec_engine::recommend::recommend_all;

/// Query an existing index without resetting it
#[derive(Args, Debug)]
pub struct RecommendCommand {
    /// Query text (several queries run one after another)
    #[arg(required = true)]
    pub queries: Vec<String>,

    /// Number of recommendations per query
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RecommendCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing recommend command");

        let context = CommandContext::new(config)?;
        let top_k = self.top_k.unwrap_or(context.recommender.query.top_k);
        let handle = context.open_index().await?;

        let results = recommend_all(
            handle.as_ref(),
            context.embedder.as_ref(),
            &self.queries,
            top_k,
            &progress_reporter(self.json),
        )
        .await;

        if self.json {
            print_json(&results)?;
        } else {
            for (i, result) in results.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("{}", render_result(result));
            }
        }

        Ok(())
    }
}
