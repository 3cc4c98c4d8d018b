//! Stats command handler.

use super::context::CommandContext;
use super::output::print_json;
use clap::Args;
use prodrec_core::{config::AppConfig, AppResult};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let context = CommandContext::new(config)?;
        let handle = context.open_index().await?;
        let stats = handle.describe_stats().await?;

        if self.json {
            print_json(&serde_json::json!({
                "index": handle.name(),
                "totalVectorCount": stats.total_vector_count,
                "dimension": stats.dimension,
            }))?;
        } else {
            println!("Index: {}", handle.name());
            println!("Vectors: {}", stats.total_vector_count);
            if let Some(dimension) = stats.dimension {
                println!("Dimension: {}", dimension);
            }
        }

        Ok(())
    }
}
