//! Rewrite command handler.

use clap::Args;
use recall_core::{config::AppConfig, AppResult};
use recall_retrieval::{PipelineConfig, QueryRewriter, RewriteStrategy};

use super::completion_client;

/// Show the query variants a rewriting strategy produces
#[derive(Args, Debug)]
pub struct RewriteCommand {
    /// The query to rewrite
    pub query: String,

    /// Rewriting strategy (expansion, refinement, decomposition, multi-perspective, hyde)
    #[arg(short, long, default_value = "expansion")]
    pub strategy: RewriteStrategy,

    /// Conversation context used by the refinement strategy
    #[arg(long)]
    pub context: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl RewriteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing rewrite command ({})", self.strategy);

        let pipeline_config = PipelineConfig::default()
            .with_model(&config.model)
            .with_settings(&config.retrieval);
        let rewriter = QueryRewriter::new(completion_client(config)?, pipeline_config.rewrite_model);

        let variants = rewriter
            .rewrite(&self.query, self.strategy, self.context.as_deref())
            .await;

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "strategy": self.strategy,
                "variants": variants,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            for variant in &variants {
                println!("- {}", variant);
            }
        }

        Ok(())
    }
}
