//! Search command handler.
//!
//! Runs the retrieval pipeline through the search tool boundary and prints
//! either the tool envelope or a readable result list.

use clap::Args;
use recall_core::{config::AppConfig, AppError, AppResult};
use recall_retrieval::{
    FilterSpec, GateFlags, RerankMethod, RewriteStrategy, SearchTool, SearchToolArgs, ToolOutcome,
};
use std::sync::Arc;

use super::build_pipeline;

/// Characters of content shown per result in text output.
const SNIPPET_CHARS: usize = 160;

/// Search a vector store
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// The search query
    pub query: String,

    /// Vector store identifier
    #[arg(short, long)]
    pub store: String,

    /// Rewrite the query before searching (expansion, refinement, decomposition, multi-perspective, hyde)
    #[arg(long, value_name = "STRATEGY", num_args = 0..=1, default_missing_value = "expansion")]
    pub rewrite: Option<RewriteStrategy>,

    /// Rerank results (semantic, cross-encoder, diversity)
    #[arg(long, value_name = "METHOD", num_args = 0..=1, default_missing_value = "semantic")]
    pub rerank: Option<RerankMethod>,

    /// Maximum number of results
    #[arg(short = 'n', long)]
    pub max_results: Option<usize>,

    /// Use two-pass retrieval through the secondary model
    #[arg(long)]
    pub two_pass: bool,

    /// Query the vector store directly even if the model supports search tools
    #[arg(long)]
    pub vector: bool,

    /// Only keep results of these file types
    #[arg(long = "file-type")]
    pub file_types: Vec<String>,

    /// Only keep results carrying one of these tags
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Minimum backend score
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Output the tool envelope as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");
        tracing::debug!("Search command options: {:?}", self);

        let pipeline = build_pipeline(config)?;
        let two_pass = self.two_pass || pipeline.config().two_pass;
        let supports_tools = config.provider_supports_tools() && !self.vector;

        let mut tool = SearchTool::new(Arc::new(pipeline))
            .with_config(
                self.rewrite.unwrap_or_default(),
                self.rerank.unwrap_or_default(),
            )
            .with_flags(GateFlags::new(true, supports_tools, two_pass));

        if let Some(filters) = self.filters() {
            tool = tool.with_filters(filters);
        }

        let outcome = tool
            .execute(SearchToolArgs {
                query: self.query.clone(),
                vector_store_id: self.store.clone(),
                enable_rewriting: self.rewrite.is_some(),
                enable_reranking: self.rerank.is_some(),
                max_results: self.max_results,
            })
            .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        print_outcome(outcome)
    }

    fn filters(&self) -> Option<FilterSpec> {
        let mut filters = FilterSpec::new();
        if !self.file_types.is_empty() {
            filters = filters.with_file_types(self.file_types.clone());
        }
        if !self.tags.is_empty() {
            filters = filters.with_tags(self.tags.clone());
        }
        if let Some(min_score) = self.min_score {
            filters = filters.with_min_score(min_score);
        }

        filters.has_filters().then_some(filters)
    }
}

fn print_outcome(outcome: ToolOutcome) -> AppResult<()> {
    if !outcome.success {
        return Err(AppError::Retrieval(
            outcome.error.unwrap_or_else(|| "Search failed".to_string()),
        ));
    }

    let results = outcome.results.unwrap_or_default();
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        let source = result.file_name.as_deref().unwrap_or(result.identity());
        println!("{}. [{:.2}] {}", rank + 1, result.relevance(), source);

        let snippet: String = result.content.chars().take(SNIPPET_CHARS).collect();
        let ellipsis = if result.content.chars().count() > SNIPPET_CHARS { "..." } else { "" };
        println!("   {}{}", snippet.replace('\n', " "), ellipsis);
    }

    Ok(())
}
