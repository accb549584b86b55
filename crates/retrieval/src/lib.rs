//! Retrieval orchestration for Recall.
//!
//! Turns a user query into a ranked list of documents from a vector store:
//! optional query rewriting, gated retrieval with retries and fallbacks,
//! deduplication, metadata filtering and reranking. The
//! [`SearchTool`] wraps the whole pipeline behind a never-failing
//! function-call boundary.
//!
//! # Example
//! ```no_run
//! use recall_llm::OpenAiClient;
//! use recall_retrieval::{
//!     OpenAiSearchBackend, PipelineConfig, RetrievalConfig, RetrievalPipeline, RetrievalRequest,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let llm = Arc::new(OpenAiClient::new("sk-..."));
//! let backend = Arc::new(OpenAiSearchBackend::new("sk-..."));
//! let pipeline = RetrievalPipeline::new(llm, backend, PipelineConfig::default());
//!
//! let request = RetrievalRequest::new("how are keys rotated?", vec!["vs_123".into()], RetrievalConfig::new(5));
//! for result in pipeline.run(&request).await {
//!     println!("{:.2} {}", result.relevance(), result.content);
//! }
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod filter;
pub mod gate;
pub mod pipeline;
pub mod rerank;
pub mod retriever;
pub mod retry;
pub mod rewrite;
pub mod similarity;
pub mod templates;
pub mod tool;
pub mod types;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use backends::{
    OpenAiSearchBackend, SimilaritySearch, ToolSearchBackend, ToolSearchRequest, ToolSearchResponse,
    VectorMatch,
};
pub use config::PipelineConfig;
pub use error::ClassifiedError;
pub use filter::{DateRange, FilterSpec};
pub use gate::{GateFlags, RetrievalMode, RetrievalRoute};
pub use pipeline::{dedup_results, RetrievalPipeline, RetrievalRequest};
pub use rerank::Reranker;
pub use retriever::{Retriever, ToolBasedSearch, TwoPassRetrieval, VectorFallbackRetrieval};
pub use retry::{with_retry, RetryPolicy};
pub use rewrite::QueryRewriter;
pub use tool::{SearchTool, SearchToolArgs, ToolOutcome};
pub use types::{RerankMethod, RetrievalConfig, RetrievalResult, RewriteStrategy};
