//! Result reranking.
//!
//! Three algorithms behind one dispatch: a single ranking call over content
//! previews, one scoring call per candidate, and lexical MMR.

pub mod cross_encoder;
pub mod diversity;
pub mod semantic;

pub use cross_encoder::cross_encoder_rerank;
pub use diversity::diversity_rerank;
pub use semantic::semantic_rerank;

use recall_llm::LlmClient;
use std::sync::Arc;

use crate::types::{RerankMethod, RetrievalResult};

/// Characters of content shown per candidate in the semantic ranking prompt.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// MMR relevance/redundancy trade-off.
pub const DEFAULT_MMR_LAMBDA: f32 = 0.5;

/// Maximum results kept by diversity reranking.
pub const DEFAULT_DIVERSITY_CAP: usize = 10;

pub struct Reranker {
    client: Arc<dyn LlmClient>,
    model: String,
    preview_chars: usize,
    lambda: f32,
    diversity_cap: usize,
}

impl Reranker {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            lambda: DEFAULT_MMR_LAMBDA,
            diversity_cap: DEFAULT_DIVERSITY_CAP,
        }
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn with_lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_diversity_cap(mut self, diversity_cap: usize) -> Self {
        self.diversity_cap = diversity_cap;
        self
    }

    /// Reorder `results` against `query` with `method`.
    ///
    /// Never fails; each method degrades to the incoming order on error.
    pub async fn rerank(
        &self,
        method: RerankMethod,
        query: &str,
        results: Vec<RetrievalResult>,
        top_k: usize,
    ) -> Vec<RetrievalResult> {
        tracing::info!("Reranking {} candidate(s) with {}", results.len(), method);

        match method {
            RerankMethod::Semantic => {
                semantic_rerank(
                    self.client.as_ref(),
                    &self.model,
                    query,
                    results,
                    top_k,
                    self.preview_chars,
                )
                .await
            }
            RerankMethod::CrossEncoder => {
                cross_encoder_rerank(self.client.as_ref(), &self.model, query, results).await
            }
            RerankMethod::Diversity => diversity_rerank(results, self.lambda, self.diversity_cap),
        }
    }
}

/// First `max_chars` characters of `text`, on a char boundary.
pub(crate) fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
