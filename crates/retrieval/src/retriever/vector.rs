//! Direct similarity search.

use recall_core::AppResult;
use std::sync::Arc;

use super::{make_result, Retriever};
use crate::backends::{SimilaritySearch, VectorMatch};
use crate::types::RetrievalResult;

/// Queries every bound store directly and merges the matches.
pub struct VectorFallbackRetrieval {
    backend: Arc<dyn SimilaritySearch>,
    store_ids: Vec<String>,
}

impl VectorFallbackRetrieval {
    pub fn new(backend: Arc<dyn SimilaritySearch>, store_ids: Vec<String>) -> Self {
        Self { backend, store_ids }
    }
}

/// Map raw similarity matches into results, keeping backend order.
pub fn normalize_matches(matches: Vec<VectorMatch>) -> Vec<RetrievalResult> {
    matches
        .into_iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| make_result(m.id, m.file_id, m.file_name, m.score, m.content, m.attributes))
        .collect()
}

#[async_trait::async_trait]
impl Retriever for VectorFallbackRetrieval {
    fn name(&self) -> &str {
        "vector"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<RetrievalResult>> {
        let mut results = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0;

        for store_id in &self.store_ids {
            match self.backend.search(store_id, query, top_k).await {
                Ok(matches) => {
                    tracing::debug!("Store '{}' returned {} match(es)", store_id, matches.len());
                    results.extend(normalize_matches(matches));
                    succeeded += 1;
                }
                Err(e) => {
                    tracing::warn!("Search of store '{}' failed: {}", store_id, e);
                    last_error = Some(e);
                }
            }
        }

        // Only an all-stores failure reaches the caller's retry.
        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        if self.store_ids.len() > 1 {
            results.sort_by(|a, b| b.relevance().total_cmp(&a.relevance()));
        }
        results.truncate(top_k);

        Ok(results)
    }
}
