//! Two-pass retrieval through a secondary model.
//!
//! The secondary model runs the search tool and the hits are read back from
//! the `file_search` invocation in its response trace. A failed call yields
//! no results; the pipeline then falls back to direct vector search.

use recall_core::AppResult;
use serde_json::Value;
use std::sync::Arc;

use super::{make_result, Retriever};
use crate::backends::{ToolSearchBackend, ToolSearchRequest, ToolSearchResponse, FILE_SEARCH_TOOL};
use crate::types::{Metadata, RetrievalResult};

const SEARCH_INSTRUCTIONS: &str =
    "Search the knowledge base for the user's query with the file_search tool. Do not answer from memory.";

pub struct TwoPassRetrieval {
    backend: Arc<dyn ToolSearchBackend>,
    model: String,
    store_ids: Vec<String>,
}

impl TwoPassRetrieval {
    pub fn new(backend: Arc<dyn ToolSearchBackend>, model: impl Into<String>, store_ids: Vec<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            store_ids,
        }
    }
}

/// Extract `{file_id, file_name, score, content}` hits from the trace.
pub fn normalize_trace(response: &ToolSearchResponse) -> Vec<RetrievalResult> {
    response
        .tool_calls
        .iter()
        .filter(|call| call.name == FILE_SEARCH_TOOL)
        .filter_map(|call| call.output.get("results").and_then(Value::as_array))
        .flatten()
        .filter_map(|hit| {
            let file_id = hit.get("file_id").and_then(Value::as_str)?;
            let content = hit
                .get("text")
                .or_else(|| hit.get("content"))
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty())?;

            Some(make_result(
                None,
                Some(file_id.to_string()),
                hit.get("filename")
                    .or_else(|| hit.get("file_name"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                hit.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
                content.to_string(),
                hit.get("attributes")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_else(Metadata::new),
            ))
        })
        .collect()
}

#[async_trait::async_trait]
impl Retriever for TwoPassRetrieval {
    fn name(&self) -> &str {
        "two-pass"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<RetrievalResult>> {
        let request = ToolSearchRequest::new(&self.model, query, self.store_ids.clone(), top_k)
            .with_instructions(SEARCH_INSTRUCTIONS);

        match self.backend.generate_with_search(&request).await {
            Ok(response) => {
                let mut results = normalize_trace(&response);
                results.truncate(top_k);
                tracing::debug!("Two-pass search with '{}' found {} hit(s)", self.model, results.len());
                Ok(results)
            }
            Err(e) => {
                tracing::warn!("Two-pass search with '{}' failed: {}", self.model, e);
                Ok(Vec::new())
            }
        }
    }
}
