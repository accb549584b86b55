//! Tool-bound search on the primary model.

use recall_core::AppResult;
use serde_json::Value;
use std::sync::Arc;

use super::{hit_to_result, make_result, Retriever};
use crate::backends::{ToolSearchBackend, ToolSearchRequest, ToolSearchResponse};
use crate::types::{content_id, Metadata, RetrievalResult};

/// Runs the backend-native search tool through the primary model.
pub struct ToolBasedSearch {
    backend: Arc<dyn ToolSearchBackend>,
    model: String,
    store_ids: Vec<String>,
}

impl ToolBasedSearch {
    pub fn new(backend: Arc<dyn ToolSearchBackend>, model: impl Into<String>, store_ids: Vec<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            store_ids,
        }
    }
}

#[async_trait::async_trait]
impl Retriever for ToolBasedSearch {
    fn name(&self) -> &str {
        "tool-based"
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<RetrievalResult>> {
        let request = ToolSearchRequest::new(&self.model, query, self.store_ids.clone(), top_k);
        let response = self.backend.generate_with_search(&request).await?;

        let mut results = normalize_tool_response(&response);
        results.truncate(top_k);
        Ok(results)
    }
}

/// Collect results from every tool invocation in the response.
///
/// Native citations are only used when the tool outputs yielded nothing.
pub fn normalize_tool_response(response: &ToolSearchResponse) -> Vec<RetrievalResult> {
    let mut results: Vec<RetrievalResult> = response
        .tool_calls
        .iter()
        .flat_map(|call| normalize_output(&call.output))
        .collect();

    if results.is_empty() && !response.citations.is_empty() {
        tracing::debug!(
            "Tool output had no hits, using {} citation(s)",
            response.citations.len()
        );
        results = response
            .citations
            .iter()
            .map(|citation| {
                let content = citation
                    .quote
                    .clone()
                    .or_else(|| citation.file_name.clone())
                    .unwrap_or_default();
                make_result(
                    None,
                    Some(citation.file_id.clone()),
                    citation.file_name.clone(),
                    0.0,
                    content,
                    Metadata::new(),
                )
            })
            .collect();
    }

    results
}

/// Map one tool output into results.
///
/// Accepted shapes: a JSON-encoded string, a plain string, an array of any of
/// these, an object with a `results` array, an object with `content` blocks,
/// or a single hit object.
fn normalize_output(output: &Value) -> Vec<RetrievalResult> {
    match output {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => normalize_output(&parsed),
            _ if text.trim().is_empty() => Vec::new(),
            _ => vec![RetrievalResult::new(content_id(text), text.trim(), 0.0)],
        },
        Value::Array(items) => items.iter().flat_map(normalize_output).collect(),
        Value::Object(object) => {
            if let Some(hits) = object.get("results").and_then(Value::as_array) {
                return hits
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(hit_to_result)
                    .collect();
            }

            if let Some(blocks) = object.get("content").and_then(Value::as_array) {
                return blocks
                    .iter()
                    .filter_map(Value::as_object)
                    .filter_map(|block| {
                        // Blocks inherit file identity from the enclosing object
                        let mut merged = object.clone();
                        merged.remove("content");
                        merged.extend(block.clone());
                        hit_to_result(&merged)
                    })
                    .collect();
            }

            hit_to_result(object).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Citation, ToolInvocation, FILE_SEARCH_TOOL};
    use crate::testing::ScriptedToolBackend;
    use serde_json::json;

    fn response_with(output: Value) -> ToolSearchResponse {
        ToolSearchResponse {
            text: String::new(),
            tool_calls: vec![ToolInvocation {
                name: FILE_SEARCH_TOOL.to_string(),
                output,
            }],
            citations: Vec::new(),
        }
    }

    #[test]
    fn test_results_object() {
        let results = normalize_tool_response(&response_with(json!({
            "results": [
                {"file_id": "f1", "filename": "a.md", "score": 0.9, "text": "alpha"},
                {"file_id": "f2", "score": 0.5, "text": "beta"}
            ]
        })));

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].identity(), "f1");
        assert_eq!(results[1].content, "beta");
    }

    #[test]
    fn test_json_string_output() {
        let encoded = json!({"results": [{"file_id": "f1", "text": "alpha"}]}).to_string();
        let results = normalize_tool_response(&response_with(Value::String(encoded)));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].identity(), "f1");
    }

    #[test]
    fn test_plain_string_output() {
        let results = normalize_tool_response(&response_with(json!("Keys rotate yearly.")));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "Keys rotate yearly.");
        assert_eq!(results[0].id, content_id("Keys rotate yearly."));
    }

    #[test]
    fn test_content_blocks_inherit_file() {
        let results = normalize_tool_response(&response_with(json!({
            "file_id": "f9",
            "filename": "guide.pdf",
            "score": 0.7,
            "content": [{"type": "text", "text": "part one"}, {"type": "text", "text": "part two"}]
        })));

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.identity() == "f9"));
        assert_eq!(results[1].file_name.as_deref(), Some("guide.pdf"));
    }

    #[test]
    fn test_citations_only_when_tool_output_empty() {
        let mut response = response_with(json!({"results": []}));
        response.citations.push(Citation {
            file_id: "f3".to_string(),
            file_name: Some("faq.md".to_string()),
            quote: Some("Answer text".to_string()),
        });

        let results = normalize_tool_response(&response);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "Answer text");

        let mut with_hits = response_with(json!({"results": [{"file_id": "f1", "text": "alpha"}]}));
        with_hits.citations = response.citations.clone();
        assert_eq!(normalize_tool_response(&with_hits).len(), 1);
        assert_eq!(normalize_tool_response(&with_hits)[0].identity(), "f1");
    }

    #[tokio::test]
    async fn test_retrieve_caps_results() {
        let backend = ScriptedToolBackend::always(response_with(json!({
            "results": [
                {"file_id": "f1", "text": "a"},
                {"file_id": "f2", "text": "b"},
                {"file_id": "f3", "text": "c"}
            ]
        })));
        let retriever = ToolBasedSearch::new(backend.clone(), "gpt-4o", vec!["vs_docs".to_string()]);

        let results = retriever.retrieve("q", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        let requests = backend.requests();
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].max_results, 2);
    }
}
