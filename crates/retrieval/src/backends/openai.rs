//! OpenAI vector store backend.
//!
//! Similarity search uses `POST /vector_stores/{id}/search`. Tool-bound
//! generation uses the Responses API with the `file_search` tool and asks for
//! the tool results to be included in the trace.

use recall_core::{AppError, AppResult};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    Citation, SimilaritySearch, ToolInvocation, ToolSearchBackend, ToolSearchRequest,
    ToolSearchResponse, VectorMatch, FILE_SEARCH_TOOL,
};
use crate::types::Metadata;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    file_id: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    attributes: Option<Metadata>,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl From<SearchHit> for VectorMatch {
    fn from(hit: SearchHit) -> Self {
        let content = hit
            .content
            .into_iter()
            .filter(|block| block.kind == "text" || block.kind.is_empty())
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        VectorMatch {
            id: None,
            file_id: hit.file_id,
            file_name: hit.filename,
            score: hit.score,
            content,
            attributes: hit.attributes.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponsesBody {
    #[serde(default)]
    output: Vec<Value>,
}

/// Vector store search and `file_search` generation against an OpenAI-compatible API.
#[derive(Debug, Clone)]
pub struct OpenAiSearchBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiSearchBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_OPENAI_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, url: &str, body: &Value) -> AppResult<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Failed to reach search backend: {}", e)))?;

        if !response.status().is_success() {
            return Err(recall_llm::providers::status_error("Search backend", response).await);
        }

        Ok(response)
    }

    fn responses_body(request: &ToolSearchRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "input": request.query,
            "tools": [{
                "type": FILE_SEARCH_TOOL,
                "vector_store_ids": request.store_ids,
                "max_num_results": request.max_results,
            }],
            "tool_choice": "required",
            "include": ["file_search_call.results"],
        });

        if let Some(instructions) = &request.instructions {
            body["instructions"] = json!(instructions);
        }

        body
    }
}

/// Split a Responses API `output` array into text, tool calls and citations.
fn read_trace(output: Vec<Value>) -> ToolSearchResponse {
    let mut trace = ToolSearchResponse::default();
    let mut texts = Vec::new();

    for item in output {
        match item.get("type").and_then(Value::as_str) {
            Some("file_search_call") => {
                trace.tool_calls.push(ToolInvocation {
                    name: FILE_SEARCH_TOOL.to_string(),
                    output: json!({
                        "queries": item.get("queries").cloned().unwrap_or(Value::Null),
                        "results": item.get("results").cloned().unwrap_or_else(|| json!([])),
                    }),
                });
            }
            Some("message") => {
                let blocks = item.get("content").and_then(Value::as_array);
                for block in blocks.into_iter().flatten() {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        texts.push(text.to_string());
                    }

                    let annotations = block.get("annotations").and_then(Value::as_array);
                    for annotation in annotations.into_iter().flatten() {
                        if annotation.get("type").and_then(Value::as_str) != Some("file_citation") {
                            continue;
                        }
                        if let Some(file_id) = annotation.get("file_id").and_then(Value::as_str) {
                            trace.citations.push(Citation {
                                file_id: file_id.to_string(),
                                file_name: annotation
                                    .get("filename")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                                quote: annotation
                                    .get("quote")
                                    .and_then(Value::as_str)
                                    .map(str::to_string),
                            });
                        }
                    }
                }
            }
            other => tracing::trace!("Skipping response item of type {:?}", other),
        }
    }

    trace.text = texts.join("\n");
    trace
}

#[async_trait::async_trait]
impl SimilaritySearch for OpenAiSearchBackend {
    async fn search(&self, store_id: &str, query: &str, top_k: usize) -> AppResult<Vec<VectorMatch>> {
        tracing::debug!("Vector store search on '{}' (top_k: {})", store_id, top_k);

        let url = format!("{}/vector_stores/{}/search", self.base_url, store_id);
        let body = json!({ "query": query, "max_num_results": top_k });

        let page: SearchPage = self
            .post(&url, &body)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse search response: {}", e)))?;

        Ok(page.data.into_iter().map(VectorMatch::from).collect())
    }
}

#[async_trait::async_trait]
impl ToolSearchBackend for OpenAiSearchBackend {
    async fn generate_with_search(&self, request: &ToolSearchRequest) -> AppResult<ToolSearchResponse> {
        tracing::debug!(
            "Tool-bound generation (model: {}, stores: {})",
            request.model,
            request.store_ids.join(",")
        );

        let url = format!("{}/responses", self.base_url);
        let body: ResponsesBody = self
            .post(&url, &Self::responses_body(request))
            .await?
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse responses output: {}", e)))?;

        Ok(read_trace(body.output))
    }
}
