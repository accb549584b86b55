//! Retrieval backend seams.
//!
//! Two shapes: tool-bound generation, where a model runs a search tool and
//! the hits come back inside the response trace, and direct similarity
//! search against a vector store.

pub mod openai;

pub use openai::OpenAiSearchBackend;

use recall_core::AppResult;
use serde::{Deserialize, Serialize};

use crate::types::Metadata;

/// Name of the backend-native search tool in a response trace.
pub const FILE_SEARCH_TOOL: &str = "file_search";

/// One raw hit from a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    pub score: f32,

    pub content: String,

    #[serde(default)]
    pub attributes: Metadata,
}

/// Direct similarity search over one vector store.
#[async_trait::async_trait]
pub trait SimilaritySearch: Send + Sync + std::fmt::Debug {
    /// Return at most `top_k` matches for `query`, best first.
    async fn search(&self, store_id: &str, query: &str, top_k: usize) -> AppResult<Vec<VectorMatch>>;
}

/// A generation request with the search tool bound to some stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSearchRequest {
    pub model: String,
    pub query: String,
    pub store_ids: Vec<String>,
    pub max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl ToolSearchRequest {
    pub fn new(
        model: impl Into<String>,
        query: impl Into<String>,
        store_ids: Vec<String>,
        max_results: usize,
    ) -> Self {
        Self {
            model: model.into(),
            query: query.into(),
            store_ids,
            max_results,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

/// One tool invocation from the response trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,

    /// Raw tool output; its shape varies by backend
    pub output: serde_json::Value,
}

/// A native file citation attached to the generated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub file_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

/// Everything a tool-bound generation call returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSearchResponse {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub tool_calls: Vec<ToolInvocation>,

    #[serde(default)]
    pub citations: Vec<Citation>,
}

/// Tool-bound generation.
#[async_trait::async_trait]
pub trait ToolSearchBackend: Send + Sync + std::fmt::Debug {
    async fn generate_with_search(&self, request: &ToolSearchRequest) -> AppResult<ToolSearchResponse>;
}
