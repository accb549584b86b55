//! The `search_knowledge_base` tool.
//!
//! The boundary a chat model calls. It always answers with a
//! `{success, results?, total_results?, error?}` envelope and never fails.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ClassifiedError;
use crate::filter::FilterSpec;
use crate::gate::GateFlags;
use crate::pipeline::{RetrievalPipeline, RetrievalRequest};
use crate::types::{RerankMethod, RetrievalConfig, RetrievalResult, RewriteStrategy};

/// Arguments as sent by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchToolArgs {
    pub query: String,
    pub vector_store_id: String,
    #[serde(default)]
    pub enable_rewriting: bool,
    #[serde(default)]
    pub enable_reranking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
}

/// Tool result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<RetrievalResult>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(results: Vec<RetrievalResult>) -> Self {
        Self {
            success: true,
            total_results: Some(results.len()),
            results: Some(results),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: None,
            total_results: None,
            error: Some(error.into()),
        }
    }
}

pub struct SearchTool {
    pipeline: Arc<RetrievalPipeline>,
    rewrite_strategy: RewriteStrategy,
    rerank_method: RerankMethod,
    flags: GateFlags,
    filters: Option<FilterSpec>,
}

impl SearchTool {
    pub const NAME: &'static str = "search_knowledge_base";

    pub fn new(pipeline: Arc<RetrievalPipeline>) -> Self {
        let two_pass = pipeline.config().two_pass;
        Self {
            pipeline,
            rewrite_strategy: RewriteStrategy::default(),
            rerank_method: RerankMethod::default(),
            flags: GateFlags::new(true, false, two_pass),
            filters: None,
        }
    }

    /// Strategy and method used when the model turns rewriting or reranking on.
    pub fn with_config(mut self, strategy: RewriteStrategy, method: RerankMethod) -> Self {
        self.rewrite_strategy = strategy;
        self.rerank_method = method;
        self
    }

    pub fn with_flags(mut self, flags: GateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Metadata filters applied to every search.
    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Function definition to register with a chat model.
    pub fn definition() -> Value {
        json!({
            "name": Self::NAME,
            "description": "Search the knowledge base for passages relevant to a query.",
            "parameters": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for"
                    },
                    "vector_store_id": {
                        "type": "string",
                        "description": "Vector store to search"
                    },
                    "enable_rewriting": {
                        "type": "boolean",
                        "description": "Rewrite the query into several variants before searching"
                    },
                    "enable_reranking": {
                        "type": "boolean",
                        "description": "Rerank the results against the query"
                    },
                    "max_results": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Maximum number of results"
                    }
                },
                "required": ["query", "vector_store_id"]
            }
        })
    }

    fn request(&self, args: &SearchToolArgs) -> RetrievalRequest {
        let top_k = args
            .max_results
            .unwrap_or(self.pipeline.config().default_top_k);

        let mut config = RetrievalConfig::new(top_k);
        if args.enable_rewriting {
            config = config.with_rewriting(self.rewrite_strategy);
        }
        if args.enable_reranking {
            config = config.with_reranking(self.rerank_method);
        }
        if let Some(filters) = &self.filters {
            config = config.with_filters(filters.clone());
        }

        RetrievalRequest::new(&args.query, vec![args.vector_store_id.clone()], config)
            .with_flags(self.flags)
    }

    pub async fn execute(&self, args: SearchToolArgs) -> ToolOutcome {
        tracing::info!("Executing {} for '{}'", Self::NAME, args.query);

        match self.pipeline.try_run(&self.request(&args)).await {
            Ok(results) => ToolOutcome::success(results),
            Err(e) => {
                let classified = ClassifiedError::classify(&e);
                tracing::warn!(
                    status = ?classified.status_code,
                    retryable = classified.retryable,
                    "{} failed: {}",
                    Self::NAME,
                    classified.message
                );
                ToolOutcome::failure(classified.message)
            }
        }
    }

    /// Execute from raw JSON arguments; malformed arguments become a failure envelope.
    pub async fn execute_json(&self, arguments: &str) -> ToolOutcome {
        match serde_json::from_str::<SearchToolArgs>(arguments) {
            Ok(args) => self.execute(args).await,
            Err(e) => ToolOutcome::failure(format!("Invalid arguments: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::VectorMatch;
    use crate::config::PipelineConfig;
    use crate::testing::{FnLlm, ScriptedVectorBackend};
    use crate::types::Metadata;

    fn tool(backend: Arc<ScriptedVectorBackend>) -> SearchTool {
        let llm = FnLlm::new(|_| Ok(String::new()));
        SearchTool::new(Arc::new(RetrievalPipeline::new(llm, backend, PipelineConfig::default())))
    }

    #[test]
    fn test_outcome_skips_absent_fields() {
        let failure = serde_json::to_value(ToolOutcome::failure("Bad request")).unwrap();
        assert_eq!(failure, json!({"success": false, "error": "Bad request"}));

        let success = serde_json::to_value(ToolOutcome::success(Vec::new())).unwrap();
        assert_eq!(success, json!({"success": true, "results": [], "total_results": 0}));
    }

    #[test]
    fn test_definition_requires_query_and_store() {
        let definition = SearchTool::definition();
        assert_eq!(definition["name"], SearchTool::NAME);
        assert_eq!(
            definition["parameters"]["required"],
            json!(["query", "vector_store_id"])
        );
    }

    #[tokio::test]
    async fn test_max_results_defaults_to_pipeline_top_k() {
        let backend = ScriptedVectorBackend::always(Vec::new());
        let tool = tool(backend.clone());

        let outcome = tool
            .execute(SearchToolArgs {
                query: "q".to_string(),
                vector_store_id: "vs_docs".to_string(),
                enable_rewriting: false,
                enable_reranking: false,
                max_results: None,
            })
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.total_results, Some(0));
        assert_eq!(backend.queries(), vec![("vs_docs".to_string(), "q".to_string(), 5)]);
    }

    #[tokio::test]
    async fn test_execute_json() {
        let backend = ScriptedVectorBackend::always(vec![VectorMatch {
            id: Some("chunk-1".to_string()),
            file_id: None,
            file_name: None,
            score: 0.5,
            content: "text".to_string(),
            attributes: Metadata::new(),
        }]);
        let tool = tool(backend);

        let outcome = tool
            .execute_json(r#"{"query": "q", "vector_store_id": "vs_docs", "max_results": 2}"#)
            .await;
        assert_eq!(outcome.total_results, Some(1));

        let malformed = tool.execute_json(r#"{"query": "q"}"#).await;
        assert!(!malformed.success);
        assert!(malformed.error.unwrap().contains("vector_store_id"));
    }

    #[tokio::test]
    async fn test_zero_max_results_is_a_failure_envelope() {
        let tool = tool(ScriptedVectorBackend::always(Vec::new()));

        let outcome = tool
            .execute_json(r#"{"query": "q", "vector_store_id": "vs_docs", "max_results": 0}"#)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("topK must be at least 1"));
    }
}
