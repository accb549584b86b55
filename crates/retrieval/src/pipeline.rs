//! Retrieval orchestration.
//!
//! One run: produce query variants, retrieve each through the gated route
//! with retries, deduplicate, filter, rerank against the original query and
//! truncate to `top_k`.

use recall_core::{AppError, AppResult};
use recall_llm::LlmClient;
use std::collections::HashSet;
use std::sync::Arc;

use crate::backends::{SimilaritySearch, ToolSearchBackend};
use crate::config::PipelineConfig;
use crate::gate::{self, GateFlags, RetrievalRoute};
use crate::rerank::Reranker;
use crate::retriever::{Retriever, ToolBasedSearch, TwoPassRetrieval, VectorFallbackRetrieval};
use crate::retry::with_retry;
use crate::rewrite::QueryRewriter;
use crate::types::{RetrievalConfig, RetrievalResult};

/// Input for one pipeline run.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub store_ids: Vec<String>,
    pub config: RetrievalConfig,
    pub flags: GateFlags,
}

impl RetrievalRequest {
    /// A request that searches with direct vector retrieval.
    pub fn new(query: impl Into<String>, store_ids: Vec<String>, config: RetrievalConfig) -> Self {
        Self {
            query: query.into(),
            store_ids,
            config,
            flags: GateFlags::new(true, false, false),
        }
    }

    pub fn with_flags(mut self, flags: GateFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Drop later results whose identity key was already seen, keeping order.
pub fn dedup_results(results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|result| seen.insert(result.identity().to_string()))
        .collect()
}

pub struct RetrievalPipeline {
    llm: Arc<dyn LlmClient>,
    vector_backend: Arc<dyn SimilaritySearch>,
    tool_backend: Option<Arc<dyn ToolSearchBackend>>,
    config: PipelineConfig,
}

impl RetrievalPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        vector_backend: Arc<dyn SimilaritySearch>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            llm,
            vector_backend,
            tool_backend: None,
            config,
        }
    }

    /// Enable the tool-based and two-pass routes.
    pub fn with_tool_backend(mut self, backend: Arc<dyn ToolSearchBackend>) -> Self {
        self.tool_backend = Some(backend);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline, degrading any failure to an empty result list.
    pub async fn run(&self, request: &RetrievalRequest) -> Vec<RetrievalResult> {
        match self.try_run(request).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("Retrieval failed, continuing without context: {}", e);
                Vec::new()
            }
        }
    }

    /// Run the pipeline under the configured deadline.
    ///
    /// Fails only on an invalid request, when every query variant failed to
    /// retrieve, or when the deadline passes.
    pub async fn try_run(&self, request: &RetrievalRequest) -> AppResult<Vec<RetrievalResult>> {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_stages(request))
                .await
                .map_err(|_| {
                    AppError::Timeout(format!("Retrieval did not finish within {:?}", limit))
                })?,
            None => self.run_stages(request).await,
        }
    }

    async fn run_stages(&self, request: &RetrievalRequest) -> AppResult<Vec<RetrievalResult>> {
        let config = &request.config;
        config.validate()?;

        let route = gate::route(request.flags);
        if route == RetrievalRoute::Disabled {
            tracing::debug!("Search disabled, skipping retrieval");
            return Ok(Vec::new());
        }
        if request.store_ids.is_empty() {
            return Err(AppError::Config("No vector store id given".to_string()));
        }

        tracing::info!("Retrieving for query '{}' via {:?}", request.query, route);

        let variants = if config.query_rewriting {
            QueryRewriter::new(Arc::clone(&self.llm), &self.config.rewrite_model)
                .rewrite(
                    &request.query,
                    config.rewrite_strategy,
                    config.rewrite_context.as_deref(),
                )
                .await
        } else {
            vec![request.query.clone()]
        };

        let mut accumulated = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for variant in &variants {
            match self
                .retrieve_variant(route, variant, &request.store_ids, config.top_k)
                .await
            {
                Ok(results) => {
                    tracing::debug!("Variant '{}' returned {} result(s)", variant, results.len());
                    succeeded += 1;
                    accumulated.extend(results);
                }
                Err(e) => {
                    tracing::warn!("Retrieval for variant '{}' failed: {}", variant, e);
                    last_error = Some(e);
                }
            }
        }

        if succeeded == 0 {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let mut results = dedup_results(accumulated);

        if let Some(filters) = config.metadata_filters.as_ref().filter(|f| f.has_filters()) {
            results = filters.apply(results);
        }

        if config.reranking && !results.is_empty() {
            results = Reranker::new(Arc::clone(&self.llm), &self.config.rerank_model)
                .with_preview_chars(self.config.preview_chars)
                .with_lambda(self.config.mmr_lambda)
                .with_diversity_cap(self.config.diversity_cap)
                .rerank(config.reranking_method, &request.query, results, config.top_k)
                .await;
        }

        results.truncate(config.top_k);

        tracing::info!(
            "Retrieved {} result(s) from {} variant(s)",
            results.len(),
            variants.len()
        );
        Ok(results)
    }

    async fn retrieve_variant(
        &self,
        route: RetrievalRoute,
        query: &str,
        store_ids: &[String],
        top_k: usize,
    ) -> AppResult<Vec<RetrievalResult>> {
        match (route, &self.tool_backend) {
            (RetrievalRoute::Disabled, _) => Ok(Vec::new()),
            (RetrievalRoute::ToolBased, Some(backend)) => {
                let retriever = ToolBasedSearch::new(
                    Arc::clone(backend),
                    &self.config.primary_model,
                    store_ids.to_vec(),
                );
                self.retrieve_with_retry(&retriever, query, top_k).await
            }
            (RetrievalRoute::TwoPass, Some(backend)) => {
                let retriever = TwoPassRetrieval::new(
                    Arc::clone(backend),
                    &self.config.secondary_model,
                    store_ids.to_vec(),
                );
                let results = self.retrieve_with_retry(&retriever, query, top_k).await?;
                if !results.is_empty() {
                    return Ok(results);
                }

                tracing::info!("Two-pass search found nothing, falling back to vector search");
                self.retrieve_vector(query, store_ids, top_k).await
            }
            (RetrievalRoute::ToolBased | RetrievalRoute::TwoPass, None) => {
                tracing::warn!("No tool search backend configured, using vector search");
                self.retrieve_vector(query, store_ids, top_k).await
            }
            (RetrievalRoute::Vector, _) => self.retrieve_vector(query, store_ids, top_k).await,
        }
    }

    async fn retrieve_vector(
        &self,
        query: &str,
        store_ids: &[String],
        top_k: usize,
    ) -> AppResult<Vec<RetrievalResult>> {
        let retriever = VectorFallbackRetrieval::new(Arc::clone(&self.vector_backend), store_ids.to_vec());
        self.retrieve_with_retry(&retriever, query, top_k).await
    }

    async fn retrieve_with_retry(
        &self,
        retriever: &dyn Retriever,
        query: &str,
        top_k: usize,
    ) -> AppResult<Vec<RetrievalResult>> {
        let label = format!("{} retrieval", retriever.name());
        with_retry(&self.config.retry, &label, || retriever.retrieve(query, top_k)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::VectorMatch;
    use crate::retry::RetryPolicy;
    use crate::testing::{FnLlm, ScriptedVectorBackend};
    use crate::types::{Metadata, RerankMethod, RewriteStrategy};
    use std::time::Duration;

    fn vector_match(file_id: &str, score: f32, content: &str) -> VectorMatch {
        VectorMatch {
            id: None,
            file_id: Some(file_id.to_string()),
            file_name: None,
            score,
            content: content.to_string(),
            attributes: Metadata::new(),
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default().with_retry(RetryPolicy::new(3, 10, 2.0))
    }

    fn stores() -> Vec<String> {
        vec!["vs_docs".to_string()]
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let results = vec![
            RetrievalResult::new("a", "first", 0.9),
            RetrievalResult::new("b", "other", 0.8),
            RetrievalResult::new("a", "second", 0.7),
        ];

        let deduped = dedup_results(results);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].content, "first");
        assert_eq!(deduped[1].id, "b");
    }

    #[test]
    fn test_dedup_uses_file_id() {
        let results = vec![
            RetrievalResult::new("chunk-1", "x", 0.9).with_file("file-1", None),
            RetrievalResult::new("chunk-2", "y", 0.8).with_file("file-1", None),
        ];
        assert_eq!(dedup_results(results).len(), 1);
    }

    #[tokio::test]
    async fn test_rewritten_variants_are_each_retrieved() {
        let llm = FnLlm::new(|_| Ok(r#"["variant one", "variant two"]"#.to_string()));
        let backend = ScriptedVectorBackend::scripted(vec![
            Ok(vec![vector_match("f1", 0.9, "a")]),
            Ok(vec![vector_match("f1", 0.8, "a again"), vector_match("f2", 0.7, "b")]),
            Ok(vec![vector_match("f3", 0.6, "c")]),
        ]);
        let pipeline = RetrievalPipeline::new(llm, backend.clone(), config());

        let request = RetrievalRequest::new(
            "original",
            stores(),
            RetrievalConfig::new(5).with_rewriting(RewriteStrategy::Expansion),
        );
        let results = pipeline.try_run(&request).await.unwrap();

        let queries: Vec<_> = backend.queries().into_iter().map(|(_, q, _)| q).collect();
        assert_eq!(queries, vec!["original", "variant one", "variant two"]);

        let ids: Vec<_> = results.iter().map(|r| r.identity()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        assert_eq!(results[0].content, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_variant_is_isolated() {
        let llm = FnLlm::new(|_| Ok(r#"["second"]"#.to_string()));
        let backend = ScriptedVectorBackend::scripted(vec![
            Err(AppError::Http {
                status: 403,
                message: "forbidden".to_string(),
            }),
            Ok(vec![vector_match("f2", 0.7, "b")]),
        ]);
        let pipeline = RetrievalPipeline::new(llm, backend.clone(), config());

        let request = RetrievalRequest::new(
            "first",
            stores(),
            RetrievalConfig::new(5).with_rewriting(RewriteStrategy::Expansion),
        );
        let results = pipeline.try_run(&request).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_degrades_to_empty() {
        let llm = FnLlm::new(|_| Ok(String::new()));
        let backend = ScriptedVectorBackend::scripted(
            (0..3)
                .map(|_| Err(AppError::Network("connection reset".to_string())))
                .collect(),
        );
        let pipeline = RetrievalPipeline::new(llm, backend.clone(), config());
        let request = RetrievalRequest::new("q", stores(), RetrievalConfig::new(3));

        assert!(pipeline.run(&request).await.is_empty());
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_disabled_search_retrieves_nothing() {
        let llm = FnLlm::new(|_| Ok(String::new()));
        let backend = ScriptedVectorBackend::always(vec![vector_match("f1", 0.9, "a")]);
        let pipeline = RetrievalPipeline::new(llm, backend.clone(), config());

        let request = RetrievalRequest::new("q", stores(), RetrievalConfig::new(3))
            .with_flags(GateFlags::new(false, false, false));

        assert!(pipeline.try_run(&request).await.unwrap().is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_top_k_is_rejected() {
        let llm = FnLlm::new(|_| Ok(String::new()));
        let backend = ScriptedVectorBackend::always(Vec::new());
        let pipeline = RetrievalPipeline::new(llm, backend.clone(), config());

        let request = RetrievalRequest::new("q", stores(), RetrievalConfig::new(0));

        assert!(matches!(pipeline.try_run(&request).await, Err(AppError::Config(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_tool_route_without_backend_uses_vector() {
        let llm = FnLlm::new(|_| Ok(String::new()));
        let backend = ScriptedVectorBackend::always(vec![vector_match("f1", 0.9, "a")]);
        let pipeline = RetrievalPipeline::new(llm, backend.clone(), config());

        let request = RetrievalRequest::new("q", stores(), RetrievalConfig::new(3))
            .with_flags(GateFlags::new(true, true, false));

        assert_eq!(pipeline.try_run(&request).await.unwrap().len(), 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_rerank_uses_original_query_and_truncates() {
        let llm = FnLlm::new(|req| {
            assert!(req.prompt.contains("Query: original question"));
            Ok("[2, 1, 0]".to_string())
        });
        let backend = ScriptedVectorBackend::always(vec![
            vector_match("f1", 0.9, "a"),
            vector_match("f2", 0.8, "b"),
            vector_match("f3", 0.7, "c"),
        ]);
        let pipeline = RetrievalPipeline::new(llm.clone(), backend, config());

        let request = RetrievalRequest::new(
            "original question",
            stores(),
            RetrievalConfig::new(2).with_reranking(RerankMethod::Semantic),
        );
        let results = pipeline.try_run(&request).await.unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.identity()).collect();
        assert_eq!(ids, vec!["f2", "f1"]);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_empty() {
        let llm = FnLlm::new(|_| Ok(String::new()));
        let backend = ScriptedVectorBackend::scripted(
            (0..3)
                .map(|_| Err(AppError::Http {
                    status: 503,
                    message: "unavailable".to_string(),
                }))
                .collect(),
        );
        let pipeline = RetrievalPipeline::new(
            llm,
            backend,
            PipelineConfig::default().with_timeout(Duration::from_millis(500)),
        );
        let request = RetrievalRequest::new("q", stores(), RetrievalConfig::new(3));

        let err = pipeline.try_run(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert!(pipeline.run(&request).await.is_empty());
    }
}
