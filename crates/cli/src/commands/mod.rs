//! Command handlers for the Recall CLI.

pub mod rewrite;
pub mod search;

pub use rewrite::RewriteCommand;
pub use search::SearchCommand;

use recall_core::{config::AppConfig, AppError, AppResult};
use recall_llm::{create_client, LlmClient};
use recall_retrieval::{OpenAiSearchBackend, PipelineConfig, RetrievalPipeline};
use std::sync::Arc;

/// Completion client for the active provider.
pub(crate) fn completion_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.as_ref().and_then(|pc| pc.endpoint());
    let api_key = config.resolve_api_key(&config.provider);

    tracing::debug!(
        "Creating {} client (endpoint: {})",
        config.provider,
        endpoint.unwrap_or("default")
    );

    create_client(&config.provider, endpoint, api_key.as_deref())
}

/// Pipeline wired to the configured provider and the OpenAI vector store API.
pub(crate) fn build_pipeline(config: &AppConfig) -> AppResult<RetrievalPipeline> {
    let llm = completion_client(config)?;

    let pipeline_config = PipelineConfig::default()
        .with_model(&config.model)
        .with_settings(&config.retrieval);

    let api_key = config.resolve_api_key("openai").ok_or_else(|| {
        AppError::Config(
            "Vector store search requires an OpenAI API key. Set RECALL_API_KEY.".to_string(),
        )
    })?;

    let backend = Arc::new(match &pipeline_config.search_endpoint {
        Some(endpoint) => OpenAiSearchBackend::with_base_url(endpoint, api_key),
        None => OpenAiSearchBackend::new(api_key),
    });

    Ok(RetrievalPipeline::new(llm, backend.clone(), pipeline_config).with_tool_backend(backend))
}
