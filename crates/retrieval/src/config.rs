//! Pipeline-wide defaults.

use recall_core::RetrievalSettings;
use std::time::Duration;

use crate::rerank::{DEFAULT_DIVERSITY_CAP, DEFAULT_MMR_LAMBDA, DEFAULT_PREVIEW_CHARS};
use crate::retry::RetryPolicy;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Explicit configuration handed to a [`crate::RetrievalPipeline`] at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Result count when a request does not set one
    pub default_top_k: usize,

    pub mmr_lambda: f32,

    pub diversity_cap: usize,

    /// Applied to every backend call
    pub retry: RetryPolicy,

    pub rewrite_model: String,

    pub rerank_model: String,

    /// Model driving tool-based search
    pub primary_model: String,

    /// Cheaper model driving two-pass search
    pub secondary_model: String,

    pub preview_chars: usize,

    /// Deadline for one whole pipeline run
    pub timeout: Option<Duration>,

    /// Two-pass toggle used when a caller does not pass gate flags
    pub two_pass: bool,

    /// Base URL of the search backend, if not the public API
    pub search_endpoint: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            mmr_lambda: DEFAULT_MMR_LAMBDA,
            diversity_cap: DEFAULT_DIVERSITY_CAP,
            retry: RetryPolicy::default(),
            rewrite_model: DEFAULT_MODEL.to_string(),
            rerank_model: DEFAULT_MODEL.to_string(),
            primary_model: DEFAULT_MODEL.to_string(),
            secondary_model: DEFAULT_MODEL.to_string(),
            preview_chars: DEFAULT_PREVIEW_CHARS,
            timeout: None,
            two_pass: false,
            search_endpoint: None,
        }
    }
}

impl PipelineConfig {
    /// Use `model` for rewriting, reranking and tool-based search.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.rewrite_model = model.clone();
        self.rerank_model = model.clone();
        self.primary_model = model;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overlay the `retrieval` section of the config file.
    pub fn with_settings(mut self, settings: &RetrievalSettings) -> Self {
        if let Some(top_k) = settings.top_k {
            self.default_top_k = top_k;
        }
        if let Some(lambda) = settings.mmr_lambda {
            self.mmr_lambda = lambda;
        }
        if let Some(cap) = settings.diversity_cap {
            self.diversity_cap = cap;
        }
        if let Some(max_attempts) = settings.max_attempts {
            self.retry.max_attempts = max_attempts;
        }
        if let Some(base_delay_ms) = settings.base_delay_ms {
            self.retry.base_delay_ms = base_delay_ms;
        }
        if let Some(multiplier) = settings.backoff_multiplier {
            self.retry.backoff_multiplier = multiplier;
        }
        if let Some(model) = &settings.secondary_model {
            self.secondary_model = model.clone();
        }
        if let Some(endpoint) = &settings.search_endpoint {
            self.search_endpoint = Some(endpoint.clone());
        }
        if let Some(two_pass) = settings.two_pass {
            self.two_pass = two_pass;
        }
        if let Some(secs) = settings.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        self
    }
}
