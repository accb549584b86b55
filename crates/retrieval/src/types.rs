//! Retrieval pipeline type definitions.

use recall_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::filter::FilterSpec;

/// Metadata attached to a retrieved document.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A document returned by one of the retrievers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Result identifier (backend id, or a content hash when the backend has none)
    pub id: String,

    /// Retrieved text
    pub content: String,

    /// Backend relevance score, either 0..1 or 0..100 depending on the source
    pub score: f32,

    /// Open key/value metadata (fileType, tags, createdAt, ...)
    #[serde(default)]
    pub metadata: Metadata,

    /// Backend file identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    /// Human-readable file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl RetrievalResult {
    /// Create a result with no file information or metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            score,
            metadata: Metadata::new(),
            file_id: None,
            file_name: None,
        }
    }

    /// Attach file identity.
    pub fn with_file(mut self, file_id: impl Into<String>, file_name: Option<String>) -> Self {
        self.file_id = Some(file_id.into());
        self.file_name = file_name;
        self
    }

    /// Insert one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Deduplication key: `file_id` when present, otherwise `id`.
    pub fn identity(&self) -> &str {
        self.file_id.as_deref().unwrap_or(&self.id)
    }

    /// Score normalised to 0..1.
    ///
    /// Scores above 1 are assumed to be on the 0..100 scale.
    pub fn relevance(&self) -> f32 {
        if self.score > 1.0 {
            (self.score / 100.0).min(1.0)
        } else {
            self.score.max(0.0)
        }
    }

    /// String value of a metadata key, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Stable identifier derived from content, for backends that return no id.
pub fn content_id(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Query rewriting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteStrategy {
    /// Synonym and related-term variations
    #[default]
    Expansion,
    /// One clarified, self-contained query
    Refinement,
    /// Independent sub-queries
    Decomposition,
    /// Alternative framings of the same question
    MultiPerspective,
    /// A hypothetical answer used as a pseudo-query (HyDE)
    #[serde(rename = "hyde", alias = "hypothetical-document")]
    HypotheticalDocument,
}

impl RewriteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expansion => "expansion",
            Self::Refinement => "refinement",
            Self::Decomposition => "decomposition",
            Self::MultiPerspective => "multi-perspective",
            Self::HypotheticalDocument => "hyde",
        }
    }
}

impl fmt::Display for RewriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewriteStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expansion" | "expand" => Ok(Self::Expansion),
            "refinement" | "refine" => Ok(Self::Refinement),
            "decomposition" | "decompose" => Ok(Self::Decomposition),
            "multi-perspective" | "multi_perspective" | "perspectives" => {
                Ok(Self::MultiPerspective)
            }
            "hyde" | "hypothetical-document" | "hypothetical" => Ok(Self::HypotheticalDocument),
            other => Err(AppError::Config(format!(
                "Unknown rewrite strategy: {}. Supported: expansion, refinement, decomposition, multi-perspective, hyde",
                other
            ))),
        }
    }
}

/// Reranking algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankMethod {
    /// One completion call ranks all candidates
    #[default]
    Semantic,
    /// One scoring call per candidate
    CrossEncoder,
    /// Maximal marginal relevance
    Diversity,
}

impl RerankMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::CrossEncoder => "cross-encoder",
            Self::Diversity => "diversity",
        }
    }
}

impl fmt::Display for RerankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RerankMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "cross-encoder" | "cross_encoder" | "crossencoder" => Ok(Self::CrossEncoder),
            "diversity" | "mmr" => Ok(Self::Diversity),
            other => Err(AppError::Config(format!(
                "Unknown rerank method: {}. Supported: semantic, cross-encoder, diversity",
                other
            ))),
        }
    }
}

/// Per-request retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    #[serde(default)]
    pub query_rewriting: bool,

    #[serde(default)]
    pub rewrite_strategy: RewriteStrategy,

    #[serde(default)]
    pub reranking: bool,

    #[serde(default)]
    pub reranking_method: RerankMethod,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_filters: Option<FilterSpec>,

    pub top_k: usize,

    /// Conversation context handed to the refinement strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite_context: Option<String>,
}

impl RetrievalConfig {
    /// Plain retrieval of `top_k` results: no rewriting, reranking, or filters.
    pub fn new(top_k: usize) -> Self {
        Self {
            query_rewriting: false,
            rewrite_strategy: RewriteStrategy::default(),
            reranking: false,
            reranking_method: RerankMethod::default(),
            metadata_filters: None,
            top_k,
            rewrite_context: None,
        }
    }

    pub fn with_rewriting(mut self, strategy: RewriteStrategy) -> Self {
        self.query_rewriting = true;
        self.rewrite_strategy = strategy;
        self
    }

    pub fn with_reranking(mut self, method: RerankMethod) -> Self {
        self.reranking = true;
        self.reranking_method = method;
        self
    }

    pub fn with_filters(mut self, filters: FilterSpec) -> Self {
        self.metadata_filters = Some(filters);
        self
    }

    pub fn with_rewrite_context(mut self, context: impl Into<String>) -> Self {
        self.rewrite_context = Some(context.into());
        self
    }

    /// Check `top_k >= 1`.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_prefers_file_id() {
        let plain = RetrievalResult::new("chunk-1", "text", 0.5);
        assert_eq!(plain.identity(), "chunk-1");

        let with_file = plain.with_file("file-9", Some("guide.pdf".to_string()));
        assert_eq!(with_file.identity(), "file-9");
    }

    #[test]
    fn test_relevance_normalises_percent_scores() {
        assert_eq!(RetrievalResult::new("a", "", 0.42).relevance(), 0.42);
        assert_eq!(RetrievalResult::new("a", "", 85.0).relevance(), 0.85);
        assert_eq!(RetrievalResult::new("a", "", -0.3).relevance(), 0.0);
    }

    #[test]
    fn test_content_id_is_stable() {
        assert_eq!(content_id("hello"), content_id("hello"));
        assert_ne!(content_id("hello"), content_id("world"));
        assert_eq!(content_id("hello").len(), 16);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            "multi-perspective".parse::<RewriteStrategy>().unwrap(),
            RewriteStrategy::MultiPerspective
        );
        assert_eq!(
            "hypothetical-document".parse::<RewriteStrategy>().unwrap(),
            RewriteStrategy::HypotheticalDocument
        );
        assert!("telepathy".parse::<RewriteStrategy>().is_err());
        assert_eq!("mmr".parse::<RerankMethod>().unwrap(), RerankMethod::Diversity);
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: RetrievalConfig = serde_json::from_value(serde_json::json!({
            "queryRewriting": true,
            "rewriteStrategy": "hyde",
            "reranking": true,
            "rerankingMethod": "cross-encoder",
            "topK": 4
        }))
        .unwrap();

        assert!(config.query_rewriting);
        assert_eq!(config.rewrite_strategy, RewriteStrategy::HypotheticalDocument);
        assert_eq!(config.reranking_method, RerankMethod::CrossEncoder);
        assert_eq!(config.top_k, 4);
        assert!(config.metadata_filters.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        assert!(RetrievalConfig::new(0).validate().is_err());
        assert!(RetrievalConfig::new(1).validate().is_ok());
    }
}
