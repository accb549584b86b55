//! Query rewriting.
//!
//! Each strategy is one completion call with a fixed instruction template.
//! Rewriting never fails: a failed call or malformed output degrades to the
//! original query.

use recall_core::{AppError, AppResult};
use recall_llm::{LlmClient, LlmRequest};
use serde_json::json;
use std::sync::Arc;

use crate::templates;
use crate::types::RewriteStrategy;

/// Produces alternative phrasings of a query through a completion client.
pub struct QueryRewriter {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl QueryRewriter {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Build the variant set for `query`: the original first, then distinct rewrites.
    pub async fn rewrite(
        &self,
        query: &str,
        strategy: RewriteStrategy,
        context: Option<&str>,
    ) -> Vec<String> {
        tracing::debug!("Rewriting query with strategy '{}'", strategy);

        let rewrites = match strategy {
            RewriteStrategy::Expansion => self.expand(query).await,
            RewriteStrategy::Refinement => vec![self.refine(query, context).await],
            RewriteStrategy::Decomposition => self.decompose(query).await,
            RewriteStrategy::MultiPerspective => self.multi_perspective(query).await,
            RewriteStrategy::HypotheticalDocument => vec![self.hypothetical_document(query).await],
        };

        let variants = variant_set(query, rewrites);
        tracing::info!(
            "Query rewriting ({}) produced {} variant(s)",
            strategy,
            variants.len()
        );
        variants
    }

    /// 3-5 synonym and related-term variations.
    pub async fn expand(&self, query: &str) -> Vec<String> {
        let result = self.complete_list(templates::EXPANSION, query).await;
        list_or_original(result, query, "expansion")
    }

    /// One clarified query, using `context` to resolve references.
    pub async fn refine(&self, query: &str, context: Option<&str>) -> String {
        let vars = json!({ "query": query, "context": context });
        let result = self.complete(templates::REFINEMENT, &vars, 0.3).await;
        text_or_original(result, query, "refinement")
    }

    /// 2-4 independent sub-queries.
    pub async fn decompose(&self, query: &str) -> Vec<String> {
        let result = self.complete_list(templates::DECOMPOSITION, query).await;
        list_or_original(result, query, "decomposition")
    }

    /// 3-4 alternative framings.
    pub async fn multi_perspective(&self, query: &str) -> Vec<String> {
        let result = self.complete_list(templates::MULTI_PERSPECTIVE, query).await;
        list_or_original(result, query, "multi-perspective")
    }

    /// A hypothetical ideal answer, used as a pseudo-query for similarity search.
    pub async fn hypothetical_document(&self, query: &str) -> String {
        let vars = json!({ "query": query });
        let result = self.complete(templates::HYPOTHETICAL_DOCUMENT, &vars, 0.7).await;
        text_or_original(result, query, "hyde")
    }

    async fn complete_list(&self, template: &str, query: &str) -> AppResult<Vec<String>> {
        let text = self.complete(template, &json!({ "query": query }), 0.7).await?;
        parse_string_array(&text).ok_or_else(|| {
            AppError::Serialization(format!(
                "Expected a JSON array of strings, got: {}",
                truncate(&text, 120)
            ))
        })
    }

    async fn complete(
        &self,
        template: &str,
        vars: &serde_json::Value,
        temperature: f32,
    ) -> AppResult<String> {
        let prompt = templates::render(template, vars)?;
        let request = LlmRequest::new(prompt, &self.model).with_temperature(temperature);
        let response = self.client.complete(&request).await?;
        Ok(response.content)
    }
}

fn list_or_original(result: AppResult<Vec<String>>, query: &str, strategy: &str) -> Vec<String> {
    match result {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!("Query {} failed, using original query: {}", strategy, e);
            vec![query.to_string()]
        }
    }
}

fn text_or_original(result: AppResult<String>, query: &str, strategy: &str) -> String {
    match result {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!("Query {} returned nothing, using original query", strategy);
            query.to_string()
        }
        Err(e) => {
            tracing::warn!("Query {} failed, using original query: {}", strategy, e);
            query.to_string()
        }
    }
}

/// Original query first, then the non-empty rewrites that differ from it.
fn variant_set(query: &str, rewrites: Vec<String>) -> Vec<String> {
    let mut variants = vec![query.to_string()];
    for rewrite in rewrites {
        let rewrite = rewrite.trim();
        if rewrite.is_empty() || variants.iter().any(|v| v.eq_ignore_ascii_case(rewrite)) {
            continue;
        }
        variants.push(rewrite.to_string());
    }
    variants
}

/// Parse a JSON array of strings out of a model response.
///
/// Tolerates markdown code fences and prose around the array. Returns `None`
/// for anything that is not a non-empty array of strings.
pub(crate) fn parse_string_array(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }

    let items: Vec<String> = serde_json::from_str(&text[start..=end]).ok()?;
    let items: Vec<String> = items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FnLlm;

    #[test]
    fn test_parse_plain_array() {
        assert_eq!(
            parse_string_array(r#"["a", "b"]"#),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_parse_fenced_array() {
        let text = "Here you go:\n```json\n[\"rust async\", \"tokio runtime\"]\n```";
        assert_eq!(
            parse_string_array(text),
            Some(vec!["rust async".to_string(), "tokio runtime".to_string()])
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_string_array("no json here"), None);
        assert_eq!(parse_string_array("[1, 2, 3]"), None);
        assert_eq!(parse_string_array("[]"), None);
        assert_eq!(parse_string_array("[\"unterminated"), None);
        assert_eq!(parse_string_array("] backwards ["), None);
    }

    #[test]
    fn test_variant_set_keeps_original_first_and_dedups() {
        let variants = variant_set(
            "tokio",
            vec!["Tokio".to_string(), "async runtime".to_string(), " ".to_string(), "async runtime".to_string()],
        );
        assert_eq!(variants, vec!["tokio".to_string(), "async runtime".to_string()]);
    }

    #[tokio::test]
    async fn test_expand_uses_json_array() {
        let llm = FnLlm::new(|_| Ok(r#"["k8s pods", "kubernetes containers", "pod scheduling"]"#.to_string()));
        let rewriter = QueryRewriter::new(llm.clone(), "test-model");

        let variants = rewriter.rewrite("kubernetes pods", RewriteStrategy::Expansion, None).await;

        assert_eq!(variants.len(), 4);
        assert_eq!(variants[0], "kubernetes pods");
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts()[0].contains("3-5 alternative search queries"));
    }

    #[tokio::test]
    async fn test_list_strategies_fall_back_on_malformed_output() {
        let llm = FnLlm::new(|_| Ok("Sure! Here are some ideas: first, second".to_string()));
        let rewriter = QueryRewriter::new(llm, "test-model");

        assert_eq!(rewriter.expand("q").await, vec!["q".to_string()]);
        assert_eq!(rewriter.decompose("q").await, vec!["q".to_string()]);
        assert_eq!(rewriter.multi_perspective("q").await, vec!["q".to_string()]);
    }

    #[tokio::test]
    async fn test_every_strategy_survives_client_failure() {
        let llm = FnLlm::new(|_| {
            Err(AppError::Http {
                status: 503,
                message: "unavailable".to_string(),
            })
        });
        let rewriter = QueryRewriter::new(llm, "test-model");

        for strategy in [
            RewriteStrategy::Expansion,
            RewriteStrategy::Refinement,
            RewriteStrategy::Decomposition,
            RewriteStrategy::MultiPerspective,
            RewriteStrategy::HypotheticalDocument,
        ] {
            let variants = rewriter.rewrite("original", strategy, None).await;
            assert_eq!(variants, vec!["original".to_string()], "strategy {}", strategy);
        }
    }

    #[tokio::test]
    async fn test_refine_uses_raw_text_and_context() {
        let llm = FnLlm::new(|req| {
            assert!(req.prompt.contains("Context:\nwe discussed the billing service"));
            Ok("  How does the billing service retry failed charges?\n".to_string())
        });
        let rewriter = QueryRewriter::new(llm, "test-model");

        let refined = rewriter
            .refine("how does it retry?", Some("we discussed the billing service"))
            .await;
        assert_eq!(refined, "How does the billing service retry failed charges?");
    }

    #[tokio::test]
    async fn test_refine_empty_response_keeps_original() {
        let llm = FnLlm::new(|_| Ok("   ".to_string()));
        let rewriter = QueryRewriter::new(llm, "test-model");
        assert_eq!(rewriter.refine("original", None).await, "original");
    }

    #[tokio::test]
    async fn test_hyde_variant_follows_original() {
        let passage = "Connection pooling keeps sockets open between requests.\n\nIt reduces latency.";
        let llm = FnLlm::new(move |_| Ok(passage.to_string()));
        let rewriter = QueryRewriter::new(llm, "test-model");

        let variants = rewriter
            .rewrite("why pool connections", RewriteStrategy::HypotheticalDocument, None)
            .await;
        assert_eq!(variants, vec!["why pool connections".to_string(), passage.to_string()]);
    }
}
