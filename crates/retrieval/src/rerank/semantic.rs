//! Single-call semantic ranking.

use recall_core::{AppError, AppResult};
use recall_llm::{LlmClient, LlmRequest};
use serde_json::{json, Value};

use super::preview;
use crate::templates;
use crate::types::RetrievalResult;

/// Rank all candidates with one completion call over content previews.
///
/// Ranked candidates come first, then unranked ones in original order, up to
/// `top_k`. A failed call or unusable ranking keeps the first `top_k` in
/// original order.
pub async fn semantic_rerank(
    client: &dyn LlmClient,
    model: &str,
    query: &str,
    results: Vec<RetrievalResult>,
    top_k: usize,
    preview_chars: usize,
) -> Vec<RetrievalResult> {
    if results.len() <= 1 {
        return results.into_iter().take(top_k).collect();
    }

    match request_ranking(client, model, query, &results, preview_chars).await {
        Ok(ranking) => {
            tracing::debug!("Semantic ranking returned {} index(es)", ranking.len());
            apply_ranking(results, &ranking, top_k)
        }
        Err(e) => {
            tracing::warn!("Semantic rerank failed, keeping retrieval order: {}", e);
            results.into_iter().take(top_k).collect()
        }
    }
}

async fn request_ranking(
    client: &dyn LlmClient,
    model: &str,
    query: &str,
    results: &[RetrievalResult],
    preview_chars: usize,
) -> AppResult<Vec<usize>> {
    let documents: Vec<&str> = results
        .iter()
        .map(|r| preview(&r.content, preview_chars))
        .collect();

    let prompt = templates::render(
        templates::SEMANTIC_RERANK,
        &json!({ "query": query, "documents": documents }),
    )?;

    let request = LlmRequest::new(prompt, model)
        .with_temperature(0.0)
        .with_json_response();
    let response = client.complete(&request).await?;

    parse_ranking(&response.content, results.len()).ok_or_else(|| {
        AppError::Serialization(format!("Unusable ranking: {}", response.content.trim()))
    })
}

/// Indices from `{"ranking": [...]}` or a bare array.
///
/// Out-of-range and repeated indices are dropped. `None` when nothing usable
/// remains.
pub(crate) fn parse_ranking(text: &str, candidates: usize) -> Option<Vec<usize>> {
    let value = extract_json(text)?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(object) => object
            .get("ranking")
            .or_else(|| object.get("indices"))
            .and_then(Value::as_array)?,
        _ => return None,
    };

    let mut ranking = Vec::with_capacity(items.len());
    for index in items.iter().filter_map(Value::as_u64) {
        let index = index as usize;
        if index < candidates && !ranking.contains(&index) {
            ranking.push(index);
        }
    }

    if ranking.is_empty() {
        None
    } else {
        Some(ranking)
    }
}

fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // Fenced or prose-wrapped output: try the outermost object, then array
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Some(value);
                }
            }
        }
    }

    None
}

/// Reorder by `ranking`, pad with the rest in original order, cap at `top_k`.
pub(crate) fn apply_ranking(
    results: Vec<RetrievalResult>,
    ranking: &[usize],
    top_k: usize,
) -> Vec<RetrievalResult> {
    let mut slots: Vec<Option<RetrievalResult>> = results.into_iter().map(Some).collect();

    let mut ordered: Vec<RetrievalResult> = ranking
        .iter()
        .filter_map(|&index| slots.get_mut(index).and_then(Option::take))
        .collect();
    ordered.extend(slots.into_iter().flatten());
    ordered.truncate(top_k);
    ordered
}
