//! Per-candidate relevance scoring.
//!
//! Every candidate is scored by its own completion call, all calls in
//! flight at once. Scores are independent of each other.

use futures::future::join_all;
use recall_core::{AppError, AppResult};
use recall_llm::{LlmClient, LlmRequest};
use serde_json::json;

use super::preview;
use crate::templates;
use crate::types::RetrievalResult;

/// Characters of content sent with each scoring call.
const DOCUMENT_CHARS: usize = 1000;

/// Metadata key holding the 0-100 score.
pub const RERANK_SCORE_KEY: &str = "rerankScore";

/// Score each candidate 0-100 and sort descending, ties in original order.
///
/// A candidate whose call fails scores 0. The score is recorded under
/// `metadata.rerankScore` and `score` becomes the score divided by 100.
pub async fn cross_encoder_rerank(
    client: &dyn LlmClient,
    model: &str,
    query: &str,
    results: Vec<RetrievalResult>,
) -> Vec<RetrievalResult> {
    let scores = join_all(
        results
            .iter()
            .map(|result| score_candidate(client, model, query, result)),
    )
    .await;

    let mut scored: Vec<(f32, RetrievalResult)> = results
        .into_iter()
        .zip(scores)
        .map(|(mut result, score)| {
            let score = score.unwrap_or_else(|e| {
                tracing::warn!("Scoring '{}' failed, using 0: {}", result.id, e);
                0.0
            });
            result.metadata.insert(RERANK_SCORE_KEY.to_string(), json!(score));
            result.score = score / 100.0;
            (score, result)
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, result)| result).collect()
}

async fn score_candidate(
    client: &dyn LlmClient,
    model: &str,
    query: &str,
    result: &RetrievalResult,
) -> AppResult<f32> {
    let prompt = templates::render(
        templates::CROSS_ENCODER,
        &json!({ "query": query, "document": preview(&result.content, DOCUMENT_CHARS) }),
    )?;

    let request = LlmRequest::new(prompt, model)
        .with_temperature(0.0)
        .with_max_tokens(8);
    let response = client.complete(&request).await?;

    parse_score(&response.content).ok_or_else(|| {
        AppError::Serialization(format!("No score in response: {}", response.content.trim()))
    })
}

/// First number in `text` that is not part of a scale mention such as
/// "0-100", "0 to 100", "/100" or "out of 100", clamped to 0..=100.
pub(crate) fn parse_score(text: &str) -> Option<f32> {
    let lowered = text.to_ascii_lowercase();
    let spans = number_spans(&lowered);

    let (start, end) = spans
        .iter()
        .find(|(start, end)| !is_scale_bound(&lowered, *start, *end))
        .or_else(|| spans.first())
        .copied()?;

    let value: f32 = lowered[start..end].parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}

/// Byte spans of unsigned decimal numbers.
fn number_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        spans.push((start, i));
    }

    spans
}

fn is_scale_bound(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].trim_end();
    let after = text[end..].trim_start();
    let starts_with_digit = |s: &str| s.trim_start().starts_with(|c: char| c.is_ascii_digit());

    let closes_range = before.ends_with('-')
        || before.ends_with('/')
        || before.ends_with(" to")
        || before.ends_with("out of");
    let opens_range = after
        .strip_prefix('-')
        .or_else(|| after.strip_prefix("to "))
        .is_some_and(starts_with_digit);

    closes_range || opens_range
}
