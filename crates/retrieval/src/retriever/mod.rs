//! Retriever variants.
//!
//! Each variant owns one normalisation function that maps its backend's
//! response shape into [`RetrievalResult`]s.

pub mod tool_search;
pub mod two_pass;
pub mod vector;

pub use tool_search::ToolBasedSearch;
pub use two_pass::TwoPassRetrieval;
pub use vector::VectorFallbackRetrieval;

use recall_core::AppResult;
use serde_json::{Map, Value};

use crate::types::{content_id, Metadata, RetrievalResult};

/// A single retrieval path.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Retrieve up to `top_k` results for `query`.
    async fn retrieve(&self, query: &str, top_k: usize) -> AppResult<Vec<RetrievalResult>>;
}

fn str_field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .filter(|value| !value.is_empty())
}

/// Text of a hit: a `text`/`content` string, or the text of its content blocks.
fn hit_text(object: &Map<String, Value>) -> Option<String> {
    if let Some(text) = str_field(object, &["text", "content", "chunk"]) {
        return Some(text.to_string());
    }

    let blocks = object.get("content")?.as_array()?;
    let text = blocks
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Map one search hit object into a result.
///
/// Returns `None` when the object carries no text.
pub(crate) fn hit_to_result(object: &Map<String, Value>) -> Option<RetrievalResult> {
    let content = hit_text(object)?;
    let file_id = str_field(object, &["file_id", "fileId"]).map(str::to_string);
    let file_name = str_field(object, &["filename", "file_name", "fileName"]).map(str::to_string);
    let score = object
        .get("score")
        .and_then(Value::as_f64)
        .unwrap_or(0.0) as f32;

    let id = str_field(object, &["id"])
        .map(str::to_string)
        .or_else(|| file_id.clone())
        .unwrap_or_else(|| content_id(&content));

    let mut result = RetrievalResult::new(id, content, score);
    if let Some(attributes) = object.get("attributes").and_then(Value::as_object) {
        result.metadata = attributes.clone();
    } else if let Some(metadata) = object.get("metadata").and_then(Value::as_object) {
        result.metadata = metadata.clone();
    }
    if let Some(file_id) = file_id {
        result = result.with_file(file_id, file_name);
    } else {
        result.file_name = file_name;
    }

    Some(result)
}

/// Build a result from already-separated fields.
pub(crate) fn make_result(
    id: Option<String>,
    file_id: Option<String>,
    file_name: Option<String>,
    score: f32,
    content: String,
    metadata: Metadata,
) -> RetrievalResult {
    let id = id
        .or_else(|| file_id.clone())
        .unwrap_or_else(|| content_id(&content));

    let mut result = RetrievalResult::new(id, content, score);
    result.metadata = metadata;
    result.file_id = file_id;
    result.file_name = file_name;
    result
}
