//! Metadata filtering for retrieved results.
//!
//! Every filter dimension is optional; the ones that are set are combined
//! with AND semantics. Input order is preserved.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RetrievalResult;

/// Metadata keys checked for a document's file type, in order.
const FILE_TYPE_KEYS: [&str; 2] = ["fileType", "file_type"];

/// Metadata keys checked for a document's date, in order.
const DATE_KEYS: [&str; 4] = ["createdAt", "created_at", "date", "modifiedAt"];

/// Inclusive date window. Either bound may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| instant >= start)
            && self.end.map_or(true, |end| instant <= end)
    }
}

/// Filters applied to retrieved results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    /// Allowed file types (e.g., ["pdf", "md"])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_types: Option<Vec<String>>,

    /// Allowed date window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,

    /// A result must carry at least one of these tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    /// Minimum raw backend score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

impl FilterSpec {
    /// Create a new empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by file types
    pub fn with_file_types(mut self, file_types: Vec<String>) -> Self {
        self.file_types = Some(file_types);
        self
    }

    /// Filter by date window
    pub fn with_date_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_range = Some(DateRange { start, end });
        self
    }

    /// Filter by tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set minimum score
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Check if any filters are set
    pub fn has_filters(&self) -> bool {
        self.file_types.is_some()
            || self.date_range.is_some()
            || self.tags.is_some()
            || self.min_score.is_some()
    }

    /// Whether a single result passes every configured filter.
    pub fn matches(&self, result: &RetrievalResult) -> bool {
        if let Some(min_score) = self.min_score {
            if result.score < min_score {
                return false;
            }
        }

        if let Some(file_types) = &self.file_types {
            let matched = file_type_of(result)
                .map(|ft| file_types.iter().any(|t| normalize_type(t) == ft))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        if let Some(tags) = &self.tags {
            let matched = result
                .metadata
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|result_tags| {
                    result_tags.iter().any(|rt| {
                        rt.as_str()
                            .map(|rt_str| tags.iter().any(|t| rt_str.eq_ignore_ascii_case(t)))
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        if let Some(range) = &self.date_range {
            let matched = date_of(result)
                .map(|instant| range.contains(instant))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        true
    }

    /// Apply filters to a list of results, preserving order.
    pub fn apply(&self, results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        if !self.has_filters() {
            return results;
        }

        let before = results.len();
        let filtered: Vec<RetrievalResult> =
            results.into_iter().filter(|r| self.matches(r)).collect();

        tracing::debug!("Metadata filters kept {} of {} results", filtered.len(), before);
        filtered
    }
}

fn normalize_type(file_type: &str) -> String {
    file_type.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// File type from metadata, falling back to the file name's extension.
fn file_type_of(result: &RetrievalResult) -> Option<String> {
    FILE_TYPE_KEYS
        .iter()
        .find_map(|key| result.metadata_str(key))
        .map(normalize_type)
        .or_else(|| {
            result
                .file_name
                .as_deref()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| normalize_type(ext))
        })
}

/// Date from metadata: RFC 3339, `YYYY-MM-DD`, or unix seconds.
fn date_of(result: &RetrievalResult) -> Option<DateTime<Utc>> {
    let value = DATE_KEYS.iter().find_map(|key| result.metadata.get(*key))?;

    if let Some(ts) = value.as_i64() {
        return DateTime::from_timestamp(ts, 0);
    }

    let text = value.as_str()?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
