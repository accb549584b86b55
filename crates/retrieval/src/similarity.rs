//! Lexical similarity between text spans.

use std::collections::HashSet;

/// Lowercased, whitespace-separated word set.
pub fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Jaccard coefficient of the two texts' word sets.
///
/// Two texts with no words at all have similarity 0.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    jaccard(&word_set(a), &word_set(b))
}

/// Jaccard coefficient of two precomputed word sets.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts() {
        assert_eq!(jaccard_similarity("rust async runtime", "rust async runtime"), 1.0);
    }

    #[test]
    fn test_case_and_spacing_ignored() {
        assert_eq!(jaccard_similarity("Rust  Async", "rust\nasync"), 1.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {a, b, c} vs {b, c, d}: 2 shared of 4 total
        assert_eq!(jaccard_similarity("a b c", "b c d"), 0.5);
    }

    #[test]
    fn test_disjoint_and_empty() {
        assert_eq!(jaccard_similarity("alpha beta", "gamma delta"), 0.0);
        assert_eq!(jaccard_similarity("", ""), 0.0);
        assert_eq!(jaccard_similarity("alpha", ""), 0.0);
    }

    #[test]
    fn test_duplicate_words_count_once() {
        assert_eq!(jaccard_similarity("echo echo echo", "echo"), 1.0);
    }
}
