//! Maximal marginal relevance over lexical similarity.

use std::collections::HashSet;

use crate::similarity::{jaccard, word_set};
use crate::types::RetrievalResult;

/// Greedy MMR selection.
///
/// The first candidate is taken as-is. Each round then picks the remaining
/// candidate maximising `lambda * relevance - (1 - lambda) * max_sim`, where
/// `max_sim` is its highest Jaccard similarity to anything already selected.
/// Ties go to the candidate earliest in the remaining list. Stops at `cap`
/// results (at least one).
pub fn diversity_rerank(results: Vec<RetrievalResult>, lambda: f32, cap: usize) -> Vec<RetrievalResult> {
    if results.is_empty() {
        return results;
    }

    let cap = cap.max(1);
    let mut remaining: Vec<(RetrievalResult, HashSet<String>)> = results
        .into_iter()
        .map(|result| {
            let words = word_set(&result.content);
            (result, words)
        })
        .collect();

    let mut selected = vec![remaining.remove(0)];

    while !remaining.is_empty() && selected.len() < cap {
        let mut best_index = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (index, (candidate, words)) in remaining.iter().enumerate() {
            let max_similarity = selected
                .iter()
                .map(|(_, chosen)| jaccard(words, chosen))
                .fold(0.0_f32, f32::max);

            let score = lambda * candidate.relevance() - (1.0 - lambda) * max_similarity;
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }

        selected.push(remaining.remove(best_index));
    }

    tracing::debug!("Diversity rerank kept {} result(s)", selected.len());
    selected.into_iter().map(|(result, _)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn result(id: &str, content: &str, score: f32) -> RetrievalResult {
        RetrievalResult::new(id, content, score)
    }

    fn ids(results: &[RetrievalResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_never_exceeds_cap() {
        for m in [0usize, 1, 5, 10, 11, 25] {
            let input: Vec<_> = (0..m)
                .map(|i| result(&format!("r{}", i), &format!("doc {} words", i), 0.9))
                .collect();

            let output = diversity_rerank(input, 0.5, 10);

            assert_eq!(output.len(), m.min(10));
            let unique: HashSet<_> = output.iter().map(|r| r.id.clone()).collect();
            assert_eq!(unique.len(), output.len());
        }
    }

    #[test]
    fn test_first_candidate_always_selected() {
        let output = diversity_rerank(
            vec![result("low", "alpha", 0.1), result("high", "beta", 0.99)],
            0.5,
            10,
        );
        assert_eq!(output[0].id, "low");
    }

    #[test]
    fn test_penalises_redundant_content() {
        let output = diversity_rerank(
            vec![
                result("a", "rust async runtime tokio", 0.9),
                result("b", "rust async runtime tokio", 0.85),
                result("c", "database connection pooling", 0.6),
            ],
            0.5,
            10,
        );

        // b duplicates a: 0.5*0.85 - 0.5*1.0 < 0.5*0.6 - 0
        assert_eq!(ids(&output), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_ties_pick_earliest_remaining() {
        let output = diversity_rerank(
            vec![
                result("first", "x", 0.5),
                result("second", "y", 0.5),
                result("third", "z", 0.5),
            ],
            0.5,
            10,
        );
        assert_eq!(ids(&output), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_lambda_one_is_pure_relevance() {
        let output = diversity_rerank(
            vec![
                result("a", "same words", 0.9),
                result("b", "same words", 0.8),
                result("c", "other text", 0.3),
            ],
            1.0,
            10,
        );
        assert_eq!(ids(&output), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_percent_scores_are_normalised() {
        let output = diversity_rerank(
            vec![
                result("a", "one", 90.0),
                result("b", "two", 20.0),
                result("c", "three", 0.5),
            ],
            0.5,
            10,
        );
        assert_eq!(ids(&output), vec!["a", "c", "b"]);
    }
}
