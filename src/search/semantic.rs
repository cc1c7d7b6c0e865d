//! Semantic reranker (§4.5): pure cosine-similarity scoring over a
//! caller-supplied candidate set, no I/O.

use crate::cluster::cosine_similarity;
use crate::store::PassageId;

/// A candidate's cosine similarity to the query vector, in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct SemanticCandidate {
    pub passage_id: PassageId,
    pub cosine_score: f32,
}

/// Score every `(passage_id, vector)` pair against `query_vector`, sorted
/// descending by cosine score. Candidates without an embedding are simply
/// absent from `candidates` — the caller decides that, not this function.
pub fn rerank(candidates: &[(PassageId, Vec<f32>)], query_vector: &[f32]) -> Vec<SemanticCandidate> {
    let mut scored: Vec<SemanticCandidate> = candidates
        .iter()
        .map(|(id, vec)| SemanticCandidate {
            passage_id: *id,
            cosine_score: cosine_similarity(vec, query_vector),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.cosine_score
            .partial_cmp(&a.cosine_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_candidates_yield_empty_result() {
        assert!(rerank(&[], &[1.0, 0.0]).is_empty());
    }

    #[test]
    fn sorts_descending_by_cosine_score() {
        let candidates = vec![
            (0, vec![0.0, 1.0]),
            (1, vec![1.0, 0.0]),
            (2, vec![0.71, 0.71]),
        ];
        let result = rerank(&candidates, &[1.0, 0.0]);
        assert_eq!(result[0].passage_id, 1);
        assert_eq!(result[1].passage_id, 2);
        assert_eq!(result[2].passage_id, 0);
    }

    #[test]
    fn orthogonal_vectors_score_near_zero() {
        let candidates = vec![(0, vec![0.0, 1.0, 0.0])];
        let result = rerank(&candidates, &[1.0, 0.0, 0.0]);
        assert!(result[0].cosine_score.abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_negative_one() {
        let candidates = vec![(0, vec![-1.0, 0.0])];
        let result = rerank(&candidates, &[1.0, 0.0]);
        assert!((result[0].cosine_score + 1.0).abs() < 1e-6);
    }
}
