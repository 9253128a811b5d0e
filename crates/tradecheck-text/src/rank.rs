use crate::vectorizer::SparseVector;

/// A corpus position and its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranking {
    pub index: usize,
    pub score: f64,
}

/// Cosine of the angle between `a` and `b`, 0 when either has zero magnitude.
/// Weights are non-negative, so the result lies in `[0, 1]`.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denominator = a.norm() * b.norm();
    if denominator == 0.0 {
        return 0.0;
    }
    (a.dot(b) / denominator).clamp(0.0, 1.0)
}

/// Top `k` corpus positions by descending similarity. Equal scores keep
/// corpus order. `k == 0` gives an empty result; `k` beyond the corpus size
/// ranks the whole corpus.
pub fn rank(query: &SparseVector, corpus: &[SparseVector], k: usize) -> Vec<Ranking> {
    if k == 0 {
        return Vec::new();
    }
    let mut scored: Vec<Ranking> = corpus
        .iter()
        .enumerate()
        .map(|(index, v)| Ranking { index, score: cosine_similarity(query, v) })
        .collect();
    // stable: ties stay in corpus order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::TfIdfVectorizer;

    #[test]
    fn zero_vector_scores_zero() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["a b", "c"]);
        let zero = SparseVector::zero(fitted.vocabulary.len());
        assert_eq!(cosine_similarity(&zero, &fitted.vectors[0]), 0.0);
        assert_eq!(cosine_similarity(&fitted.vectors[0], &zero), 0.0);
    }

    #[test]
    fn identical_vectors_score_one() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["port of loading", "port of discharge"]);
        let s = cosine_similarity(&fitted.vectors[0], &fitted.vectors[0]);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_corpus_order_and_k_bounds() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["x", "y", "z", "x y"]);
        let query = fitted.transform("unrelated");
        let all = rank(&query, &fitted.vectors, 10);
        assert_eq!(all.iter().map(|r| r.index).collect::<Vec<_>>(), [0, 1, 2, 3]);
        assert!(all.iter().all(|r| r.score == 0.0));
        assert_eq!(rank(&query, &fitted.vectors, 2).len(), 2);
        assert!(rank(&query, &fitted.vectors, 0).is_empty());
    }

    #[test]
    fn scores_are_non_increasing() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["a", "a b", "b c", "a a b", "d"]);
        let query = fitted.transform("a b");
        let ranked = rank(&query, &fitted.vectors, 5);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked.last().unwrap().index, 4);
    }
}
