//! TF-IDF over a corpus of chunks.
//!
//! - Vocabulary indices are assigned in order of first appearance while
//!   walking the corpus in chunk order, so they are stable for a given corpus.
//! - `idf(t) = ln((1 + N) / (1 + df(t))) + 1`, which is at least 1 for every
//!   vocabulary term.
//! - `tf` is the raw count by default, or the count divided by the text's
//!   token count under [`TermWeighting::LengthNormalized`].
//! - Queries are projected onto the fitted vocabulary; unseen terms are dropped.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use tradecheck_core::types::{Chunk, TermWeighting};

use crate::tokenize::tokenize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn len(&self) -> usize { self.terms.len() }
    pub fn is_empty(&self) -> bool { self.terms.is_empty() }
    pub fn index_of(&self, term: &str) -> Option<usize> { self.index.get(term).copied() }
    pub fn term(&self, index: usize) -> Option<&str> { self.terms.get(index).map(String::as_str) }
    pub fn terms(&self) -> &[String] { &self.terms }

    fn insert(&mut self, term: &str) -> usize {
        if let Some(&idx) = self.index.get(term) {
            return idx;
        }
        let idx = self.terms.len();
        self.terms.push(term.to_string());
        self.index.insert(term.to_string(), idx);
        idx
    }
}

/// Number of chunks containing each vocabulary term at least once, indexed
/// like the [`Vocabulary`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFrequencies {
    counts: Vec<usize>,
}

impl DocumentFrequencies {
    pub fn get(&self, index: usize) -> usize { self.counts.get(index).copied().unwrap_or(0) }
    pub fn len(&self) -> usize { self.counts.len() }
    pub fn is_empty(&self) -> bool { self.counts.is_empty() }
}

pub fn smoothed_idf(df: usize, corpus_size: usize) -> f64 {
    ((1.0 + corpus_size as f64) / (1.0 + df as f64)).ln() + 1.0
}

/// Sparse term-weight vector. Entries are sorted by index and never zero;
/// absent indices have weight 0. `dim` is the vocabulary size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn zero(dim: usize) -> Self { Self { dim, entries: Vec::new() } }

    pub fn dim(&self) -> usize { self.dim }
    pub fn entries(&self) -> &[(usize, f64)] { &self.entries }
    pub fn nnz(&self) -> usize { self.entries.len() }
    pub fn is_zero(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn norm(&self) -> f64 { self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt() }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut a, mut b) = (self.entries.iter().peekable(), other.entries.iter().peekable());
        let mut sum = 0.0;
        while let (Some(&&(ia, wa)), Some(&&(ib, wb))) = (a.peek(), b.peek()) {
            match ia.cmp(&ib) {
                std::cmp::Ordering::Less => { a.next(); }
                std::cmp::Ordering::Greater => { b.next(); }
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    a.next();
                    b.next();
                }
            }
        }
        sum
    }
}

/// The result of [`TfIdfVectorizer::fit`]: one vector per chunk, in chunk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FittedCorpus {
    pub vocabulary: Vocabulary,
    pub document_frequencies: DocumentFrequencies,
    pub vectors: Vec<SparseVector>,
    weighting: TermWeighting,
}

impl FittedCorpus {
    pub fn corpus_size(&self) -> usize { self.vectors.len() }

    /// Projects `text` onto this corpus' vocabulary and IDF weights.
    pub fn transform(&self, text: &str) -> SparseVector {
        TfIdfVectorizer::new(self.weighting).transform(text, &self.vocabulary, &self.document_frequencies, self.corpus_size())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TfIdfVectorizer {
    weighting: TermWeighting,
}

impl TfIdfVectorizer {
    pub fn new(weighting: TermWeighting) -> Self { Self { weighting } }

    pub fn weighting(&self) -> TermWeighting { self.weighting }

    pub fn fit(&self, chunks: &[Chunk]) -> FittedCorpus {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        self.fit_texts(&texts)
    }

    /// An empty corpus yields an empty vocabulary and no vectors.
    pub fn fit_texts<S: AsRef<str>>(&self, texts: &[S]) -> FittedCorpus {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t.as_ref())).collect();

        let mut vocabulary = Vocabulary::default();
        let mut counts: Vec<usize> = Vec::new();
        for tokens in &tokenized {
            let mut seen = HashSet::new();
            for token in tokens {
                let idx = vocabulary.insert(token);
                if idx == counts.len() {
                    counts.push(0);
                }
                if seen.insert(idx) {
                    counts[idx] += 1;
                }
            }
        }
        let document_frequencies = DocumentFrequencies { counts };

        let corpus_size = tokenized.len();
        let vectors = tokenized
            .iter()
            .map(|tokens| self.weigh(tokens, &vocabulary, &document_frequencies, corpus_size))
            .collect();
        debug!(chunks = corpus_size, vocabulary = vocabulary.len(), weighting = ?self.weighting, "fitted tf-idf model");

        FittedCorpus { vocabulary, document_frequencies, vectors, weighting: self.weighting }
    }

    /// Against an empty vocabulary the result is the zero vector.
    pub fn transform(
        &self,
        text: &str,
        vocabulary: &Vocabulary,
        document_frequencies: &DocumentFrequencies,
        corpus_size: usize,
    ) -> SparseVector {
        if vocabulary.is_empty() {
            return SparseVector::zero(0);
        }
        self.weigh(&tokenize(text), vocabulary, document_frequencies, corpus_size)
    }

    fn weigh(
        &self,
        tokens: &[String],
        vocabulary: &Vocabulary,
        document_frequencies: &DocumentFrequencies,
        corpus_size: usize,
    ) -> SparseVector {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for token in tokens {
            if let Some(idx) = vocabulary.index_of(token) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
        let length = tokens.len() as f64;
        let entries = counts
            .into_iter()
            .map(|(idx, count)| {
                let tf = match self.weighting {
                    TermWeighting::RawCount => count as f64,
                    TermWeighting::LengthNormalized => count as f64 / length,
                };
                (idx, tf * smoothed_idf(document_frequencies.get(idx), corpus_size))
            })
            .collect();
        SparseVector { dim: vocabulary.len(), entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-12 }

    #[test]
    fn vocabulary_follows_first_appearance() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["b a", "c a"]);
        assert_eq!(fitted.vocabulary.terms(), ["b", "a", "c"]);
        assert_eq!(fitted.vocabulary.index_of("c"), Some(2));
        assert_eq!(fitted.vocabulary.term(1), Some("a"));
    }

    #[test]
    fn document_frequency_counts_chunks_not_occurrences() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["fox fox fox", "fox dog", "cat"]);
        let v = &fitted.vocabulary;
        assert_eq!(fitted.document_frequencies.get(v.index_of("fox").unwrap()), 2);
        assert_eq!(fitted.document_frequencies.get(v.index_of("dog").unwrap()), 1);
        for idx in 0..v.len() {
            let df = fitted.document_frequencies.get(idx);
            assert!((1..=fitted.corpus_size()).contains(&df));
        }
    }

    #[test]
    fn raw_count_weights_use_smoothed_idf() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["fox fox dog", "dog"]);
        let fox = fitted.vocabulary.index_of("fox").unwrap();
        let dog = fitted.vocabulary.index_of("dog").unwrap();
        // N = 2; df(fox) = 1, df(dog) = 2.
        assert!(approx(fitted.vectors[0].get(fox), 2.0 * ((3.0f64 / 2.0).ln() + 1.0)));
        assert!(approx(fitted.vectors[0].get(dog), 1.0));
        assert!(approx(fitted.vectors[1].get(dog), 1.0));
        assert_eq!(fitted.vectors[1].get(fox), 0.0);
        assert_eq!(fitted.vectors[0].dim(), 2);
    }

    #[test]
    fn length_normalized_divides_by_token_count() {
        let fitted = TfIdfVectorizer::new(TermWeighting::LengthNormalized).fit_texts(&["fox fox dog", "dog"]);
        let dog = fitted.vocabulary.index_of("dog").unwrap();
        assert!(approx(fitted.vectors[0].get(dog), 1.0 / 3.0));
        assert!(approx(fitted.vectors[1].get(dog), 1.0));
    }

    #[test]
    fn transform_ignores_out_of_vocabulary_terms() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["quick brown fox", "slow green turtle"]);
        let q = fitted.transform("Quick, quick zebra!");
        assert_eq!(q.nnz(), 1);
        assert_eq!(q.dim(), fitted.vocabulary.len());
        let quick = fitted.vocabulary.index_of("quick").unwrap();
        assert!(approx(q.get(quick), 2.0 * ((3.0f64 / 2.0).ln() + 1.0)));
        assert!(fitted.transform("zebra yak").is_zero());
    }

    #[test]
    fn empty_corpus_is_not_an_error() {
        let fitted = TfIdfVectorizer::default().fit(&[]);
        assert!(fitted.vocabulary.is_empty());
        assert!(fitted.vectors.is_empty());
        assert!(fitted.transform("anything at all").is_zero());
    }

    #[test]
    fn fit_is_deterministic() {
        let texts = ["the carrier signs", "the master signs for the carrier", "agent of the master"];
        let a = TfIdfVectorizer::default().fit_texts(&texts);
        let b = TfIdfVectorizer::default().fit_texts(&texts);
        assert_eq!(a, b);
        assert_eq!(a.transform("carrier master"), b.transform("carrier master"));
    }

    #[test]
    fn dot_merges_sorted_entries() {
        let fitted = TfIdfVectorizer::default().fit_texts(&["a b c", "b c d"]);
        let (x, y) = (&fitted.vectors[0], &fitted.vectors[1]);
        let by_get: f64 = (0..fitted.vocabulary.len()).map(|i| x.get(i) * y.get(i)).sum();
        assert!(approx(x.dot(y), by_get));
        assert!(approx(x.dot(x), x.norm() * x.norm()));
    }
}
