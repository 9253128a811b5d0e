//! tradecheck-text
//!
//! Classical lexical retrieval primitives: a normalizing tokenizer, a TF-IDF
//! vectorizer over sparse vectors, a cosine-similarity ranker, and a
//! keyword-scoring document-type classifier.

pub mod detect;
pub mod rank;
pub mod tokenize;
pub mod vectorizer;

pub use detect::HeuristicClassifier;
pub use rank::{cosine_similarity, rank, Ranking};
pub use tokenize::{normalize, tokenize};
pub use vectorizer::{DocumentFrequencies, FittedCorpus, SparseVector, TfIdfVectorizer, Vocabulary};
