//! tradecheck-retrieval
//!
//! Selects the rule fragments most similar to a trade document: chunk every
//! rule document, fit TF-IDF over the chunks, project the document onto that
//! vocabulary and rank by cosine similarity. Everything is rebuilt per call.

pub mod cache;
pub mod context;

pub use cache::CachedRetriever;
pub use context::RetrievalContext;

use tracing::debug;

use tradecheck_core::chunker::{Chunker, ChunkingConfig};
use tradecheck_core::config::RetrievalSettings;
use tradecheck_core::error::Result;
use tradecheck_core::traits::Retriever;
use tradecheck_core::types::{RankedChunk, RuleDocument, TermWeighting};
use tradecheck_text::{rank, TfIdfVectorizer};

#[derive(Debug, Clone)]
pub struct TfIdfRetriever {
    chunker: Chunker,
    vectorizer: TfIdfVectorizer,
}

impl TfIdfRetriever {
    pub fn new(chunking: ChunkingConfig, weighting: TermWeighting) -> Result<Self> {
        Ok(Self { chunker: Chunker::new(chunking)?, vectorizer: TfIdfVectorizer::new(weighting) })
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Result<Self> {
        Self::new(settings.chunking(), settings.term_weighting)
    }

    pub fn retrieve(&self, document_text: &str, rules: &[RuleDocument], k: usize) -> Result<Vec<RankedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let chunks = self.chunker.chunk_corpus(rules);
        let fitted = self.vectorizer.fit(&chunks);
        let query = fitted.transform(document_text);
        let ranked = rank(&query, &fitted.vectors, k);
        debug!(
            rules = rules.len(),
            chunks = chunks.len(),
            vocabulary = fitted.vocabulary.len(),
            query_terms = query.nnz(),
            returned = ranked.len(),
            "ranked rule chunks"
        );
        Ok(ranked
            .into_iter()
            .map(|r| RankedChunk { chunk: chunks[r.index].clone(), score: r.score })
            .collect())
    }
}

impl Retriever for TfIdfRetriever {
    fn retrieve(&self, document_text: &str, rules: &[RuleDocument], k: usize) -> Result<Vec<RankedChunk>> {
        Self::retrieve(self, document_text, rules, k)
    }
}

/// One-shot retrieval with default weighting and no overlap.
pub fn retrieve(document_text: &str, rules: &[RuleDocument], max_chunk_chars: usize, k: usize) -> Result<Vec<RankedChunk>> {
    TfIdfRetriever::new(ChunkingConfig { max_chars: max_chunk_chars, overlap_chars: 0 }, TermWeighting::default())?
        .retrieve(document_text, rules, k)
}
