use crate::error::Result;
use crate::types::{DocumentType, RankedChunk, RuleDocument};

/// Ranks rule fragments against a document. Implementations perform no I/O
/// and keep no state between calls that could change the result.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, document_text: &str, rules: &[RuleDocument], k: usize) -> Result<Vec<RankedChunk>>;
}

/// Assigns a [`DocumentType`] to extracted document text.
pub trait DocumentClassifier: Send + Sync {
    fn classify(&self, document_text: &str) -> DocumentType;
}
