use tracing::{info, warn};

use tradecheck_core::config::RetrievalSettings;
use tradecheck_core::error::Result;
use tradecheck_core::rules::{RuleLibrary, RuleSelection};
use tradecheck_core::traits::Retriever;
use tradecheck_core::types::{DocumentType, RankedChunk, RuleDocument};

use crate::{CachedRetriever, TfIdfRetriever};

/// Everything needed to answer "which rule fragments matter for this
/// document": the loaded rule texts, which of them apply to each document
/// type, and the retriever that ranks them.
pub struct RetrievalContext {
    settings: RetrievalSettings,
    selection: RuleSelection,
    library: RuleLibrary,
    retriever: Box<dyn Retriever>,
}

impl RetrievalContext {
    /// Builds a TF-IDF retriever from `settings`, memoised when
    /// `cache_capacity` is non-zero.
    pub fn new(settings: RetrievalSettings, selection: RuleSelection, library: RuleLibrary) -> Result<Self> {
        let tfidf = TfIdfRetriever::from_settings(&settings)?;
        let retriever: Box<dyn Retriever> = if settings.cache_capacity > 0 {
            Box::new(CachedRetriever::new(tfidf, settings.cache_capacity))
        } else {
            Box::new(tfidf)
        };
        Ok(Self::with_retriever(settings, selection, library, retriever))
    }

    pub fn with_retriever(
        settings: RetrievalSettings,
        selection: RuleSelection,
        library: RuleLibrary,
        retriever: Box<dyn Retriever>,
    ) -> Self {
        let missing = library.missing(&selection);
        if !missing.is_empty() {
            warn!(?missing, "rule selection references files that were not loaded");
        }
        info!(rules = library.len(), top_k = settings.top_k, "retrieval context ready");
        Self { settings, selection, library, retriever }
    }

    pub fn settings(&self) -> &RetrievalSettings { &self.settings }

    pub fn selection(&self) -> &RuleSelection { &self.selection }

    pub fn library(&self) -> &RuleLibrary { &self.library }

    /// Rule documents that apply to `doc_type`, general rules first.
    pub fn rules_for(&self, doc_type: DocumentType) -> Vec<RuleDocument> {
        self.library.select(&self.selection.rule_ids_for(doc_type))
    }

    /// The configured `top_k` fragments for a document of `doc_type`.
    pub fn retrieve_for(&self, document_text: &str, doc_type: DocumentType) -> Result<Vec<RankedChunk>> {
        self.retrieve_top(document_text, doc_type, self.settings.top_k)
    }

    pub fn retrieve_top(&self, document_text: &str, doc_type: DocumentType, k: usize) -> Result<Vec<RankedChunk>> {
        let rules = self.rules_for(doc_type);
        if rules.is_empty() {
            warn!(%doc_type, "no rule documents selected");
        }
        self.retriever.retrieve(document_text, &rules, k)
    }
}
