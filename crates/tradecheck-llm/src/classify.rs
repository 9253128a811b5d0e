//! Document-type detection: the keyword heuristic first, then the LLM on
//! samples of the document when the heuristic is unsure.

use lru::LruCache;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use twox_hash::XxHash64;

use tradecheck_core::traits::DocumentClassifier;
use tradecheck_core::types::DocumentType;

use crate::prompt::DOCUMENT_TYPE_PROMPT;
use crate::provider::{ChatMessage, CompletionProvider, CompletionRequest};

const SAMPLE_CHARS: usize = 1500;
const FINAL_SAMPLE_CHARS: usize = 2000;
const CLASSIFY_TOKENS: u32 = 32;
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(8);
const FINAL_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

pub struct LlmClassifier<C, P> {
    heuristic: C,
    provider: P,
    system_prompt: String,
    cache: Mutex<LruCache<u64, DocumentType>>,
}

impl<C, P> LlmClassifier<C, P>
where
    C: DocumentClassifier,
    P: CompletionProvider,
{
    pub fn new(heuristic: C, provider: P) -> Self {
        Self {
            heuristic,
            provider,
            system_prompt: DOCUMENT_TYPE_PROMPT.to_string(),
            cache: Mutex::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    /// Caps how many document types are remembered.
    pub fn with_cache_capacity(self, capacity: NonZeroUsize) -> Self {
        Self { cache: Mutex::new(LruCache::new(capacity)), ..self }
    }

    pub fn cached_len(&self) -> usize { self.cache.lock().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Known types are cached per document content; `Unknown` is not.
    pub async fn classify(&self, document_text: &str) -> DocumentType {
        let key = content_hash(document_text);
        if let Some(cached) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return *cached;
        }

        let mut detected = self.heuristic.classify(document_text);
        if detected.is_known() {
            debug!(%detected, "heuristic classification");
        } else {
            detected = self.ask_model(document_text).await;
        }
        if detected.is_known() {
            self.cache.lock().unwrap_or_else(PoisonError::into_inner).put(key, detected);
        }
        detected
    }

    async fn ask_model(&self, document_text: &str) -> DocumentType {
        for (i, sample) in samples(document_text).iter().enumerate() {
            if let Some(doc_type) = self.ask(sample, SAMPLE_TIMEOUT).await {
                info!(%doc_type, sample = i + 1, "model classification");
                return doc_type;
            }
        }
        let truncated = format!("FULL DOCUMENT SAMPLE:\n{}", char_slice(document_text, 0, FINAL_SAMPLE_CHARS));
        match self.ask(&truncated, FINAL_TIMEOUT).await {
            Some(doc_type) => {
                info!(%doc_type, "model classification from truncated document");
                doc_type
            }
            None => DocumentType::Unknown,
        }
    }

    /// A known type named by the model, or `None` for anything else.
    async fn ask(&self, sample: &str, timeout: Duration) -> Option<DocumentType> {
        let request = CompletionRequest::new(
            vec![ChatMessage::system(self.system_prompt.clone()), ChatMessage::user(sample)],
            CLASSIFY_TOKENS,
        )
        .with_primary_timeout(timeout);
        match self.provider.complete(&request).await {
            Ok(reply) => match reply.trim().parse::<DocumentType>() {
                Ok(doc_type) if doc_type.is_known() => Some(doc_type),
                _ => {
                    debug!(reply = %reply.trim(), "model reply is not a known type");
                    None
                }
            },
            Err(e) => {
                debug!(error = %e, "classification request failed");
                None
            }
        }
    }
}

/// Header and footer samples above 1500 chars, plus a middle sample above
/// 3000; shorter documents go whole.
fn samples(text: &str) -> Vec<String> {
    let len = text.chars().count();
    let mut samples = Vec::new();
    if len > SAMPLE_CHARS {
        samples.push(format!("HEADER SAMPLE:\n{}", char_slice(text, 0, SAMPLE_CHARS)));
    }
    if len > 2 * SAMPLE_CHARS {
        let mid = len / 2;
        samples.push(format!("MIDDLE SAMPLE:\n{}", char_slice(text, mid - SAMPLE_CHARS / 2, mid + SAMPLE_CHARS / 2)));
    }
    if len > SAMPLE_CHARS {
        samples.push(format!("FOOTER SAMPLE:\n{}", char_slice(text, len - SAMPLE_CHARS, len)));
    }
    if samples.is_empty() {
        samples.push(format!("FULL DOCUMENT:\n{text}"));
    }
    samples
}

/// Characters `start..end` of `text`, clamped to its length.
fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |n: usize| text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
    let (start, end) = (byte_at(start), byte_at(end));
    &text[start..end.max(start)]
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(text.as_bytes());
    hasher.finish()
}
