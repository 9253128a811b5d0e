//! Bounded memo of `retrieve` results, keyed by an xxHash64 digest of the
//! document text, the rule ids and texts, and `k`. The least recently used
//! entry is evicted first. The wrapped retriever must be deterministic.

use lru::LruCache;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use tracing::trace;
use twox_hash::XxHash64;

use tradecheck_core::error::Result;
use tradecheck_core::traits::Retriever;
use tradecheck_core::types::{RankedChunk, RuleDocument};

pub struct CachedRetriever<R> where R: Retriever {
    inner: R,
    /// `None` when built with capacity 0: every call goes to `inner`.
    cache: Option<Mutex<LruCache<u64, Vec<RankedChunk>>>>,
}

impl<R> CachedRetriever<R> where R: Retriever {
    pub fn new(inner: R, capacity: usize) -> Self {
        let cache = NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap)));
        Self { inner, cache }
    }

    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

impl<R> Retriever for CachedRetriever<R> where R: Retriever {
    fn retrieve(&self, document_text: &str, rules: &[RuleDocument], k: usize) -> Result<Vec<RankedChunk>> {
        let Some(cache) = &self.cache else {
            return self.inner.retrieve(document_text, rules, k);
        };
        let key = cache_key(document_text, rules, k);
        if let Some(hit) = cache.lock().unwrap_or_else(PoisonError::into_inner).get(&key) {
            trace!(key, "retrieval cache hit");
            return Ok(hit.clone());
        }

        let result = self.inner.retrieve(document_text, rules, k)?;
        cache.lock().unwrap_or_else(PoisonError::into_inner).put(key, result.clone());
        Ok(result)
    }
}

fn cache_key(document_text: &str, rules: &[RuleDocument], k: usize) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    let mut write_str = |s: &str| {
        hasher.write_usize(s.len());
        hasher.write(s.as_bytes());
    };
    write_str(document_text);
    for rule in rules {
        write_str(&rule.id);
        write_str(&rule.text);
    }
    hasher.write_usize(rules.len());
    hasher.write_usize(k);
    hasher.finish()
}
