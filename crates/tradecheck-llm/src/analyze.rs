use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, info, warn};

use tradecheck_core::types::RankedChunk;

use crate::prompt::{dedupe_fragments, join_fragments, rule_sources, PromptBuilder};
use crate::provider::{ChatMessage, CompletionProvider, CompletionRequest};
use crate::report::{clean_reply, merge_reports, parse_report, ComplianceReport};

const SINGLE_CALL_TOKENS: u32 = 2048;
const SHARD_TOKENS: u32 = 1536;
const FRAGMENTS_PER_SHARD: usize = 3;
const PRIMARY_TIMEOUT: Duration = Duration::from_secs(12);

/// A trade document submitted for checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeDocument {
    pub name: String,
    pub text: String,
}

impl TradeDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// Checks a document against retrieved rule fragments with an LLM.
///
/// Small fragment sets go out in one call. From `shard_threshold` distinct
/// fragments on, they are split into at most `max_shards` groups of roughly
/// three, analysed concurrently and merged.
pub struct Analyzer<P> {
    provider: P,
    prompt: PromptBuilder,
}

impl<P> Analyzer<P>
where
    P: CompletionProvider,
{
    pub fn new(provider: P, prompt: PromptBuilder) -> Self { Self { provider, prompt } }

    pub fn provider(&self) -> &P { &self.provider }

    /// Never fails: provider or parse failures come back as an empty report
    /// with `error` set.
    pub async fn analyze(&self, document: &TradeDocument, fragments: &[RankedChunk]) -> ComplianceReport {
        let texts = dedupe_fragments(fragments);
        let label = rule_sources(fragments);
        let settings = self.prompt.settings();
        info!(document = %document.name, fragments = texts.len(), "analysing document");

        if texts.len() >= settings.shard_threshold {
            let shards = shard(&texts, settings.max_shards);
            debug!(shards = shards.len(), "analysing rule shards concurrently");
            let results = join_all(shards.iter().map(|group| {
                let messages = self.prompt.messages(&label, &join_fragments(group), &document.name, &document.text);
                self.call_with_retry(messages, &document.name, SHARD_TOKENS)
            }))
            .await;
            for failed in results.iter().filter(|r| r.is_error()) {
                warn!(document = %document.name, error = ?failed.error, "shard analysis failed");
            }
            return merge_reports(&document.name, results);
        }

        let rules_text = self.prompt.rules_text(&texts);
        let messages = self.prompt.messages(&label, &rules_text, &document.name, &document.text);
        self.call_with_retry(messages, &document.name, SINGLE_CALL_TOKENS).await
    }

    /// Two attempts; the second doubles the token budget. A truncated,
    /// failed or unparsable first reply triggers the second attempt.
    async fn call_with_retry(&self, messages: Vec<ChatMessage>, document_name: &str, initial_tokens: u32) -> ComplianceReport {
        let mut request = CompletionRequest::new(messages, initial_tokens).with_primary_timeout(PRIMARY_TIMEOUT);
        for attempt in 0..2 {
            let last = attempt == 1;
            let raw = match self.provider.complete(&request).await {
                Ok(raw) => raw,
                Err(e) if !last => {
                    warn!(document = %document_name, error = %e, "completion failed, retrying with a larger budget");
                    request.max_tokens = initial_tokens * 2;
                    continue;
                }
                Err(e) => {
                    return ComplianceReport::failed(document_name, "No LLM response.", Some(e.to_string()), None);
                }
            };

            let cleaned = clean_reply(&raw);
            if cleaned.truncated && !last {
                debug!(document = %document_name, max_tokens = request.max_tokens, "reply looks truncated");
                request.max_tokens = initial_tokens * 2;
                continue;
            }
            match parse_report(&cleaned.body) {
                Ok(report) => return report,
                Err(e) if !last => {
                    debug!(document = %document_name, error = %e, "reply is not valid JSON");
                    request.max_tokens = initial_tokens * 2;
                }
                Err(e) => {
                    return ComplianceReport::failed(
                        document_name,
                        "LLM response was not valid JSON.",
                        Some(e.to_string()),
                        Some(raw),
                    );
                }
            }
        }
        ComplianceReport::failed(document_name, "No LLM response.", None, None)
    }
}

/// `min(max_shards, ceil(n / 3))` contiguous groups of equal size, the last
/// possibly shorter.
fn shard(texts: &[String], max_shards: usize) -> Vec<&[String]> {
    if texts.is_empty() {
        return Vec::new();
    }
    let count = max_shards.max(1).min(texts.len().div_ceil(FRAGMENTS_PER_SHARD));
    let size = texts.len().div_ceil(count);
    texts.chunks(size).collect()
}
