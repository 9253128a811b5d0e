//! Turns ranked rule fragments and a trade document into chat messages.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use tradecheck_core::config::PromptSettings;
use tradecheck_core::types::RankedChunk;

use crate::provider::ChatMessage;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a documentary credit checker. Examine the document in <USER_DOCUMENT> against the \
rules in <RULES_TEXT> and reply with JSON only, in this shape:
{\"compliance_report\": [{\"document_name\": \"...\", \
\"discrepancies\": [{\"rule\": \"...\", \"finding\": \"...\"}], \
\"compliances\": [{\"rule\": \"...\", \"finding\": \"...\"}]}]}
Cite the rule each finding relies on. Do not invent rules that are not in <RULES_TEXT>.";

pub const DOCUMENT_TYPE_PROMPT: &str = "\
Classify the trade document sample. Answer with exactly one of: BILL OF LADING, \
COMMERCIAL INVOICE, PACKING LIST, DHL RECEIPT, SHIPMENT ADVICE, COVERING SCHEDULE, UNKNOWN. \
No other words.";

/// Fragment texts in rank order, each distinct trimmed text kept once.
pub fn dedupe_fragments(fragments: &[RankedChunk]) -> Vec<String> {
    let mut seen = HashSet::new();
    fragments
        .iter()
        .map(RankedChunk::text)
        .filter(|text| seen.insert(text.trim()))
        .map(str::to_string)
        .collect()
}

/// Blank-line join with every whitespace run collapsed to one space.
pub fn join_fragments<S: AsRef<str>>(fragments: &[S]) -> String {
    fragments
        .iter()
        .flat_map(|f| f.as_ref().split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct source ids in rank order, used as the rules label.
pub fn rule_sources(fragments: &[RankedChunk]) -> String {
    let mut seen = HashSet::new();
    fragments
        .iter()
        .map(RankedChunk::source_id)
        .filter(|id| seen.insert(*id))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn load_system_prompt(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    settings: PromptSettings,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, settings: PromptSettings) -> Self {
        Self { system_prompt: system_prompt.into(), settings }
    }

    pub fn settings(&self) -> &PromptSettings { &self.settings }

    /// Joined rules text, cut back to the first `fallback_fragments`
    /// fragments when it exceeds `max_rules_chars`.
    pub fn rules_text(&self, fragments: &[String]) -> String {
        let joined = join_fragments(fragments);
        let chars = joined.chars().count();
        if chars <= self.settings.max_rules_chars {
            return joined;
        }
        let keep = self.settings.fallback_fragments.min(fragments.len());
        let reduced = join_fragments(&fragments[..keep]);
        debug!(chars, reduced_chars = reduced.chars().count(), keep, "rules text over budget");
        reduced
    }

    pub fn messages(&self, rules_label: &str, rules_text: &str, document_name: &str, document_text: &str) -> Vec<ChatMessage> {
        let user = format!(
            "<RULES_TEXT FILENAME='{rules_label}'>\n{rules_text}\n</RULES_TEXT>\n\n\
             <USER_DOCUMENT>\n--- DOCUMENT TO ANALYZE: {document_name} ---\n{document_text}\n</USER_DOCUMENT>"
        );
        vec![ChatMessage::system(self.system_prompt.clone()), ChatMessage::user(user)]
    }
}
