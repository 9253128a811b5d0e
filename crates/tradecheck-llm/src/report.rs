//! Compliance report model, plus repair of the JSON that models return.
//!
//! Replies are often wrapped in Markdown fences, cut off at the token limit or
//! left with trailing commas. [`clean_reply`] strips fences and trims a
//! truncated body back to its last balanced object; [`parse_report`] tries the
//! body as-is and then a repaired copy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A single discrepancy or compliance. Fields the model adds beyond `rule`
/// and `finding` are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub finding: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Finding {
    pub fn new(rule: impl Into<String>, finding: impl Into<String>) -> Self {
        Self { rule: rule.into(), finding: finding.into(), extra: Map::new() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    #[serde(default)]
    pub document_name: String,
    #[serde(default)]
    pub discrepancies: Vec<Finding>,
    #[serde(default)]
    pub compliances: Vec<Finding>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentReport {
    pub fn empty(document_name: impl Into<String>) -> Self {
        Self { document_name: document_name.into(), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    #[serde(default)]
    pub compliance_report: Vec<DocumentReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ComplianceReport {
    /// An empty report for `document_name` that carries the failure.
    pub fn failed(document_name: &str, error: impl Into<String>, details: Option<String>, raw_response: Option<String>) -> Self {
        Self {
            compliance_report: vec![DocumentReport::empty(document_name)],
            error: Some(error.into()),
            details,
            raw_response,
        }
    }

    pub fn is_error(&self) -> bool { self.error.is_some() }

    pub fn discrepancy_count(&self) -> usize { self.compliance_report.iter().map(|r| r.discrepancies.len()).sum() }

    pub fn compliance_count(&self) -> usize { self.compliance_report.iter().map(|r| r.compliances.len()).sum() }
}

/// Combines per-shard reports into one report for `document_name`.
///
/// Only the first document entry of each shard counts. Findings are
/// de-duplicated by trimmed `(finding, rule)` and sorted by `(rule, finding)`.
pub fn merge_reports(document_name: &str, shards: impl IntoIterator<Item = ComplianceReport>) -> ComplianceReport {
    let mut discrepancies = Vec::new();
    let mut compliances = Vec::new();
    for shard in shards {
        if let Some(first) = shard.compliance_report.into_iter().next() {
            discrepancies.extend(first.discrepancies);
            compliances.extend(first.compliances);
        }
    }
    ComplianceReport {
        compliance_report: vec![DocumentReport {
            document_name: document_name.to_string(),
            discrepancies: dedupe_and_sort(discrepancies),
            compliances: dedupe_and_sort(compliances),
            extra: Map::new(),
        }],
        ..Default::default()
    }
}

fn dedupe_and_sort(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Finding> = findings
        .into_iter()
        .filter(|f| seen.insert((f.finding.trim().to_string(), f.rule.trim().to_string())))
        .collect();
    unique.sort_by(|a, b| (&a.rule, &a.finding).cmp(&(&b.rule, &b.finding)));
    unique
}

/// A model reply with fences removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedReply {
    pub body: String,
    /// The reply did not end in `}` or `]`.
    pub truncated: bool,
}

pub fn clean_reply(raw: &str) -> CleanedReply {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    let body = body.trim();

    let truncated = !(body.ends_with('}') || body.ends_with(']'));
    if !truncated {
        return CleanedReply { body: body.to_string(), truncated };
    }
    let body = match last_balanced_object_end(body) {
        Some(end) => &body[..end],
        None => body,
    };
    CleanedReply { body: body.to_string(), truncated }
}

/// Byte offset just past the last `}` that closes a top-level object.
fn last_balanced_object_end(body: &str) -> Option<usize> {
    let mut depth: i64 = 0;
    let mut last = None;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    last = Some(i + 1);
                }
            }
            _ => {}
        }
    }
    last
}

/// Parses `body`, falling back to [`repair`] when it is not valid JSON.
/// The error returned is the one from the unrepaired body.
pub fn parse_report(body: &str) -> Result<ComplianceReport, serde_json::Error> {
    match serde_json::from_str(body) {
        Ok(report) => Ok(report),
        Err(original) => serde_json::from_str(&repair(body)).map_err(|_| original),
    }
}

/// Line-level fixes for almost-JSON: blank lines dropped, a dangling
/// unterminated string cut at its last quote, trailing commas before a
/// closing bracket removed and missing closing braces appended.
pub fn repair(body: &str) -> String {
    let lines: Vec<&str> = body.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut fixed: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let mut line = line.to_string();
        if line.matches('"').count() % 2 != 0 && !line.ends_with("\",") && !line.ends_with('"') {
            if let Some(q) = line.rfind('"').filter(|&q| q > 0) {
                line.truncate(q + 1);
            }
        }
        let closes_next = lines.get(i + 1).map_or(true, |next| next.starts_with('}') || next.starts_with(']'));
        if closes_next {
            if let Some(stripped) = line.strip_suffix(',') {
                line = stripped.to_string();
            }
        }
        fixed.push(line);
    }
    let mut out = fixed.join("\n");
    if !out.trim_end().ends_with('}') {
        let open = out.matches('{').count().saturating_sub(out.matches('}').count());
        out.push_str(&"}".repeat(open));
    }
    out
}
