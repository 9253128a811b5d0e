use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tradecheck_core::config::PromptSettings;
use tradecheck_core::types::{Chunk, DocumentType, RankedChunk};
use tradecheck_llm::{
    Analyzer, CompletionProvider, CompletionRequest, FallbackChain, LlmClassifier, PromptBuilder, ProviderError,
    TradeDocument,
};
use tradecheck_text::HeuristicClassifier;

/// Replies from a script, recording every request it sees.
struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<&str, ProviderError>>) -> Self {
        let mut replies: Vec<_> = replies.into_iter().map(|r| r.map(str::to_string)).collect();
        replies.reverse();
        Self { replies: Mutex::new(replies), seen: Mutex::new(Vec::new()) }
    }

    fn requests(&self) -> Vec<CompletionRequest> { self.seen.lock().unwrap().clone() }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str { "scripted" }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.seen.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(ProviderError::EmptyResponse { provider: "scripted".into() }))
    }
}

/// Lets a test keep a handle on a provider that a chain owns.
struct Shared(Arc<ScriptedProvider>);

#[async_trait]
impl CompletionProvider for Shared {
    fn name(&self) -> &str { self.0.name() }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        self.0.complete(request).await
    }
}

/// Answers every request with a one-finding report naming the first rule it was shown.
struct EchoProvider;

#[async_trait]
impl CompletionProvider for EchoProvider {
    fn name(&self) -> &str { "echo" }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let user = &request.messages[1].content;
        let rules = user.split("</RULES_TEXT>").next().unwrap_or_default();
        let first_rule = rules.lines().nth(1).unwrap_or_default().split(" rule").next().unwrap_or_default();
        Ok(format!(
            r#"{{"compliance_report": [{{"document_name": "bl.txt", "discrepancies": [{{"rule": "{first_rule}", "finding": "checked"}}, {{"rule": "shared", "finding": "duplicate"}}], "compliances": []}}]}}"#
        ))
    }
}

fn fragment(doc: &str, idx: usize, text: &str) -> RankedChunk {
    RankedChunk {
        chunk: Chunk {
            id: format!("{doc}:{idx}"),
            doc_id: doc.into(),
            content: text.into(),
            start: 0,
            end: text.len(),
            byte_start: 0,
            byte_end: text.len(),
            chunk_index: idx,
            total_chunks: 20,
        },
        score: 0.5,
    }
}

fn analyzer<P: CompletionProvider>(provider: P) -> Analyzer<P> {
    Analyzer::new(provider, PromptBuilder::new("Reply with a JSON compliance report.", PromptSettings::default()))
}

const REPORT: &str = r#"{"compliance_report": [{"document_name": "bl.txt", "discrepancies": [{"rule": "UCP 20", "finding": "carrier not named"}], "compliances": []}]}"#;

#[tokio::test]
async fn single_call_parses_fenced_reply() {
    let fenced = format!("```json\n{REPORT}\n```");
    let analyzer = analyzer(ScriptedProvider::new(vec![Ok(fenced.as_str())]));
    let doc = TradeDocument::new("bl.txt", "BILL OF LADING\nShipper: ACME");
    let report = analyzer.analyze(&doc, &[fragment("ucp.txt", 0, "A bill of lading must name the carrier.")]).await;

    assert!(!report.is_error());
    assert_eq!(report.compliance_report[0].discrepancies[0].rule, "UCP 20");

    let requests = analyzer.provider().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].max_tokens, 2048);
    assert_eq!(requests[0].primary_timeout, Some(Duration::from_secs(12)));
    let user = &requests[0].messages[1].content;
    assert!(user.starts_with("<RULES_TEXT FILENAME='ucp.txt'>\nA bill of lading must name the carrier.\n</RULES_TEXT>"));
    assert!(user.contains("--- DOCUMENT TO ANALYZE: bl.txt ---\nBILL OF LADING"));
}

#[tokio::test]
async fn truncated_reply_is_retried_with_double_budget() {
    let truncated = &REPORT[..REPORT.len() - 20];
    let analyzer = analyzer(ScriptedProvider::new(vec![Ok(truncated), Ok(REPORT)]));
    let report = analyzer.analyze(&TradeDocument::new("bl.txt", "text"), &[fragment("r", 0, "rule")]).await;

    assert!(!report.is_error());
    let budgets: Vec<_> = analyzer.provider().requests().iter().map(|r| r.max_tokens).collect();
    assert_eq!(budgets, [2048, 4096]);
}

#[tokio::test]
async fn provider_failure_then_garbage_gives_error_report() {
    let analyzer = analyzer(ScriptedProvider::new(vec![
        Err(ProviderError::AllProvidersFailed(vec![])),
        Ok("I cannot help with that."),
    ]));
    let report = analyzer.analyze(&TradeDocument::new("inv.txt", "text"), &[fragment("r", 0, "rule")]).await;

    assert_eq!(report.error.as_deref(), Some("LLM response was not valid JSON."));
    assert_eq!(report.raw_response.as_deref(), Some("I cannot help with that."));
    assert_eq!(report.compliance_report[0].document_name, "inv.txt");
    assert!(report.compliance_report[0].discrepancies.is_empty());
}

#[tokio::test]
async fn many_fragments_are_sharded_and_merged() {
    let fragments: Vec<_> = (0..10).map(|i| fragment("ucp.txt", i, &format!("r{i:02} rule text"))).collect();
    let report = analyzer(EchoProvider).analyze(&TradeDocument::new("bl.txt", "text"), &fragments).await;

    assert!(!report.is_error());
    let doc = &report.compliance_report[0];
    let rules: Vec<_> = doc.discrepancies.iter().map(|f| f.rule.as_str()).collect();
    // four shards of 3, 3, 3 and 1 fragments; the shared finding survives once
    assert_eq!(rules, ["r00", "r03", "r06", "r09", "shared"]);
}

#[tokio::test]
async fn duplicate_fragments_do_not_trigger_sharding() {
    let fragments: Vec<_> = (0..10).map(|i| fragment("ucp.txt", i, "same rule text")).collect();
    let analyzer = analyzer(ScriptedProvider::new(vec![Ok(REPORT)]));
    analyzer.analyze(&TradeDocument::new("bl.txt", "text"), &fragments).await;
    assert_eq!(analyzer.provider().requests().len(), 1);
}

#[tokio::test]
async fn fallback_chain_feeds_the_analyzer() {
    let providers: Vec<Box<dyn CompletionProvider>> = vec![
        Box::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout { provider: "glm".into() })])),
        Box::new(ScriptedProvider::new(vec![Ok(REPORT)])),
    ];
    let chain = FallbackChain::new(providers);
    let report = analyzer(chain).analyze(&TradeDocument::new("bl.txt", "text"), &[fragment("r", 0, "rule")]).await;
    assert!(!report.is_error());
    assert_eq!(report.discrepancy_count(), 1);
}

#[tokio::test]
async fn secondary_provider_is_not_held_to_the_primary_deadline() {
    let glm = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::Timeout { provider: "glm".into() })]));
    let groq = Arc::new(ScriptedProvider::new(vec![Ok(REPORT)]));
    let providers: Vec<Box<dyn CompletionProvider>> = vec![Box::new(Shared(glm.clone())), Box::new(Shared(groq.clone()))];
    let report = analyzer(FallbackChain::new(providers)).analyze(&TradeDocument::new("bl.txt", "text"), &[fragment("r", 0, "rule")]).await;

    assert!(!report.is_error());
    assert_eq!(glm.requests()[0].primary_timeout, Some(Duration::from_secs(12)));
    assert_eq!(groq.requests()[0].primary_timeout, None);
}

#[tokio::test]
async fn classifier_prefers_heuristic_and_caches() {
    let heuristic = HeuristicClassifier::new().unwrap();
    let classifier = LlmClassifier::new(heuristic, ScriptedProvider::new(vec![]));
    let bl = "BILL OF LADING\nShipper: ACME\nConsignee: To order\nPort of loading: Hamburg";
    assert_eq!(classifier.classify(bl).await, DocumentType::BillOfLading);
    assert_eq!(classifier.classify(bl).await, DocumentType::BillOfLading);
}

#[tokio::test]
async fn classifier_asks_model_when_heuristic_is_unsure() {
    let heuristic = HeuristicClassifier::new().unwrap();
    let provider = ScriptedProvider::new(vec![Ok("I think it is an invoice"), Ok(" packing list \n")]);
    let classifier = LlmClassifier::new(heuristic, provider);
    let text = "x".repeat(1600);

    assert_eq!(classifier.classify(&text).await, DocumentType::PackingList);
    assert_eq!(classifier.classify(&text).await, DocumentType::PackingList, "served from cache");
}

#[tokio::test]
async fn classifier_gives_up_with_unknown() {
    let heuristic = HeuristicClassifier::new().unwrap();
    let classifier = LlmClassifier::new(heuristic, ScriptedProvider::new(vec![Ok("UNKNOWN")]));
    assert_eq!(classifier.classify("nothing to see").await, DocumentType::Unknown);
}
