//! tradecheck-llm
//!
//! The LLM side of compliance checking: chat-completion providers with
//! ordered fallback, prompt assembly from retrieved rule fragments, report
//! parsing and repair, sharded analysis and model-assisted document-type
//! detection.

pub mod analyze;
pub mod chat;
pub mod classify;
pub mod error;
pub mod fallback;
pub mod prompt;
pub mod provider;
pub mod report;

pub use analyze::{Analyzer, TradeDocument};
pub use chat::{ChatCompletionsProvider, LlmSettings, ProviderSettings};
pub use classify::LlmClassifier;
pub use error::ProviderError;
pub use fallback::FallbackChain;
pub use prompt::PromptBuilder;
pub use provider::{ChatMessage, CompletionProvider, CompletionRequest, Role};
pub use report::{ComplianceReport, DocumentReport, Finding};
