use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: Role::System, content: content.into() } }

    pub fn user(content: impl Into<String>) -> Self { Self { role: Role::User, content: content.into() } }
}

/// One chat completion call.
///
/// `primary_timeout` is a tighter deadline for the first provider asked, so a
/// slow primary fails over quickly. Providers reached through a fallback keep
/// their own configured timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub primary_timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self { messages, temperature: 0.0, max_tokens, primary_timeout: None }
    }

    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = Some(timeout);
        self
    }

    /// The same request as seen by a fallback provider.
    pub fn for_fallback(&self) -> Self { Self { primary_timeout: None, ..self.clone() } }

    /// Whether the conversation asks for structured output, which lets
    /// providers that support it switch on JSON mode.
    pub fn wants_json(&self) -> bool {
        self.messages.iter().any(|m| {
            let lower = m.content.to_lowercase();
            lower.contains("json") || lower.contains("compliance") || lower.contains("report")
        })
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The assistant's reply text. Never empty on success.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

#[async_trait]
impl<P> CompletionProvider for Box<P>
where
    P: CompletionProvider + ?Sized,
{
    fn name(&self) -> &str { (**self).name() }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        (**self).complete(request).await
    }
}
