use async_trait::async_trait;
use tracing::{debug, warn};

use crate::chat::{ChatCompletionsProvider, LlmSettings};
use crate::error::ProviderError;
use crate::provider::{CompletionProvider, CompletionRequest};

/// Providers tried in order until one answers. Only the first sees the
/// request's `primary_timeout`.
pub struct FallbackChain {
    providers: Vec<Box<dyn CompletionProvider>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Box<dyn CompletionProvider>>) -> Self { Self { providers } }

    /// Primary then secondary, each reading its key from the environment.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ProviderError> {
        let providers = settings
            .providers()
            .map(|s| Ok(Box::new(ChatCompletionsProvider::from_env(s.clone())?) as Box<dyn CompletionProvider>))
            .collect::<Result<Vec<_>, ProviderError>>()?;
        Ok(Self::new(providers))
    }

    pub fn len(&self) -> usize { self.providers.len() }

    pub fn is_empty(&self) -> bool { self.providers.is_empty() }
}

#[async_trait]
impl CompletionProvider for FallbackChain {
    fn name(&self) -> &str { "fallback" }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut failures = Vec::with_capacity(self.providers.len());
        let fallback_request = request.for_fallback();
        for (i, provider) in self.providers.iter().enumerate() {
            let request = if i == 0 { request } else { &fallback_request };
            match provider.complete(request).await {
                Ok(text) => {
                    debug!(provider = provider.name(), chars = text.len(), "completion succeeded");
                    return Ok(text);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(provider = provider.name(), error = %e, "provider failed, trying next");
                    failures.push((provider.name().to_string(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::AllProvidersFailed(failures))
    }
}
