//! OpenAI-compatible `chat/completions` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

use tradecheck_core::config::Config;

use crate::error::ProviderError;
use crate::provider::{CompletionProvider, CompletionRequest};

/// Connection details for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Send `response_format: json_object` when the request asks for JSON.
    pub json_mode: bool,
}

impl ProviderSettings {
    pub fn glm() -> Self {
        Self {
            name: "glm".into(),
            endpoint: "https://api.z.ai/api/paas/v4/chat/completions".into(),
            model: "glm-4.5-flash".into(),
            api_key_env: "GLM_API_KEY".into(),
            timeout_secs: 12,
            json_mode: false,
        }
    }

    pub fn groq() -> Self {
        Self {
            name: "groq".into(),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".into(),
            model: "llama3-70b-8192".into(),
            api_key_env: "GROQ_API_KEY".into(),
            timeout_secs: 60,
            json_mode: true,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self { Self::glm() }
}

/// The `llm` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub primary: ProviderSettings,
    pub secondary: Option<ProviderSettings>,
}

impl Default for LlmSettings {
    fn default() -> Self { Self { primary: ProviderSettings::glm(), secondary: Some(ProviderSettings::groq()) } }
}

impl LlmSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> { config.section("llm") }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderSettings> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }
}

pub struct ChatCompletionsProvider {
    settings: ProviderSettings,
    api_key: Option<String>,
    client: Client,
}

impl ChatCompletionsProvider {
    /// Reads the key from `settings.api_key_env`. A missing or placeholder key
    /// is not an error here; every call then fails with `NotConfigured`.
    pub fn from_env(settings: ProviderSettings) -> Result<Self, ProviderError> {
        let api_key = env::var(&settings.api_key_env).ok();
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: ProviderSettings, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProviderError::InvalidRequest(format!("{}: cannot build HTTP client: {e}", settings.name)))?;
        let api_key = api_key.filter(|k| !is_placeholder_key(k));
        info!(
            provider = %settings.name,
            model = %settings.model,
            configured = api_key.is_some(),
            "chat completions provider ready"
        );
        Ok(Self { settings, api_key, client })
    }

    pub fn settings(&self) -> &ProviderSettings { &self.settings }

    fn body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.settings.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if self.settings.json_mode && request.wants_json() {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsProvider {
    fn timeout_for(&self, request: &CompletionRequest) -> Duration {
        request.primary_timeout.unwrap_or(Duration::from_secs(self.settings.timeout_secs))
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str { &self.settings.name }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let provider = self.settings.name.clone();
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::NotConfigured {
                provider,
                reason: format!("{} is not set", self.settings.api_key_env),
            });
        };
        if request.max_tokens == 0 {
            return Err(ProviderError::InvalidRequest("max_tokens must be > 0".into()));
        }

        let timeout = self.timeout_for(request);
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|source| classify_transport(&provider, source))?;

        let status = response.status();
        let text = response.text().await.map_err(|source| classify_transport(&provider, source))?;
        if !status.is_success() {
            return Err(ProviderError::Status { provider, status: status.as_u16(), body: preview(&text, 300) });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| ProviderError::MalformedResponse {
            provider: provider.clone(),
            detail: format!("{e}; body: {}", preview(&text, 300)),
        })?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(ProviderError::MalformedResponse { provider, detail: "no choices".into() });
        };
        debug!(provider = %provider, finish_reason = ?choice.finish_reason, "completion received");
        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(ProviderError::EmptyResponse { provider }),
        }
    }
}

fn classify_transport(provider: &str, source: reqwest::Error) -> ProviderError {
    if source.is_timeout() {
        ProviderError::Timeout { provider: provider.to_string() }
    } else {
        ProviderError::Transport { provider: provider.to_string(), source }
    }
}

/// Keys such as `your_glm_api_key_here` left over from a sample env file.
fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    key.is_empty() || (key.starts_with("your_") && key.ends_with("_here"))
}

fn preview(text: &str, max_chars: usize) -> String { text.chars().take(max_chars).collect() }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatMessage;

    #[test]
    fn placeholder_keys_are_not_configured() {
        assert!(is_placeholder_key("your_glm_api_key_here"));
        assert!(is_placeholder_key("  "));
        assert!(!is_placeholder_key("sk-live-123"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let provider = ChatCompletionsProvider::with_api_key(ProviderSettings::glm(), None).unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")], 16);
        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn json_mode_only_when_supported_and_requested() {
        let groq = ChatCompletionsProvider::with_api_key(ProviderSettings::groq(), Some("k".into())).unwrap();
        let glm = ChatCompletionsProvider::with_api_key(ProviderSettings::glm(), Some("k".into())).unwrap();
        let report = CompletionRequest::new(vec![ChatMessage::user("produce a json report")], 64);
        let plain = CompletionRequest::new(vec![ChatMessage::user("classify")], 64);

        assert_eq!(groq.body(&report)["response_format"]["type"], "json_object");
        assert!(groq.body(&plain).get("response_format").is_none());
        assert!(glm.body(&report).get("response_format").is_none());
        assert_eq!(glm.body(&plain)["model"], "glm-4.5-flash");
        assert_eq!(glm.body(&plain)["messages"][0]["role"], "user");
    }

    #[test]
    fn configured_timeout_applies_unless_primary_deadline_is_set() {
        let groq = ChatCompletionsProvider::with_api_key(ProviderSettings::groq(), Some("k".into())).unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::user("q")], 16).with_primary_timeout(Duration::from_secs(12));
        assert_eq!(groq.timeout_for(&request), Duration::from_secs(12));
        assert_eq!(groq.timeout_for(&request.for_fallback()), Duration::from_secs(60));
    }

    #[test]
    fn settings_section_defaults_and_overrides() {
        let config = Config::from_toml_str("[llm.primary]\nmodel = \"glm-4.5\"\n[llm.secondary]\ntimeout_secs = 30\n").unwrap();
        let settings = LlmSettings::from_config(&config).unwrap();
        assert_eq!(settings.primary.model, "glm-4.5");
        assert_eq!(settings.primary.api_key_env, "GLM_API_KEY");
        let secondary = settings.secondary.as_ref().unwrap();
        assert_eq!(secondary.timeout_secs, 30);
        assert_eq!(secondary.model, "llama3-70b-8192");
        assert_eq!(settings.providers().count(), 2);
    }
}
