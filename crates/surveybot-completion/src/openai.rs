use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{ChatMessage, CompletionClient, CompletionError, CompletionOptions};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Retries on transient failures (network, timeout, 429, 5xx)
    pub max_retries: u32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }

    /// Read the API key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, CompletionError> {
        let key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| CompletionError::Config("OPENAI_API_KEY is not set".to_string()))?;
        if key.trim().is_empty() {
            return Err(CompletionError::Config("OPENAI_API_KEY is empty".to_string()));
        }
        Ok(Self::new(key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Chat completions client for OpenAI and API-compatible servers
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
    name: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Config(e.to_string()))?;
        let name = format!("openai:{}", config.model);

        Ok(Self {
            config,
            client,
            name,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn build_request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: &CompletionOptions,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            n: 1,
        }
    }

    async fn send_once(&self, request: &ChatRequest<'_>) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.config.timeout)
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    CompletionError::Authentication
                }
                StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
                _ => CompletionError::Api {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Network(format!("Invalid response body: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let request = self.build_request(messages, options);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            match self.send_once(&request).await {
                Ok(text) => {
                    debug!(
                        model = %self.config.model,
                        attempt,
                        reply_len = text.len(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Completion received"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "Transient completion failure, retrying");
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

const MAX_BACKOFF_SHIFT: u32 = 6;

/// Exponential backoff starting at 500ms, capped at 16s
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(250u64 << attempt.min(MAX_BACKOFF_SHIFT))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    n: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let client = OpenAiClient::new(
            OpenAiConfig::new("sk-test")
                .with_model("gpt-4o-mini")
                .with_base_url("http://localhost:9999/v1/"),
        )
        .unwrap();

        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let options = CompletionOptions::default().with_max_tokens(64);
        let request = client.build_request(&messages, &options);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(client.completions_url(), "http://localhost:9999/v1/chat/completions");
        assert_eq!(client.name(), "openai:gpt-4o-mini");
    }

    #[test]
    fn test_retry_backoff_is_capped() {
        assert_eq!(retry_backoff(1), Duration::from_millis(500));
        assert_eq!(retry_backoff(3), Duration::from_millis(2000));
        assert_eq!(retry_backoff(6), Duration::from_secs(16));
        assert_eq!(retry_backoff(64), Duration::from_secs(16));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(16));
    }

    #[test]
    fn test_response_parsing_tolerates_missing_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_transient_classification() {
        assert!(CompletionError::RateLimited.is_transient());
        assert!(CompletionError::Api {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!CompletionError::Authentication.is_transient());
        assert!(!CompletionError::Api {
            status: 400,
            body: String::new()
        }
        .is_transient());
    }
}
