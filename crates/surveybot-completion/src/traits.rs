use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ChatMessage;

/// Errors that can occur while requesting a completion
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication with the completion API failed")]
    Authentication,

    #[error("Rate limited by the completion API")]
    RateLimited,

    #[error("Completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Completion API returned no content")]
    EmptyResponse,

    #[error("Completion client configuration error: {0}")]
    Config(String),
}

impl CompletionError {
    /// Whether a retry of the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CompletionError::Network(_)
            | CompletionError::Timeout(_)
            | CompletionError::RateLimited => true,
            CompletionError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Sampling options for a single completion request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// The core abstraction over text-generation backends
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Human-readable name of the backend (e.g., "openai:gpt-4o")
    fn name(&self) -> &str;

    /// Generate a reply for the ordered, role-tagged messages
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}
