use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::{ChatMessage, CompletionClient, CompletionError, CompletionOptions};

/// A queued reply for [`ScriptedClient`]
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Fail the call with `CompletionError::Network`
    Fail(String),
}

/// Completion client that replays queued replies in order and records every call.
///
/// Used by tests. When the queue runs dry it answers with the fallback text (if set) or fails with `EmptyResponse`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedClient {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    fallback: Option<String>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.push(ScriptedReply::Text(text.into()));
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(ScriptedReply::Fail(message.into()));
        self
    }

    /// Reply used once the queue is exhausted
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(reply);
        }
    }

    /// Every message list passed to `generate`, oldest first
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Fail(message)) => Err(CompletionError::Network(message)),
            None => self.fallback.clone().ok_or(CompletionError::EmptyResponse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order_and_records_calls() {
        let client = ScriptedClient::new()
            .with_reply("first")
            .with_failure("boom")
            .with_fallback("again");
        let options = CompletionOptions::default();

        let msgs = [ChatMessage::user("hello")];
        assert_eq!(client.generate(&msgs, &options).await.unwrap(), "first");
        assert!(matches!(
            client.generate(&msgs, &options).await,
            Err(CompletionError::Network(_))
        ));
        assert_eq!(client.generate(&msgs, &options).await.unwrap(), "again");
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.calls()[0][0].content, "hello");
    }

    #[tokio::test]
    async fn test_exhausted_without_fallback_is_empty_response() {
        let client = ScriptedClient::new();
        let result = client
            .generate(&[ChatMessage::user("x")], &CompletionOptions::default())
            .await;
        assert!(matches!(result, Err(CompletionError::EmptyResponse)));
    }
}
