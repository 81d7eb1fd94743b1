use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use surveybot_completion::{ChatMessage, CompletionClient, CompletionOptions};
use surveybot_documents::{DocumentContext, DocumentSource};

/// Reply sent when the completion call for a chatbot fails
pub const CHAT_FALLBACK_REPLY: &str = "Sorry, I couldn't process your request due to an API error.";

/// A free-form chatbot reachable through a share token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatbotProfile {
    pub id: String,
    pub name: String,
    pub token: String,
    /// Document references (URLs or paths) the bot speaks from
    #[serde(default)]
    pub documents: Vec<String>,
}

impl ChatbotProfile {
    fn system_prompt(&self, context: &DocumentContext) -> String {
        let mut prompt = format!("You are a chatbot named {}.", self.name);
        if !context.is_empty() {
            prompt.push_str(
                " Respond as if you are an expert of the documents contents. \
                 Do not quote the documents as if the ideas are not your own. \
                 Speak as though the contents of the document are fact and your own views. \
                 Here are the contents of the documents:\n",
            );
            prompt.push_str(context.text());
        }
        prompt
    }
}

/// Single-shot, document-grounded chatbot replies
pub struct ChatResponder<'a> {
    client: &'a dyn CompletionClient,
    documents: &'a dyn DocumentSource,
    options: CompletionOptions,
}

impl<'a> ChatResponder<'a> {
    pub fn new(client: &'a dyn CompletionClient, documents: &'a dyn DocumentSource) -> Self {
        Self {
            client,
            documents,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Answer one message. Upstream failures yield [`CHAT_FALLBACK_REPLY`].
    pub async fn respond(&self, profile: &ChatbotProfile, message: &str) -> String {
        let context = DocumentContext::build(self.documents, &profile.documents).await;
        info!(
            chatbot = %profile.name,
            documents = context.loaded(),
            skipped = context.skipped(),
            "Answering chat message"
        );

        let messages = [
            ChatMessage::system(profile.system_prompt(&context)),
            ChatMessage::user(message),
        ];

        match self.client.generate(&messages, &self.options).await {
            Ok(reply) if !reply.trim().is_empty() => {
                debug!(chars = reply.len(), "Chat reply received");
                reply.trim().to_string()
            }
            Ok(_) => {
                error!(chatbot = %profile.name, "Completion API returned an empty reply");
                CHAT_FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                error!(chatbot = %profile.name, error = %e, "Completion API error");
                CHAT_FALLBACK_REPLY.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveybot_completion::ScriptedClient;
    use surveybot_documents::StaticSource;

    fn profile(documents: Vec<String>) -> ChatbotProfile {
        ChatbotProfile {
            id: "c1".into(),
            name: "Helper".into(),
            token: "tok".into(),
            documents,
        }
    }

    #[tokio::test]
    async fn test_plain_prompt_without_documents() {
        let client = ScriptedClient::new().with_reply(" Hi! ");
        let docs = StaticSource::new();
        let responder = ChatResponder::new(&client, &docs);

        let reply = responder.respond(&profile(vec![]), "hello").await;
        assert_eq!(reply, "Hi!");
        assert_eq!(client.calls()[0][0].content, "You are a chatbot named Helper.");
    }

    #[tokio::test]
    async fn test_documents_are_injected_and_missing_skipped() {
        let client = ScriptedClient::new().with_reply("Tea is great.");
        let docs = StaticSource::new().with_document("guide.txt", "Tea grows on hills.");
        let responder = ChatResponder::new(&client, &docs);

        let reply = responder
            .respond(&profile(vec!["guide.txt".into(), "missing.txt".into()]), "tell me")
            .await;
        assert_eq!(reply, "Tea is great.");

        let system = &client.calls()[0][0].content;
        assert!(system.contains("expert of the documents contents"));
        assert!(system.ends_with("Tea grows on hills."));
    }

    #[tokio::test]
    async fn test_failure_returns_fallback() {
        let client = ScriptedClient::new().with_failure("boom");
        let docs = StaticSource::new();
        let responder = ChatResponder::new(&client, &docs);

        let reply = responder.respond(&profile(vec![]), "hello").await;
        assert_eq!(reply, CHAT_FALLBACK_REPLY);
    }
}
