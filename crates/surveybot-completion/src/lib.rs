mod message;
mod openai;
mod scripted;
mod traits;

pub use message::{ChatMessage, Role};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use scripted::{ScriptedClient, ScriptedReply};
pub use traits::{CompletionClient, CompletionError, CompletionOptions};
