//! # surveybot-core
//!
//! The survey conversation engine and its data model.
//!
//! The engine is stateless: every call receives the survey and the full
//! transcript, replays the transcript into an [`EngineState`], asks the
//! completion model for the next reply and returns the updated state.
//!
//! ## Key Types
//!
//! - [`SurveyDefinition`] / [`Question`] - immutable question set
//! - [`Transcript`] / [`Turn`] - role-tagged conversation history
//! - [`EngineState`] - state replayed from a transcript
//! - [`SurveyEngine`] - greeting and turn-by-turn advancement
//! - [`Verdict`] - accept/clarify signal parsed from model output
//! - [`SurveyResultBundle`] - compiled answers at completion
//! - [`ChatResponder`] - document-grounded chatbot replies

mod chatbot;
mod engine;
mod error;
mod prompts;
mod results;
mod state;
mod survey;
mod transcript;
mod verdict;

pub use chatbot::{ChatResponder, ChatbotProfile, CHAT_FALLBACK_REPLY};
pub use engine::{Advance, SurveyEngine, TurnOutcome, ALREADY_COMPLETE_REPLY, FALLBACK_REPLY};
pub use error::{EngineError, SurveyError};
pub use prompts::SurveyPrompts;
pub use results::{compile, AnswerRecord, SurveyResultBundle};
pub use state::EngineState;
pub use survey::{Question, SurveyDefinition};
pub use transcript::{Speaker, Transcript, Turn};
pub use verdict::{ParsedReply, Verdict, VerdictParseError};
