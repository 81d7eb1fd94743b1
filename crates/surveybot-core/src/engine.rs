use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use surveybot_completion::{ChatMessage, CompletionClient, CompletionError, CompletionOptions};

use crate::error::EngineError;
use crate::{EngineState, SurveyDefinition, SurveyPrompts, Transcript, Turn, Verdict};

/// Reply sent to the respondent when a turn could not be completed
pub const FALLBACK_REPLY: &str = "I'm sorry, but I encountered an error.";

/// Reply sent when the transcript already contains the closing turn
pub const ALREADY_COMPLETE_REPLY: &str =
    "This survey is already complete. Thank you for your responses!";

/// What a single `advance` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply poses the question with this id
    Asked(String),
    /// The answer to this question fell short; the reply asks again
    Clarifying(String),
    /// The reply thanks the respondent and closes the survey
    Completed,
    /// Nothing left to do; the model was not called
    AlreadyComplete,
    /// The turn failed and the survey was closed
    Aborted(String),
}

impl TurnOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnOutcome::Completed | TurnOutcome::AlreadyComplete | TurnOutcome::Aborted(_)
        )
    }
}

/// Result of one conversational turn
#[derive(Debug, Clone)]
pub struct Advance {
    pub reply: String,
    /// The reply re-poses the previous question; callers store it on the appended turn
    pub hold: bool,
    pub state: EngineState,
    pub outcome: TurnOutcome,
    /// Audit notes keyed by question id, covering every answered question
    pub interpreted_answers: BTreeMap<String, String>,
}

impl Advance {
    pub fn is_complete(&self) -> bool {
        self.state.survey_complete
    }

    /// The turn failed and the survey was closed without a closing message
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, TurnOutcome::Aborted(_))
    }

    /// The assistant turn callers append to the transcript for this reply
    pub fn turn(&self) -> Turn {
        if self.is_aborted() {
            Turn::failure(self.reply.as_str())
        } else if self.hold {
            Turn::clarification(self.reply.as_str())
        } else {
            Turn::assistant(self.reply.as_str())
        }
    }
}

/// Drives a survey conversation one turn at a time.
///
/// Holds no conversation state of its own: every call rebuilds the state from
/// the transcript supplied by the caller.
pub struct SurveyEngine<'a> {
    client: &'a dyn CompletionClient,
    options: CompletionOptions,
}

impl<'a> SurveyEngine<'a> {
    pub fn new(client: &'a dyn CompletionClient) -> Self {
        Self {
            client,
            options: CompletionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Generate the opening message for an empty conversation
    pub async fn initial_greeting(&self, survey: &SurveyDefinition) -> Result<String, EngineError> {
        info!(survey = survey.name(), client = self.client.name(), "Generating greeting");

        let messages = [
            ChatMessage::system(SurveyPrompts::greeting_prompt(survey)),
            ChatMessage::user(SurveyPrompts::greeting_request()),
        ];

        let reply = self.client.generate(&messages, &self.options).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err(CompletionError::EmptyResponse.into());
        }
        Ok(reply.to_string())
    }

    /// Answer the respondent's latest message.
    ///
    /// `transcript` is the conversation so far, without `new_message`. Completion
    /// failures never escape: they produce [`TurnOutcome::Aborted`] with the
    /// fallback reply and a closed survey.
    pub async fn advance(
        &self,
        survey: &SurveyDefinition,
        transcript: &Transcript,
        new_message: &str,
    ) -> Result<Advance, EngineError> {
        if transcript.is_empty() {
            return Err(EngineError::EmptyTranscript);
        }

        let (mut state, mut interpreted) = EngineState::replay_with_notes(survey, transcript);
        debug!(
            index = state.current_question_index,
            answers = state.answers.len(),
            complete = state.survey_complete,
            "Replayed transcript"
        );

        if state.survey_complete {
            info!(survey = survey.name(), "Survey already complete, skipping completion call");
            return Ok(Advance {
                reply: ALREADY_COMPLETE_REPLY.to_string(),
                hold: false,
                state,
                outcome: TurnOutcome::AlreadyComplete,
                interpreted_answers: interpreted,
            });
        }

        let previous = state.previous_question(survey);
        let next = state.next_question(survey);
        let validation = previous.and_then(SurveyPrompts::validation_instructions);

        let directive = match next {
            Some(question) => SurveyPrompts::ask_directive(validation.as_deref(), question),
            None => SurveyPrompts::closing_directive(validation.as_deref()),
        };

        let mut conversation = transcript.clone();
        conversation.push_respondent(new_message);

        let messages = [
            ChatMessage::system(SurveyPrompts::system_prompt(survey)),
            ChatMessage::user(conversation.render()),
            ChatMessage::system(directive),
        ];

        let raw = match self.client.generate(&messages, &self.options).await {
            Ok(raw) => raw,
            Err(e) => return Ok(abort(survey, state, interpreted, e)),
        };

        let parsed = Verdict::parse(&raw);
        if parsed.message.is_empty() {
            return Ok(abort(survey, state, interpreted, CompletionError::EmptyResponse));
        }

        let hold = validation.is_some() && parsed.verdict.is_clarify();

        if let Some(question) = previous {
            let rationale = match parsed.verdict.rationale().trim() {
                r if validation.is_some() && !r.is_empty() => r.to_string(),
                _ => SurveyPrompts::default_rationale(question),
            };
            interpreted.insert(
                question.id.clone(),
                SurveyPrompts::interpretation(question, new_message, &rationale),
            );

            if hold {
                info!(
                    question = %question.id,
                    verdict = parsed.verdict.short_description(),
                    "Answer did not meet criteria, asking again"
                );
                return Ok(Advance {
                    reply: parsed.message,
                    hold: true,
                    state,
                    outcome: TurnOutcome::Clarifying(question.id.clone()),
                    interpreted_answers: interpreted,
                });
            }

            state
                .answers
                .insert(question.id.clone(), new_message.to_string());
        }

        let outcome = match next {
            Some(question) => {
                state.current_question_index += 1;
                info!(
                    question = %question.id,
                    index = state.current_question_index,
                    total = survey.len(),
                    "Asking question"
                );
                TurnOutcome::Asked(question.id.clone())
            }
            None => {
                state.survey_complete = true;
                info!(survey = survey.name(), answers = state.answers.len(), "Survey completed");
                TurnOutcome::Completed
            }
        };

        Ok(Advance {
            reply: parsed.message,
            hold: false,
            state,
            outcome,
            interpreted_answers: interpreted,
        })
    }
}

fn abort(
    survey: &SurveyDefinition,
    mut state: EngineState,
    interpreted: BTreeMap<String, String>,
    cause: CompletionError,
) -> Advance {
    if cause.is_transient() {
        warn!(
            survey = survey.id(),
            index = state.current_question_index,
            error = %cause,
            "Transient completion failure, closing survey"
        );
    } else {
        error!(
            survey = survey.id(),
            index = state.current_question_index,
            error = %cause,
            "Completion failed, closing survey"
        );
    }
    state.survey_complete = true;
    Advance {
        reply: FALLBACK_REPLY.to_string(),
        hold: false,
        state,
        outcome: TurnOutcome::Aborted(cause.to_string()),
        interpreted_answers: interpreted,
    }
}
