use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Question, Speaker, SurveyDefinition, SurveyPrompts, Transcript};

/// Engine state for one invocation, always derived from the transcript.
///
/// `current_question_index` counts the questions posed so far; it equals the
/// number of questions once the last one has been asked. It never decreases
/// and `answers` only grows as the transcript grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub current_question_index: usize,
    /// Accepted answers keyed by question id
    pub answers: BTreeMap<String, String>,
    pub survey_complete: bool,
}

impl EngineState {
    /// Rebuild the state by replaying the transcript.
    ///
    /// The first assistant turn is the greeting. Each later assistant turn
    /// without `hold` poses the next question; the one after the last
    /// question closes the survey. The respondent turn right after a posing
    /// (or clarifying) turn answers that question and is kept unless the
    /// following assistant turn is a hold. A `closed` turn ends the survey
    /// where it stands, keeping only the answers committed before it.
    pub fn replay(survey: &SurveyDefinition, transcript: &Transcript) -> Self {
        Self::replay_with_notes(survey, transcript).0
    }

    /// Like [`EngineState::replay`], also returning interpretation notes for
    /// every committed answer.
    pub(crate) fn replay_with_notes(
        survey: &SurveyDefinition,
        transcript: &Transcript,
    ) -> (Self, BTreeMap<String, String>) {
        let total = survey.len();
        let mut state = Self::default();
        let mut notes = BTreeMap::new();

        let mut seen_greeting = false;
        let mut awaiting: Option<usize> = None;
        let mut candidate: Option<(usize, &str)> = None;

        for turn in transcript.turns() {
            if state.survey_complete {
                break;
            }

            match turn.role {
                Speaker::Assistant if turn.closes_survey() => {
                    if let Some((index, _)) = candidate.take() {
                        debug!(question_index = index, "Answer dropped, survey closed after failure");
                    }
                    awaiting = None;
                    state.survey_complete = true;
                }
                Speaker::Assistant if !seen_greeting => {
                    seen_greeting = true;
                    awaiting = None;
                }
                Speaker::Assistant if turn.hold => {
                    if let Some((index, _)) = candidate.take() {
                        debug!(question_index = index, "Answer held for clarification");
                    }
                    awaiting = state.current_question_index.checked_sub(1);
                }
                Speaker::Assistant => {
                    if let Some((index, text)) = candidate.take() {
                        if let Some(question) = survey.question(index) {
                            commit(&mut state, &mut notes, question, text);
                        }
                    }
                    if state.current_question_index < total {
                        awaiting = Some(state.current_question_index);
                        state.current_question_index += 1;
                    } else {
                        awaiting = None;
                        state.survey_complete = true;
                    }
                }
                Speaker::Respondent => {
                    if let Some(index) = awaiting.take() {
                        candidate = Some((index, turn.content.as_str()));
                    }
                }
            }
        }

        (state, notes)
    }

    /// The question the respondent's next message answers
    pub fn previous_question<'s>(&self, survey: &'s SurveyDefinition) -> Option<&'s Question> {
        self.current_question_index
            .checked_sub(1)
            .and_then(|i| survey.question(i))
    }

    /// The question to pose next, if any remain
    pub fn next_question<'s>(&self, survey: &'s SurveyDefinition) -> Option<&'s Question> {
        survey.question(self.current_question_index)
    }
}

fn commit(
    state: &mut EngineState,
    notes: &mut BTreeMap<String, String>,
    question: &Question,
    answer: &str,
) {
    state.answers.insert(question.id.clone(), answer.to_string());
    notes.insert(
        question.id.clone(),
        SurveyPrompts::interpretation(question, answer, &SurveyPrompts::default_rationale(question)),
    );
}
