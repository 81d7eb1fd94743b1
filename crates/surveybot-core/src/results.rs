use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{EngineState, SurveyDefinition, Transcript};

/// Everything persisted when a survey conversation finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyResultBundle {
    pub full_conversation: Transcript,
    /// Respondent text per question id
    pub raw_answers: BTreeMap<String, String>,
    /// Audit note per question id
    pub interpreted_answers: BTreeMap<String, String>,
}

/// One answer row, ready to be written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub question_text: String,
    pub raw_answer: String,
    pub interpreted_answer: Option<String>,
}

/// Compile the result bundle for a finished transcript.
///
/// Raw answers follow the same pairing as replay. Keys outside the survey's
/// question ids are dropped from both maps.
pub fn compile(
    survey: &SurveyDefinition,
    transcript: &Transcript,
    interpreted_answers: &BTreeMap<String, String>,
) -> SurveyResultBundle {
    let state = EngineState::replay(survey, transcript);

    let interpreted_answers = interpreted_answers
        .iter()
        .filter(|(id, _)| survey.contains_question(id))
        .map(|(id, note)| (id.clone(), note.clone()))
        .collect();

    SurveyResultBundle {
        full_conversation: transcript.clone(),
        raw_answers: state.answers,
        interpreted_answers,
    }
}

impl SurveyResultBundle {
    /// One record per survey question in survey order; unanswered questions
    /// get an empty raw answer.
    pub fn answer_records(&self, survey: &SurveyDefinition) -> Vec<AnswerRecord> {
        survey
            .questions()
            .iter()
            .map(|q| AnswerRecord {
                question_id: q.id.clone(),
                question_text: q.text.clone(),
                raw_answer: self.raw_answers.get(&q.id).cloned().unwrap_or_default(),
                interpreted_answer: self.interpreted_answers.get(&q.id).cloned(),
            })
            .collect()
    }

    pub fn answered(&self) -> usize {
        self.raw_answers.len()
    }
}
