use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::SurveyError;

/// A single survey question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "question_text")]
    pub text: String,
    /// Free tag such as "short_answer" or "multiple_choice"
    #[serde(rename = "question_type", default = "default_question_type")]
    pub question_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub order_number: i64,
    /// Hint injected into the prompt when the question is asked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    /// Natural-language acceptance rule judged by the completion model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_criteria: Option<String>,
}

fn default_question_type() -> String {
    "short_answer".to_string()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>, order_number: i64) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            question_type: default_question_type(),
            options: None,
            order_number,
            guidance: None,
            answer_criteria: None,
        }
    }

    pub fn with_type(mut self, question_type: impl Into<String>) -> Self {
        self.question_type = question_type.into();
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.answer_criteria = Some(criteria.into());
        self
    }

    /// Acceptance criteria, if present and not blank
    pub fn criteria(&self) -> Option<&str> {
        non_blank(&self.answer_criteria)
    }

    pub fn guidance(&self) -> Option<&str> {
        non_blank(&self.guidance)
    }

    /// Non-empty option list
    pub fn choices(&self) -> Option<&[String]> {
        self.options.as_deref().filter(|o| !o.is_empty())
    }
}

/// An ordered, validated question set together with the bot's steering text.
///
/// Questions are always held sorted by `order_number`; ids and order numbers
/// are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyDefinition {
    id: String,
    name: String,
    instructions: Option<String>,
    questions: Vec<Question>,
}

impl SurveyDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        instructions: Option<String>,
        mut questions: Vec<Question>,
    ) -> Result<Self, SurveyError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SurveyError::EmptyName);
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut seen_orders: HashMap<i64, &str> = HashMap::new();
        for q in &questions {
            if q.id.trim().is_empty() {
                return Err(SurveyError::EmptyQuestionId(q.order_number));
            }
            if q.text.trim().is_empty() {
                return Err(SurveyError::EmptyQuestionText(q.id.clone()));
            }
            if !seen_ids.insert(q.id.as_str()) {
                return Err(SurveyError::DuplicateQuestionId(q.id.clone()));
            }
            if let Some(first) = seen_orders.insert(q.order_number, q.id.as_str()) {
                return Err(SurveyError::DuplicateOrderNumber {
                    order_number: q.order_number,
                    first: first.to_string(),
                    second: q.id.clone(),
                });
            }
        }

        questions.sort_by_key(|q| q.order_number);

        Ok(Self {
            id: id.into(),
            name,
            instructions: instructions.filter(|i| !i.trim().is_empty()),
            questions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn contains_question(&self, id: &str) -> bool {
        self.questions.iter().any(|q| q.id == id)
    }

    /// One numbered line per question, in survey order
    pub fn format_questions(&self) -> String {
        self.questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let mut line = format!("{}. {} (Type: {})", i + 1, q.text, q.question_type);
                if let Some(choices) = q.choices() {
                    line.push_str(&format!(" [Options: {}]", choices.join(", ")));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
