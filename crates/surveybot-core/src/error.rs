use thiserror::Error;

/// Problems with survey data supplied by a caller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurveyError {
    #[error("Survey name must not be empty")]
    EmptyName,

    #[error("Question id must not be empty (order number {0})")]
    EmptyQuestionId(i64),

    #[error("Question {0} has empty text")]
    EmptyQuestionText(String),

    #[error("Duplicate question id: {0}")]
    DuplicateQuestionId(String),

    #[error("Duplicate order number {order_number} (questions {first} and {second})")]
    DuplicateOrderNumber {
        order_number: i64,
        first: String,
        second: String,
    },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Transcript is empty; start the conversation with a greeting")]
    EmptyTranscript,

    #[error("Completion error: {0}")]
    Completion(#[from] surveybot_completion::CompletionError),
}
