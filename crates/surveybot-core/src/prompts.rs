use crate::{Question, SurveyDefinition};

/// Prompt templates for the survey engine
pub struct SurveyPrompts;

impl SurveyPrompts {
    /// System prompt shared by every survey turn
    pub fn system_prompt(survey: &SurveyDefinition) -> String {
        format!(
            r#"You are a survey bot named {name}.
Your task is to conduct a survey based on the following instructions:
{instructions}

You have access to the following questions:
{questions}

Conduct the survey in a conversational manner, asking one question at a time.
Do not reveal all questions at once. Wait for the respondent's answer before moving on.
After each answer you should:
1. Acknowledge the answer.
2. Ask the next question in the survey.
3. If it was the last question, thank the respondent for completing the survey.

When the next step asks you to judge an answer, start your reply with a verdict block
and then write the message for the respondent:
<verdict>{{"type": "accept", "rationale": "why the answer meets the criteria"}}</verdict>
or
<verdict>{{"type": "clarify", "rationale": "what is missing"}}</verdict>
The verdict block is removed before the respondent sees your reply."#,
            name = survey.name(),
            instructions = survey.instructions().unwrap_or("(no additional instructions)"),
            questions = survey.format_questions(),
        )
    }

    /// System prompt for the opening greeting. Never contains question text.
    pub fn greeting_prompt(survey: &SurveyDefinition) -> String {
        format!(
            r#"You are a survey bot named {name}.
Create an initial greeting for a survey based on these instructions:
{instructions}

Your greeting should:
1. Introduce the survey topic
2. Ask for the respondent's name
3. Be concise and welcoming

Do not ask any survey questions yet."#,
            name = survey.name(),
            instructions = survey.instructions().unwrap_or("(no additional instructions)"),
        )
    }

    pub fn greeting_request() -> &'static str {
        "Generate the initial greeting for the survey."
    }

    /// Instructions for judging an answer, when the question carries criteria
    pub fn validation_instructions(question: &Question) -> Option<String> {
        question.criteria().map(|criteria| {
            format!(
                r#"The respondent's latest message answers: "{question}".
Check whether it meets the following criteria: {criteria}.
If it does not, start your reply with a clarify verdict and politely ask the respondent to provide more details according to the criteria. Do not move to another question.
If it does, start your reply with an accept verdict, acknowledge the answer and proceed."#,
                question = question.text,
                criteria = criteria,
            )
        })
    }

    /// Directive for a turn that should pose `next`
    pub fn ask_directive(validation: Option<&str>, next: &Question) -> String {
        let mut directive = String::from("Acknowledge the respondent's previous message if any.\n");
        if let Some(validation) = validation {
            directive.push_str(validation);
            directive.push('\n');
            directive.push_str("If the answer meets the criteria, ask this question: ");
        } else {
            directive.push_str("Then ask this question: ");
        }
        directive.push_str(&next.text);

        if let Some(choices) = next.choices() {
            directive.push_str(&format!("\nOffer these options: {}.", choices.join(", ")));
        }
        if let Some(guidance) = next.guidance() {
            directive.push_str(&format!("\nGuidance for this question: {}", guidance));
        }
        directive
    }

    /// Directive for the turn after the last question
    pub fn closing_directive(validation: Option<&str>) -> String {
        match validation {
            Some(validation) => format!(
                "{}\nIf the answer meets the criteria, this was the last question: thank the respondent for completing the survey.",
                validation
            ),
            None => "This was the last question. Thank the respondent for completing the survey."
                .to_string(),
        }
    }

    /// Audit note combining question, raw answer and the judgement behind it
    pub fn interpretation(question: &Question, answer: &str, rationale: &str) -> String {
        format!(
            "Question: {}\nAnswer: {}\nInterpretation: {}",
            question.text,
            answer,
            rationale.trim()
        )
    }

    /// Rationale used when the model gave none
    pub fn default_rationale(question: &Question) -> String {
        match question.criteria() {
            Some(criteria) => format!("Accepted against criteria: {}", criteria),
            None => "Accepted without criteria.".to_string(),
        }
    }
}
