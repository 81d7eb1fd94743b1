use std::collections::BTreeMap;

use surveybot_completion::ScriptedClient;
use surveybot_core::{
    compile, EngineState, Question, SurveyDefinition, SurveyEngine, Transcript, TurnOutcome,
};

/// Helper: survey with `n` questions, none carrying criteria.
fn plain_survey(n: usize) -> SurveyDefinition {
    let questions = (1..=n)
        .map(|i| Question::new(format!("q{}", i), format!("Question {}?", i), i as i64))
        .collect();
    SurveyDefinition::new("plain", "Plain Survey", None, questions).unwrap()
}

/// Helper: run one turn and append both sides to the transcript the way a client would.
async fn turn(
    engine: &SurveyEngine<'_>,
    survey: &SurveyDefinition,
    transcript: &mut Transcript,
    message: &str,
) -> surveybot_core::Advance {
    let advance = engine.advance(survey, transcript, message).await.unwrap();
    transcript.push_respondent(message);
    transcript.push(advance.turn());
    advance
}

// ============================================================
// Scenarios
// ============================================================

#[tokio::test]
async fn test_two_question_survey_end_to_end() {
    let survey = plain_survey(2);
    let client = ScriptedClient::new()
        .with_reply("Welcome! What's your name?")
        .with_reply("Hi Alice. Question 1?")
        .with_reply("Got it. Question 2?")
        .with_reply("Thank you for completing the survey!");
    let engine = SurveyEngine::new(&client);

    let mut transcript = Transcript::new();
    let greeting = engine.initial_greeting(&survey).await.unwrap();
    transcript.push_assistant(greeting, false);

    let first = turn(&engine, &survey, &mut transcript, "Alice").await;
    assert_eq!(first.outcome, TurnOutcome::Asked("q1".into()));
    assert_eq!(first.state.current_question_index, 1);

    let second = turn(&engine, &survey, &mut transcript, "answer1").await;
    assert_eq!(second.outcome, TurnOutcome::Asked("q2".into()));
    assert_eq!(second.state.current_question_index, 2);

    let third = turn(&engine, &survey, &mut transcript, "answer2").await;
    assert_eq!(third.outcome, TurnOutcome::Completed);
    assert_eq!(third.state.current_question_index, 2);
    assert!(third.state.survey_complete);
    assert_eq!(third.reply, "Thank you for completing the survey!");

    let bundle = compile(&survey, &transcript, &third.interpreted_answers);
    let expected: BTreeMap<String, String> = [
        ("q1".to_string(), "answer1".to_string()),
        ("q2".to_string(), "answer2".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(bundle.raw_answers, expected);
    assert_eq!(bundle.interpreted_answers.len(), 2);
    assert!(bundle.interpreted_answers["q2"].starts_with("Question: Question 2?\nAnswer: answer2"));
}

#[tokio::test]
async fn test_criteria_hold_then_advance() {
    let survey = SurveyDefinition::new(
        "cups",
        "Coffee Bot",
        None,
        vec![
            Question::new("q1", "How many cups a day?", 1).with_criteria("must include a number"),
            Question::new("q2", "Favourite roast?", 2),
        ],
    )
    .unwrap();
    let client = ScriptedClient::new()
        .with_reply("Hi Bob! How many cups a day?")
        .with_reply(r#"<verdict>{"type":"clarify","rationale":"no number"}</verdict>Could you give me a number?"#)
        .with_reply(r#"<verdict>{"type":"accept","rationale":"42 is a number"}</verdict>Wow. Favourite roast?"#);
    let engine = SurveyEngine::new(&client);

    let mut transcript = Transcript::from(vec![surveybot_core::Turn::assistant("Hello! Name?")]);
    turn(&engine, &survey, &mut transcript, "Bob").await;

    let held = turn(&engine, &survey, &mut transcript, "maybe").await;
    assert_eq!(held.outcome, TurnOutcome::Clarifying("q1".into()));
    assert_eq!(held.state.current_question_index, 1);
    assert!(held.state.answers.is_empty());
    assert!(!held.reply.contains("<verdict>"));

    let accepted = turn(&engine, &survey, &mut transcript, "42").await;
    assert_eq!(accepted.outcome, TurnOutcome::Asked("q2".into()));
    assert_eq!(accepted.state.current_question_index, 2);
    assert_eq!(accepted.state.answers["q1"], "42");
    assert!(accepted.interpreted_answers["q1"].ends_with("Interpretation: 42 is a number"));

    // The stored transcript replays to the same state
    assert_eq!(EngineState::replay(&survey, &transcript), accepted.state);
}

#[tokio::test]
async fn test_clarification_on_last_question_does_not_complete() {
    let survey = SurveyDefinition::new(
        "one",
        "One Question",
        None,
        vec![Question::new("q1", "Your postcode?", 1).with_criteria("a valid postcode")],
    )
    .unwrap();
    let client = ScriptedClient::new()
        .with_reply("Hi! Your postcode?")
        .with_reply("[CLARIFY] Could you please give the full postcode?");
    let engine = SurveyEngine::new(&client);

    let mut transcript = Transcript::from(vec![surveybot_core::Turn::assistant("Hello! Name?")]);
    turn(&engine, &survey, &mut transcript, "Eve").await;
    let held = turn(&engine, &survey, &mut transcript, "somewhere").await;

    assert!(held.hold);
    assert!(!held.state.survey_complete);
    assert_eq!(held.reply, "Could you please give the full postcode?");
}

// ============================================================
// Properties
// ============================================================

#[tokio::test]
async fn test_n_answers_reach_index_n() {
    for n in 0..5 {
        let survey = plain_survey(n);
        let client = ScriptedClient::new().with_fallback("Okay, next one.");
        let engine = SurveyEngine::new(&client);
        let mut transcript = Transcript::from(vec![surveybot_core::Turn::assistant("Hi! Name?")]);

        let mut last = turn(&engine, &survey, &mut transcript, "Name").await;
        for i in 0..n {
            assert!(!last.state.survey_complete, "completed early at answer {} of {}", i, n);
            last = turn(&engine, &survey, &mut transcript, &format!("answer {}", i)).await;
        }

        assert_eq!(last.state.current_question_index, n);
        assert!(last.state.survey_complete);
        assert_eq!(last.state.answers.len(), n);
    }
}

#[tokio::test]
async fn test_no_criteria_always_advances() {
    let survey = plain_survey(3);
    // Every reply tries to ask for more detail; without criteria it is ignored
    let client = ScriptedClient::new().with_fallback("Could you please provide more details?");
    let engine = SurveyEngine::new(&client);
    let mut transcript = Transcript::from(vec![surveybot_core::Turn::assistant("Hi! Name?")]);

    let mut index = 0;
    for message in ["Name", "a", "b"] {
        let advance = turn(&engine, &survey, &mut transcript, message).await;
        assert!(!advance.hold);
        assert_eq!(advance.state.current_question_index, index + 1);
        index += 1;
    }
}

#[tokio::test]
async fn test_failure_forces_completion() {
    let survey = plain_survey(2);
    let client = ScriptedClient::new()
        .with_reply("Hi! Question 1?")
        .with_failure("upstream timeout");
    let engine = SurveyEngine::new(&client);
    let mut transcript = Transcript::from(vec![surveybot_core::Turn::assistant("Hi! Name?")]);

    turn(&engine, &survey, &mut transcript, "Name").await;
    let aborted = engine.advance(&survey, &transcript, "answer1").await.unwrap();

    assert!(matches!(aborted.outcome, TurnOutcome::Aborted(_)));
    assert!(aborted.state.survey_complete);
    assert_eq!(aborted.state.current_question_index, 1);
    assert!(aborted.state.answers.is_empty());
}

#[test]
fn test_result_keys_are_question_ids() {
    let survey = plain_survey(2);
    let transcript: Transcript = serde_json::from_str(
        r#"[
            {"role":"assistant","content":"Hi"},
            {"role":"user","content":"Alice"},
            {"role":"assistant","content":"Question 1?"},
            {"role":"user","content":"one"},
            {"role":"assistant","content":"Question 2?"},
            {"role":"user","content":"two"},
            {"role":"assistant","content":"Thanks!"},
            {"role":"user","content":"extra"},
            {"role":"assistant","content":"Bye"}
        ]"#,
    )
    .unwrap();

    let bundle = compile(&survey, &transcript, &BTreeMap::new());
    assert!(bundle.raw_answers.keys().all(|k| survey.contains_question(k)));
    assert_eq!(bundle.raw_answers.len(), 2);
}
