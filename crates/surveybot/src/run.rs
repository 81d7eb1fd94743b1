//! Conduct a survey interactively in the terminal.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Input;
use serde::Deserialize;
use tracing::warn;

use surveybot_core::{
    compile, Question, SurveyDefinition, SurveyEngine, SurveyResultBundle, Transcript, TurnOutcome,
};
use surveybot_logging::{LogEvent, LogFormat, Logger, TranscriptWriter};

use crate::config::Config;

/// A survey definition stored as TOML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurveyFile {
    pub id: Option<String>,
    pub name: String,
    pub instructions: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl SurveyFile {
    pub fn parse(content: &str, default_id: &str) -> Result<SurveyDefinition> {
        let file: SurveyFile = toml::from_str(content)?;
        let id = file.id.unwrap_or_else(|| default_id.to_string());
        Ok(SurveyDefinition::new(id, file.name, file.instructions, file.questions)?)
    }

    /// Load and validate a survey file. The id defaults to the file stem.
    pub fn load(path: &Path) -> Result<SurveyDefinition> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "survey".to_string());
        Self::parse(&content, &stem).with_context(|| format!("Invalid survey file {}", path.display()))
    }
}

/// How a terminal run ended
#[derive(Debug)]
pub struct RunSummary {
    pub bundle: SurveyResultBundle,
    pub outcome: TurnOutcome,
    pub duration: Duration,
}

impl RunSummary {
    fn outcome_label(&self) -> &'static str {
        match self.outcome {
            TurnOutcome::Completed | TurnOutcome::AlreadyComplete => "completed",
            TurnOutcome::Aborted(_) => "aborted",
            TurnOutcome::Asked(_) | TurnOutcome::Clarifying(_) => "incomplete",
        }
    }
}

pub async fn handle_run(
    survey_path: &Path,
    json_output: bool,
    config: &Config,
    log_format: LogFormat,
) -> Result<()> {
    let survey = SurveyFile::load(survey_path)?;
    let client = config
        .completion_client()
        .context("Failed to configure completion client")?;
    let engine = SurveyEngine::new(&client).with_options(config.completion_options());
    let logger = Logger::new(log_format);

    let writer = match TranscriptWriter::new(survey.id()) {
        Ok(writer) => Some(writer),
        Err(e) => {
            warn!(error = %e, "Transcript file unavailable, continuing without it");
            None
        }
    };

    let summary = conduct(&engine, &survey, &logger, writer.as_ref(), read_respondent).await?;

    if let Some(ref writer) = writer {
        logger.log(&LogEvent::TranscriptSaved {
            path: writer.path().to_path_buf(),
        });
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary.bundle)?);
    } else {
        print_bundle(&survey, &summary.bundle);
    }

    if matches!(summary.outcome, TurnOutcome::Aborted(_)) {
        std::process::exit(1);
    }
    Ok(())
}

/// Drive a full conversation, reading respondent messages from `read_line`.
pub async fn conduct<F>(
    engine: &SurveyEngine<'_>,
    survey: &SurveyDefinition,
    logger: &Logger,
    writer: Option<&TranscriptWriter>,
    mut read_line: F,
) -> Result<RunSummary>
where
    F: FnMut() -> Result<String>,
{
    let start = Instant::now();
    logger.log(&LogEvent::SurveyStarted {
        survey: survey.name().to_string(),
        questions: survey.len(),
    });
    if let Some(writer) = writer {
        writer.write_start(survey.id(), survey.name(), survey.len());
    }

    let greeting = engine
        .initial_greeting(survey)
        .await
        .context("Failed to generate greeting")?;
    say(&greeting);
    if let Some(writer) = writer {
        writer.write_turn("assistant", &greeting, false);
    }

    let mut transcript = Transcript::new();
    transcript.push_assistant(greeting, false);

    let (outcome, interpreted) = loop {
        let message = read_line()?;
        let advance = engine.advance(survey, &transcript, &message).await?;

        say(&advance.reply);
        if let Some(writer) = writer {
            writer.write_turn("user", &message, false);
            writer.write_turn("assistant", &advance.reply, advance.hold);
        }
        transcript.push_respondent(message);
        transcript.push(advance.turn());

        match &advance.outcome {
            TurnOutcome::Asked(question_id) => logger.log(&LogEvent::QuestionAsked {
                position: advance.state.current_question_index,
                total: survey.len(),
                question_id: question_id.clone(),
            }),
            TurnOutcome::Clarifying(question_id) => {
                logger.log(&LogEvent::ClarificationRequested {
                    question_id: question_id.clone(),
                })
            }
            TurnOutcome::Aborted(error) => logger.log(&LogEvent::SurveyAborted {
                error: error.clone(),
            }),
            TurnOutcome::Completed | TurnOutcome::AlreadyComplete => {}
        }

        if advance.outcome.is_terminal() {
            break (advance.outcome, advance.interpreted_answers);
        }
    };

    let bundle = compile(survey, &transcript, &interpreted);
    let duration = start.elapsed();

    if !matches!(outcome, TurnOutcome::Aborted(_)) {
        logger.log(&LogEvent::SurveyCompleted {
            answered: bundle.answered(),
            total: survey.len(),
            duration_secs: duration.as_secs_f64(),
        });
    }

    let summary = RunSummary {
        bundle,
        outcome,
        duration,
    };
    if let Some(writer) = writer {
        writer.write_end(
            summary.outcome_label(),
            summary.bundle.answered(),
            summary.duration.as_secs_f64(),
        );
    }
    Ok(summary)
}

fn read_respondent() -> Result<String> {
    let line: String = Input::new()
        .with_prompt("You")
        .allow_empty(true)
        .interact_text()?;
    Ok(line)
}

fn say(text: &str) {
    println!("{} {}", "Bot:".bright_cyan().bold(), text);
}

fn print_bundle(survey: &SurveyDefinition, bundle: &SurveyResultBundle) {
    eprintln!();
    eprintln!("{}", "=== RESULTS ===".bold());
    for record in bundle.answer_records(survey) {
        eprintln!("{} {}", "Q:".dimmed(), record.question_text);
        if record.raw_answer.is_empty() {
            eprintln!("{} {}", "A:".dimmed(), "(no answer)".dimmed());
        } else {
            eprintln!("{} {}", "A:".dimmed(), record.raw_answer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use surveybot_completion::ScriptedClient;

    const SURVEY: &str = r#"
name = "Coffee Bot"
instructions = "Learn how people drink coffee."

[[questions]]
id = "roast"
question_text = "Favourite roast?"
order_number = 2
options = ["light", "dark"]

[[questions]]
id = "cups"
question_text = "How many cups a day?"
order_number = 1
answer_criteria = "must include a number"
"#;

    #[test]
    fn test_parse_survey_file() {
        let survey = SurveyFile::parse(SURVEY, "coffee").unwrap();
        assert_eq!(survey.id(), "coffee");
        assert_eq!(survey.question(0).unwrap().id, "cups");
        assert_eq!(survey.question(1).unwrap().choices().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_duplicate_ids() {
        let content = SURVEY.replace("id = \"roast\"", "id = \"cups\"");
        assert!(SurveyFile::parse(&content, "coffee").is_err());
    }

    #[tokio::test]
    async fn test_conduct_full_run() {
        let survey = SurveyFile::parse(SURVEY, "coffee").unwrap();
        let client = ScriptedClient::new()
            .with_reply("Welcome! What's your name?")
            .with_reply("Hi Sam! How many cups a day?")
            .with_reply(r#"<verdict>{"type":"clarify","rationale":"no number"}</verdict>How many exactly?"#)
            .with_reply(r#"<verdict>{"type":"accept","rationale":"two"}</verdict>Light or dark?"#)
            .with_reply("Thanks for taking part!");
        let engine = SurveyEngine::new(&client);
        let logger = Logger::new(LogFormat::Compact);
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new_in(dir.path(), "coffee").unwrap();

        let mut inputs: VecDeque<&str> = ["Sam", "a few", "2", "dark"].into_iter().collect();
        let summary = conduct(&engine, &survey, &logger, Some(&writer), || {
            inputs
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("no more input"))
        })
        .await
        .unwrap();

        assert_eq!(summary.outcome, TurnOutcome::Completed);
        assert_eq!(summary.bundle.raw_answers["cups"], "2");
        assert_eq!(summary.bundle.raw_answers["roast"], "dark");
        assert_eq!(summary.bundle.full_conversation.len(), 9);

        let lines = std::fs::read_to_string(writer.path()).unwrap();
        assert_eq!(lines.lines().count(), 11);
        assert!(lines.lines().last().unwrap().contains("\"completed\""));
    }

    #[tokio::test]
    async fn test_conduct_stops_on_failure() {
        let survey = SurveyFile::parse(SURVEY, "coffee").unwrap();
        let client = ScriptedClient::new()
            .with_reply("Welcome! What's your name?")
            .with_failure("connection refused");
        let engine = SurveyEngine::new(&client);
        let logger = Logger::new(LogFormat::Compact);

        let summary = conduct(&engine, &survey, &logger, None, || Ok("Sam".to_string()))
            .await
            .unwrap();

        assert!(matches!(summary.outcome, TurnOutcome::Aborted(_)));
        assert!(summary.bundle.raw_answers.is_empty());
    }
}
