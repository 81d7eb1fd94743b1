use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for a survey run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SurveyStarted {
        survey: String,
        questions: usize,
    },
    QuestionAsked {
        /// 1-based position of the question
        position: usize,
        total: usize,
        question_id: String,
    },
    ClarificationRequested {
        question_id: String,
    },
    SurveyCompleted {
        answered: usize,
        total: usize,
        duration_secs: f64,
    },
    SurveyAborted {
        error: String,
    },
    TranscriptSaved {
        path: PathBuf,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for survey events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let _ = writeln!(file, "{}", event.with_timestamp());
            }
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SurveyStarted { survey, questions } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "surveybot".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Survey:".dimmed(),
                    Self::truncate_with_padding(survey, 60, 68).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Questions:".dimmed(),
                    Self::truncate_with_padding(&questions.to_string(), 57, 65).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::QuestionAsked {
                position, total, ..
            } => {
                let header = format!("─ Question {}/{} ", position, total);
                let padding = "─".repeat(67usize.saturating_sub(header.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue()
                );
            }
            LogEvent::ClarificationRequested { question_id } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}",
                    "→".bright_yellow(),
                    format!("Clarification requested ({})", question_id).bright_yellow()
                );
            }
            LogEvent::SurveyCompleted {
                answered,
                total,
                duration_secs,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Survey complete: {}/{} answered ({:.1}s)",
                    "✓".bright_green(),
                    answered,
                    total,
                    duration_secs
                );
            }
            LogEvent::SurveyAborted { error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Survey aborted: {}",
                    "✗".bright_red(),
                    error.bright_red()
                );
            }
            LogEvent::TranscriptSaved { path } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "Transcript:".dimmed(),
                    path.display().to_string().dimmed()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SurveyStarted { survey, questions } => {
                format!("[{}] survey:start {} ({}q)", timestamp, survey, questions)
            }
            LogEvent::QuestionAsked {
                position,
                total,
                question_id,
            } => format!("[{}] ask:{}/{} {}", timestamp, position, total, question_id),
            LogEvent::ClarificationRequested { question_id } => {
                format!("[{}] clarify:{}", timestamp, question_id)
            }
            LogEvent::SurveyCompleted {
                answered,
                total,
                duration_secs,
            } => format!(
                "[{}] survey:done {}/{} {:.1}s",
                timestamp, answered, total, duration_secs
            ),
            LogEvent::SurveyAborted { error } => format!("[{}] survey:abort {}", timestamp, error),
            LogEvent::TranscriptSaved { path } => {
                format!("[{}] transcript:{}", timestamp, path.display())
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1);
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("fancy".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_file_output_is_timestamped_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();

        logger.log(&LogEvent::ClarificationRequested {
            question_id: "q1".into(),
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(value["event"], "clarification_requested");
        assert_eq!(value["question_id"], "q1");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding() {
        let padded = Logger::truncate_with_padding("abc", 10, 8);
        assert_eq!(padded, "abc    │");
        let cut = Logger::truncate_with_padding("abcdefghijkl", 8, 10);
        assert!(cut.starts_with("abcde..."));
    }
}
