use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Each line type in a transcript JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptLine {
    Start {
        timestamp: DateTime<Utc>,
        survey_id: String,
        survey_name: String,
        questions: usize,
    },
    Turn {
        role: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hold: bool,
        timestamp: DateTime<Utc>,
    },
    End {
        outcome: String,
        answered: usize,
        duration_secs: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Writes a survey run as JSONL to ~/.local/share/surveybot/transcripts/.
pub struct TranscriptWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl TranscriptWriter {
    /// Create a writer in the default transcripts directory. The file name is
    /// the current UTC timestamp plus a short hash of the survey id.
    pub fn new(survey_id: &str) -> io::Result<Self> {
        Self::new_in(&Self::transcripts_dir()?, survey_id)
    }

    /// Create a writer in a specific directory.
    pub fn new_in(dir: &Path, survey_id: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(survey_id.as_bytes());
        let hash = hex::encode(hasher.finalize());

        let path = dir.join(format!("{}_{}.jsonl", timestamp_str, &hash[..6]));
        let file = File::create(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Returns the path to the transcript file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(&self, survey_id: &str, survey_name: &str, questions: usize) {
        self.write_line(&TranscriptLine::Start {
            timestamp: Utc::now(),
            survey_id: survey_id.to_string(),
            survey_name: survey_name.to_string(),
            questions,
        });
    }

    pub fn write_turn(&self, role: &str, content: &str, hold: bool) {
        self.write_line(&TranscriptLine::Turn {
            role: role.to_string(),
            content: content.to_string(),
            hold,
            timestamp: Utc::now(),
        });
    }

    pub fn write_end(&self, outcome: &str, answered: usize, duration_secs: f64) {
        self.write_line(&TranscriptLine::End {
            outcome: outcome.to_string(),
            answered,
            duration_secs,
            timestamp: Utc::now(),
        });
    }

    fn write_line(&self, line: &TranscriptLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn transcripts_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not determine data directory")
        })?;
        Ok(data_dir.join("surveybot").join("transcripts"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new_in(dir.path(), "survey-1").unwrap();

        writer.write_start("survey-1", "Coffee Bot", 2);
        writer.write_turn("assistant", "Hi! What's your name?", false);
        writer.write_turn("user", "Alice", false);
        writer.write_turn("assistant", "Could you give a number?", true);
        writer.write_end("completed", 2, 12.5);

        let content = fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<TranscriptLine> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 5);
        assert!(matches!(lines[0], TranscriptLine::Start { questions: 2, .. }));
        assert!(matches!(lines[3], TranscriptLine::Turn { hold: true, .. }));
        assert!(!content.lines().nth(1).unwrap().contains("hold"));
        assert!(matches!(lines[4], TranscriptLine::End { answered: 2, .. }));
    }

    #[test]
    fn test_file_name_uses_survey_hash() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new_in(dir.path(), "survey-1").unwrap();
        let name = writer.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with(".jsonl"));
        assert_eq!(name.split('_').nth(1).unwrap().len(), "abcdef.jsonl".len());
    }
}
