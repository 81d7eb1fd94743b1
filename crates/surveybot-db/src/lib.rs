//! Database layer for surveybot.
//!
//! Provides a unified `Database` struct that owns the SQLite connection
//! and hands out domain-specific stores borrowing it.

mod chatbots;
mod responses;
mod surveys;

pub use chatbots::{ChatbotRecord, Chatbots, NewChatbot};
pub use responses::{AnswerRow, ResponseRecord, Responses};
pub use surveys::{QuestionDraft, SurveyDraft, SurveyRecord, Surveys};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use surveybot_core::SurveyError;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to encode stored JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid survey: {0}")]
    Survey(#[from] SurveyError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// The main database struct that owns the SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the default location.
    ///
    /// The default location is `~/.local/share/surveybot/surveybot.db`.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(&Self::default_path())
    }

    /// Open or create a database at a specific path.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the default database path.
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("surveybot")
            .join("surveybot.db")
    }

    /// Access the survey bot store.
    pub fn surveys(&self) -> Result<Surveys<'_>, DbError> {
        Ok(Surveys::new(self.lock()?))
    }

    /// Access the response store.
    pub fn responses(&self) -> Result<Responses<'_>, DbError> {
        Ok(Responses::new(self.lock()?))
    }

    /// Access the chatbot store.
    pub fn chatbots(&self) -> Result<Chatbots<'_>, DbError> {
        Ok(Chatbots::new(self.lock()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Initialize the database schema.
    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS surveybots (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                instructions TEXT,
                token TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS survey_questions (
                id TEXT PRIMARY KEY,
                surveybot_id TEXT NOT NULL REFERENCES surveybots(id) ON DELETE CASCADE,
                question_text TEXT NOT NULL,
                question_type TEXT NOT NULL,
                options TEXT,
                order_number INTEGER NOT NULL,
                guidance TEXT,
                answer_criteria TEXT
            );

            CREATE TABLE IF NOT EXISTS survey_responses (
                id TEXT PRIMARY KEY,
                surveybot_id TEXT NOT NULL REFERENCES surveybots(id) ON DELETE CASCADE,
                respondent_id TEXT,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS survey_answers (
                id TEXT PRIMARY KEY,
                response_id TEXT NOT NULL REFERENCES survey_responses(id) ON DELETE CASCADE,
                question_id TEXT NOT NULL,
                question_text TEXT NOT NULL,
                raw_answer TEXT NOT NULL,
                interpreted_answer TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS survey_conversations (
                id TEXT PRIMARY KEY,
                response_id TEXT NOT NULL REFERENCES survey_responses(id) ON DELETE CASCADE,
                conversation TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chatbots (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                documents TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_questions_surveybot ON survey_questions(surveybot_id, order_number);
            CREATE INDEX IF NOT EXISTS idx_responses_surveybot ON survey_responses(surveybot_id);
            CREATE INDEX IF NOT EXISTS idx_answers_response ON survey_answers(response_id);
            "#,
        )
    }
}

/// URL-safe share token
pub(crate) fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_at_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("surveybot.db");

        let db = Database::open_at(&path).unwrap();
        assert!(path.exists());
        assert!(db.surveys().unwrap().list().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surveybot.db");

        let id = {
            let db = Database::open_at(&path).unwrap();
            let record = db
                .chatbots()
                .unwrap()
                .create(&NewChatbot {
                    name: "Helper".into(),
                    documents: vec![],
                })
                .unwrap();
            record.id
        };

        let db = Database::open_at(&path).unwrap();
        assert!(db.chatbots().unwrap().get(&id).unwrap().is_some());
    }

    #[test]
    fn test_tokens_are_url_safe() {
        let token = new_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
