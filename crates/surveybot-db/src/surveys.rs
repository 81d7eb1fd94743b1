//! Survey bot store: survey rows and their ordered questions.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::MutexGuard;
use tracing::{debug, info};

use surveybot_core::{Question, SurveyDefinition, SurveyError};

use crate::{new_id, new_token, parse_timestamp, DbError};

/// A question as submitted by a client; `id` is only honoured on update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub question_text: String,
    #[serde(default = "default_question_type")]
    pub question_type: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub order_number: i64,
    #[serde(default)]
    pub guidance: Option<String>,
    #[serde(default)]
    pub answer_criteria: Option<String>,
}

fn default_question_type() -> String {
    "short_answer".to_string()
}

impl QuestionDraft {
    fn to_question(&self, id: String) -> Question {
        Question {
            id,
            text: self.question_text.clone(),
            question_type: self.question_type.clone(),
            options: self.options.clone(),
            order_number: self.order_number,
            guidance: self.guidance.clone(),
            answer_criteria: self.answer_criteria.clone(),
        }
    }
}

/// Fields accepted when creating or updating a survey bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDraft {
    pub name: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

/// A stored survey bot with its questions in survey order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyRecord {
    pub id: String,
    pub name: String,
    pub instructions: Option<String>,
    pub token: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SurveyRecord {
    /// The validated definition the engine runs on
    pub fn definition(&self) -> Result<SurveyDefinition, SurveyError> {
        SurveyDefinition::new(
            self.id.as_str(),
            self.name.as_str(),
            self.instructions.clone(),
            self.questions.clone(),
        )
    }
}

/// Survey store with a borrowed connection.
pub struct Surveys<'db> {
    conn: MutexGuard<'db, Connection>,
}

const SURVEY_COLUMNS: &str = "id, name, instructions, token, created_at, updated_at";

impl<'db> Surveys<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Create a survey bot with fresh ids and share token.
    pub fn create(&self, draft: &SurveyDraft) -> Result<SurveyRecord, DbError> {
        let id = new_id();
        let questions = draft
            .questions
            .iter()
            .map(|q| q.to_question(new_id()))
            .collect();
        let definition =
            SurveyDefinition::new(id.as_str(), draft.name.as_str(), draft.instructions.clone(), questions)?;

        let now = Utc::now();
        let token = new_token();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO surveybots (id, name, instructions, token, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, definition.name(), definition.instructions(), token, now.to_rfc3339()],
        )?;
        for question in definition.questions() {
            insert_question(&tx, &id, question)?;
        }
        tx.commit()?;

        info!(surveybot = %id, questions = definition.len(), "Created survey bot");

        Ok(SurveyRecord {
            id,
            name: definition.name().to_string(),
            instructions: definition.instructions().map(str::to_string),
            token,
            questions: definition.questions().to_vec(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a survey bot by ID.
    pub fn get(&self, id: &str) -> Result<Option<SurveyRecord>, DbError> {
        let sql = format!("SELECT {} FROM surveybots WHERE id = ?1", SURVEY_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![id], Self::row_to_record)
            .optional()?;
        self.with_questions(record)
    }

    /// Get a survey bot by its share token.
    pub fn get_by_token(&self, token: &str) -> Result<Option<SurveyRecord>, DbError> {
        let sql = format!("SELECT {} FROM surveybots WHERE token = ?1", SURVEY_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![token], Self::row_to_record)
            .optional()?;
        self.with_questions(record)
    }

    /// List every survey bot, newest first.
    pub fn list(&self) -> Result<Vec<SurveyRecord>, DbError> {
        let sql = format!("SELECT {} FROM surveybots ORDER BY created_at DESC", SURVEY_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.questions = load_questions(&self.conn, &record.id)?;
            records.push(record);
        }

        Ok(records)
    }

    /// Replace name, instructions and question set in one transaction.
    ///
    /// Draft questions whose id belongs to this survey are updated in place,
    /// the rest are inserted, and stored questions missing from the draft are
    /// deleted. Returns `None` if the survey bot does not exist.
    pub fn update(&self, id: &str, draft: &SurveyDraft) -> Result<Option<SurveyRecord>, DbError> {
        let Some(existing) = self.get(id)? else {
            return Ok(None);
        };

        let known: HashSet<&str> = existing.questions.iter().map(|q| q.id.as_str()).collect();
        let questions = draft
            .questions
            .iter()
            .map(|q| match q.id.as_deref() {
                Some(qid) if known.contains(qid) => q.to_question(qid.to_string()),
                _ => q.to_question(new_id()),
            })
            .collect();
        let definition =
            SurveyDefinition::new(id, draft.name.as_str(), draft.instructions.clone(), questions)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE surveybots SET name = ?1, instructions = ?2, updated_at = ?3 WHERE id = ?4",
            params![definition.name(), definition.instructions(), Utc::now().to_rfc3339(), id],
        )?;

        let mut kept = HashSet::new();
        for question in definition.questions() {
            if known.contains(question.id.as_str()) {
                tx.execute(
                    r#"
                    UPDATE survey_questions SET
                        question_text = ?1, question_type = ?2, options = ?3,
                        order_number = ?4, guidance = ?5, answer_criteria = ?6
                    WHERE id = ?7 AND surveybot_id = ?8
                    "#,
                    params![
                        question.text,
                        question.question_type,
                        encode_options(&question.options)?,
                        question.order_number,
                        question.guidance,
                        question.answer_criteria,
                        question.id,
                        id,
                    ],
                )?;
            } else {
                insert_question(&tx, id, question)?;
            }
            kept.insert(question.id.as_str());
        }

        let mut removed = 0;
        for stale in known.iter().filter(|qid| !kept.contains(*qid)) {
            removed += tx.execute("DELETE FROM survey_questions WHERE id = ?1", params![stale])?;
        }
        tx.commit()?;

        debug!(surveybot = %id, questions = definition.len(), removed, "Updated survey bot");
        self.get(id)
    }

    /// Delete a survey bot and everything attached to it.
    pub fn delete(&self, id: &str) -> Result<bool, DbError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM surveybots WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    fn with_questions(&self, record: Option<SurveyRecord>) -> Result<Option<SurveyRecord>, DbError> {
        match record {
            Some(mut record) => {
                record.questions = load_questions(&self.conn, &record.id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<SurveyRecord, rusqlite::Error> {
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;

        Ok(SurveyRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            instructions: row.get(2)?,
            token: row.get(3)?,
            questions: Vec::new(),
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }
}

/// Questions of a survey bot ordered by `order_number`
pub(crate) fn load_questions(conn: &Connection, surveybot_id: &str) -> Result<Vec<Question>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, question_text, question_type, options, order_number, guidance, answer_criteria
        FROM survey_questions WHERE surveybot_id = ?1 ORDER BY order_number
        "#,
    )?;
    let rows = stmt.query_map(params![surveybot_id], |row| {
        let options: Option<String> = row.get(3)?;
        let options = options
            .map(|raw| serde_json::from_str::<Vec<String>>(&raw))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        Ok(Question {
            id: row.get(0)?,
            text: row.get(1)?,
            question_type: row.get(2)?,
            options,
            order_number: row.get(4)?,
            guidance: row.get(5)?,
            answer_criteria: row.get(6)?,
        })
    })?;

    let mut questions = Vec::new();
    for row in rows {
        questions.push(row?);
    }
    Ok(questions)
}

fn insert_question(conn: &Connection, surveybot_id: &str, question: &Question) -> Result<(), DbError> {
    conn.execute(
        r#"
        INSERT INTO survey_questions (id, surveybot_id, question_text, question_type, options, order_number, guidance, answer_criteria)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            question.id,
            surveybot_id,
            question.text,
            question.question_type,
            encode_options(&question.options)?,
            question.order_number,
            question.guidance,
            question.answer_criteria,
        ],
    )?;
    Ok(())
}

fn encode_options(options: &Option<Vec<String>>) -> Result<Option<String>, serde_json::Error> {
    options.as_ref().map(serde_json::to_string).transpose()
}
