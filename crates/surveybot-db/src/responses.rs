//! Response store: completed conversations and directly submitted answers.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::MutexGuard;
use tracing::{info, warn};

use surveybot_core::{SurveyDefinition, SurveyResultBundle, Transcript};

use crate::surveys::load_questions;
use crate::{new_id, parse_timestamp, DbError};

/// One stored answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRow {
    pub id: String,
    pub question_id: String,
    pub question_text: String,
    pub raw_answer: String,
    pub interpreted_answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A response with its answers and, for chat responses, the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub surveybot_id: String,
    pub respondent_id: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<AnswerRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Transcript>,
}

/// Response store with a borrowed connection.
pub struct Responses<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> Responses<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    /// Persist a finished conversation: the response, its transcript and one
    /// answer per question. Either everything is written or nothing is.
    pub fn record_result(
        &self,
        survey: &SurveyDefinition,
        respondent_id: Option<&str>,
        bundle: &SurveyResultBundle,
    ) -> Result<String, DbError> {
        let response_id = new_id();
        let now = Utc::now().to_rfc3339();
        let conversation = serde_json::to_string(&bundle.full_conversation)?;

        let tx = self.conn.unchecked_transaction()?;
        insert_response(&tx, &response_id, survey.id(), respondent_id, &now)?;
        tx.execute(
            "INSERT INTO survey_conversations (id, response_id, conversation, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new_id(), response_id, conversation, now],
        )?;
        for record in bundle.answer_records(survey) {
            insert_answer(
                &tx,
                &response_id,
                &record.question_id,
                &record.question_text,
                &record.raw_answer,
                record.interpreted_answer.as_deref(),
                &now,
            )?;
        }
        tx.commit()?;

        info!(
            surveybot = survey.id(),
            response = %response_id,
            answered = bundle.answered(),
            questions = survey.len(),
            "Recorded survey result"
        );
        Ok(response_id)
    }

    /// Store answers submitted as a `{question_id: answer}` object.
    ///
    /// Every key must be a question of the survey bot and every value a
    /// string; otherwise nothing is written.
    pub fn submit_answers(
        &self,
        surveybot_id: &str,
        respondent_id: Option<&str>,
        answers: &serde_json::Map<String, Value>,
    ) -> Result<String, DbError> {
        let exists = self
            .conn
            .query_row("SELECT 1 FROM surveybots WHERE id = ?1", params![surveybot_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(DbError::NotFound(format!("survey bot {}", surveybot_id)));
        }

        let questions = load_questions(&self.conn, surveybot_id)?;
        let mut rows = Vec::with_capacity(answers.len());
        for (question_id, value) in answers {
            let Some(question) = questions.iter().find(|q| &q.id == question_id) else {
                warn!(surveybot = surveybot_id, question = %question_id, "Rejected unknown question id");
                return Err(DbError::Validation(format!("unknown question id: {}", question_id)));
            };
            let Some(answer) = value.as_str() else {
                return Err(DbError::Validation(format!(
                    "answer for question {} must be a string",
                    question_id
                )));
            };
            rows.push((question, answer));
        }

        let response_id = new_id();
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.unchecked_transaction()?;
        insert_response(&tx, &response_id, surveybot_id, respondent_id, &now)?;
        for (question, answer) in &rows {
            insert_answer(&tx, &response_id, &question.id, &question.text, answer, None, &now)?;
        }
        tx.commit()?;

        info!(surveybot = surveybot_id, response = %response_id, answers = rows.len(), "Stored submitted answers");
        Ok(response_id)
    }

    /// Every response of a survey bot with its answers, oldest first.
    pub fn results(&self, surveybot_id: &str) -> Result<Vec<ResponseRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT r.id, r.surveybot_id, r.respondent_id, r.completed, r.created_at, c.conversation
            FROM survey_responses r
            LEFT JOIN survey_conversations c ON c.response_id = r.id
            WHERE r.surveybot_id = ?1
            ORDER BY r.created_at, r.rowid
            "#,
        )?;
        let rows = stmt.query_map(params![surveybot_id], |row| {
            let created_at: String = row.get(4)?;
            let conversation: Option<String> = row.get(5)?;
            let conversation = conversation
                .map(|raw| serde_json::from_str::<Transcript>(&raw))
                .transpose()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

            Ok(ResponseRecord {
                id: row.get(0)?,
                surveybot_id: row.get(1)?,
                respondent_id: row.get(2)?,
                completed: row.get(3)?,
                created_at: parse_timestamp(&created_at),
                answers: Vec::new(),
                conversation,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            let mut record = row?;
            record.answers = self.answers(&record.id)?;
            records.push(record);
        }
        Ok(records)
    }

    fn answers(&self, response_id: &str) -> Result<Vec<AnswerRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, question_id, question_text, raw_answer, interpreted_answer, created_at, updated_at
            FROM survey_answers WHERE response_id = ?1 ORDER BY rowid
            "#,
        )?;
        let rows = stmt.query_map(params![response_id], |row| {
            let created_at: String = row.get(5)?;
            let updated_at: String = row.get(6)?;
            Ok(AnswerRow {
                id: row.get(0)?,
                question_id: row.get(1)?,
                question_text: row.get(2)?,
                raw_answer: row.get(3)?,
                interpreted_answer: row.get(4)?,
                created_at: parse_timestamp(&created_at),
                updated_at: parse_timestamp(&updated_at),
            })
        })?;

        let mut answers = Vec::new();
        for row in rows {
            answers.push(row?);
        }
        Ok(answers)
    }
}

fn insert_response(
    conn: &Connection,
    response_id: &str,
    surveybot_id: &str,
    respondent_id: Option<&str>,
    now: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO survey_responses (id, surveybot_id, respondent_id, completed, created_at) VALUES (?1, ?2, ?3, 1, ?4)",
        params![response_id, surveybot_id, respondent_id, now],
    )?;
    Ok(())
}

fn insert_answer(
    conn: &Connection,
    response_id: &str,
    question_id: &str,
    question_text: &str,
    raw_answer: &str,
    interpreted_answer: Option<&str>,
    now: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        r#"
        INSERT INTO survey_answers (id, response_id, question_id, question_text, raw_answer, interpreted_answer, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        "#,
        params![new_id(), response_id, question_id, question_text, raw_answer, interpreted_answer, now],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;
    use surveybot_core::{compile, Transcript, Turn};

    use crate::{Database, DbError, QuestionDraft, SurveyDraft, SurveyRecord};

    fn create_survey(db: &Database) -> SurveyRecord {
        let question = |text: &str, order_number| QuestionDraft {
            id: None,
            question_text: text.to_string(),
            question_type: "short_answer".to_string(),
            options: None,
            order_number,
            guidance: None,
            answer_criteria: None,
        };
        db.surveys()
            .unwrap()
            .create(&SurveyDraft {
                name: "Two Questions".to_string(),
                instructions: None,
                questions: vec![question("Question one?", 1), question("Question two?", 2)],
            })
            .unwrap()
    }

    fn finished_transcript() -> Transcript {
        Transcript::from(vec![
            Turn::assistant("Hi"),
            Turn::respondent("Alice"),
            Turn::assistant("Question one?"),
            Turn::respondent("answer1"),
            Turn::assistant("Question two?"),
            Turn::respondent("answer2"),
            Turn::assistant("Thanks!"),
        ])
    }

    #[test]
    fn test_record_result_writes_bundle() {
        let db = Database::open_in_memory().unwrap();
        let record = create_survey(&db);
        let survey = record.definition().unwrap();
        let bundle = compile(&survey, &finished_transcript(), &BTreeMap::new());

        let response_id = db
            .responses()
            .unwrap()
            .record_result(&survey, Some("resp-1"), &bundle)
            .unwrap();

        let results = db.responses().unwrap().results(&record.id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, response_id);
        assert!(results[0].completed);
        assert_eq!(results[0].respondent_id.as_deref(), Some("resp-1"));
        assert_eq!(results[0].answers.len(), 2);
        assert_eq!(results[0].answers[0].raw_answer, "answer1");
        assert_eq!(results[0].answers[1].raw_answer, "answer2");
        assert_eq!(results[0].conversation.as_ref().unwrap().len(), 7);
    }

    #[test]
    fn test_record_result_is_all_or_nothing() {
        let db = Database::open_in_memory().unwrap();
        let record = create_survey(&db);
        let survey = record.definition().unwrap();
        let second = survey.question(1).unwrap().id.clone();

        db.conn
            .lock()
            .unwrap()
            .execute_batch(&format!(
                "CREATE TRIGGER fail_second BEFORE INSERT ON survey_answers \
                 WHEN NEW.question_id = '{}' BEGIN SELECT RAISE(ABORT, 'boom'); END;",
                second
            ))
            .unwrap();

        let bundle = compile(&survey, &finished_transcript(), &BTreeMap::new());
        let result = db.responses().unwrap().record_result(&survey, None, &bundle);
        assert!(matches!(result, Err(DbError::Sqlite(_))));

        assert!(db.responses().unwrap().results(&record.id).unwrap().is_empty());
        let answers: i64 = db
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM survey_answers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(answers, 0);
    }

    #[test]
    fn test_submit_answers_validates_every_key() {
        let db = Database::open_in_memory().unwrap();
        let record = create_survey(&db);
        let q1 = record.questions[0].id.clone();

        let bad_key = json!({ q1.clone(): "yes", "not-a-question": "no" });
        let result = db
            .responses()
            .unwrap()
            .submit_answers(&record.id, None, bad_key.as_object().unwrap());
        assert!(matches!(result, Err(DbError::Validation(_))));

        let bad_value = json!({ q1.clone(): 42 });
        let result = db
            .responses()
            .unwrap()
            .submit_answers(&record.id, None, bad_value.as_object().unwrap());
        assert!(matches!(result, Err(DbError::Validation(_))));
        assert!(db.responses().unwrap().results(&record.id).unwrap().is_empty());

        let good = json!({ q1.clone(): "yes" });
        db.responses()
            .unwrap()
            .submit_answers(&record.id, Some("r1"), good.as_object().unwrap())
            .unwrap();
        let results = db.responses().unwrap().results(&record.id).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].answers[0].question_id, q1);
        assert!(results[0].conversation.is_none());
    }

    #[test]
    fn test_submit_to_missing_survey() {
        let db = Database::open_in_memory().unwrap();
        let answers = serde_json::Map::new();
        let result = db.responses().unwrap().submit_answers("missing", None, &answers);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_delete_survey_cascades() {
        let db = Database::open_in_memory().unwrap();
        let record = create_survey(&db);
        let survey = record.definition().unwrap();
        let bundle = compile(&survey, &finished_transcript(), &BTreeMap::new());
        db.responses().unwrap().record_result(&survey, None, &bundle).unwrap();

        db.surveys().unwrap().delete(&record.id).unwrap();

        let conn = db.conn.lock().unwrap();
        let count = |table: &str| -> i64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count("survey_responses"), 0);
        assert_eq!(count("survey_answers"), 0);
        assert_eq!(count("survey_conversations"), 0);
        assert_eq!(count("survey_questions"), 0);
    }
}
