//! Chatbot store.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;
use tracing::info;

use surveybot_core::ChatbotProfile;

use crate::{new_id, new_token, parse_timestamp, DbError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChatbot {
    pub name: String,
    #[serde(default)]
    pub documents: Vec<String>,
}

/// A stored chatbot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotRecord {
    pub id: String,
    pub name: String,
    pub token: String,
    pub documents: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ChatbotRecord {
    pub fn profile(&self) -> ChatbotProfile {
        ChatbotProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            token: self.token.clone(),
            documents: self.documents.clone(),
        }
    }
}

/// Chatbot store with a borrowed connection.
pub struct Chatbots<'db> {
    conn: MutexGuard<'db, Connection>,
}

impl<'db> Chatbots<'db> {
    pub(crate) fn new(conn: MutexGuard<'db, Connection>) -> Self {
        Self { conn }
    }

    pub fn create(&self, new: &NewChatbot) -> Result<ChatbotRecord, DbError> {
        if new.name.trim().is_empty() {
            return Err(DbError::Validation("chatbot name must not be empty".to_string()));
        }

        let record = ChatbotRecord {
            id: new_id(),
            name: new.name.clone(),
            token: new_token(),
            documents: new.documents.clone(),
            created_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT INTO chatbots (id, name, token, documents, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.name,
                record.token,
                serde_json::to_string(&record.documents)?,
                record.created_at.to_rfc3339(),
            ],
        )?;

        info!(chatbot = %record.id, documents = record.documents.len(), "Created chatbot");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<Option<ChatbotRecord>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, token, documents, created_at FROM chatbots WHERE id = ?1",
                params![id],
                Self::row_to_record,
            )
            .optional()?)
    }

    pub fn get_by_token(&self, token: &str) -> Result<Option<ChatbotRecord>, DbError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, token, documents, created_at FROM chatbots WHERE token = ?1",
                params![token],
                Self::row_to_record,
            )
            .optional()?)
    }

    pub fn list(&self) -> Result<Vec<ChatbotRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, token, documents, created_at FROM chatbots ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn delete(&self, id: &str) -> Result<bool, DbError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM chatbots WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<ChatbotRecord, rusqlite::Error> {
        let documents: String = row.get(3)?;
        let created_at: String = row.get(4)?;

        Ok(ChatbotRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            token: row.get(2)?,
            documents: serde_json::from_str(&documents)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
            created_at: parse_timestamp(&created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbError, NewChatbot};

    #[test]
    fn test_create_get_and_lookup_by_token() {
        let db = Database::open_in_memory().unwrap();
        let created = db
            .chatbots()
            .unwrap()
            .create(&NewChatbot {
                name: "Tea Expert".into(),
                documents: vec!["https://example.com/tea.txt".into(), "notes/tea.md".into()],
            })
            .unwrap();

        let fetched = db.chatbots().unwrap().get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.documents.len(), 2);

        let by_token = db.chatbots().unwrap().get_by_token(&created.token).unwrap().unwrap();
        let profile = by_token.profile();
        assert_eq!(profile.name, "Tea Expert");
        assert_eq!(profile.documents[1], "notes/tea.md");
    }

    #[test]
    fn test_rejects_blank_name() {
        let db = Database::open_in_memory().unwrap();
        let result = db.chatbots().unwrap().create(&NewChatbot {
            name: "  ".into(),
            documents: vec![],
        });
        assert!(matches!(result, Err(DbError::Validation(_))));
    }

    #[test]
    fn test_list_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let store = db.chatbots().unwrap();
        let a = store
            .create(&NewChatbot {
                name: "A".into(),
                documents: vec![],
            })
            .unwrap();
        store
            .create(&NewChatbot {
                name: "B".into(),
                documents: vec![],
            })
            .unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        assert!(store.delete(&a.id).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.get(&a.id).unwrap().is_none());
    }
}
