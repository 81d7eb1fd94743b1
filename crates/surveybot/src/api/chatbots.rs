use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use surveybot_core::ChatResponder;
use surveybot_db::{ChatbotRecord, NewChatbot};

use super::{db_error, not_found, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

pub async fn create_chatbot(
    State(state): State<AppState>,
    Json(new): Json<NewChatbot>,
) -> Result<(StatusCode, Json<ChatbotRecord>), ApiError> {
    let record = state
        .db
        .chatbots()
        .map_err(db_error)?
        .create(&new)
        .map_err(db_error)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_chatbots(
    State(state): State<AppState>,
) -> Result<Json<Vec<ChatbotRecord>>, ApiError> {
    let records = state.db.chatbots().map_err(db_error)?.list().map_err(db_error)?;
    Ok(Json(records))
}

pub async fn get_chatbot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatbotRecord>, ApiError> {
    state
        .db
        .chatbots()
        .map_err(db_error)?
        .get(&id)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Chatbot", &id))
}

pub async fn get_chatbot_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ChatbotRecord>, ApiError> {
    state
        .db
        .chatbots()
        .map_err(db_error)?
        .get_by_token(&token)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Chatbot", &token))
}

pub async fn delete_chatbot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.db.chatbots().map_err(db_error)?.delete(&id).map_err(db_error)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Chatbot", &id))
    }
}

pub async fn chat(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let record = state
        .db
        .chatbots()
        .map_err(db_error)?
        .get_by_token(&token)
        .map_err(db_error)?
        .ok_or_else(|| not_found("Chatbot", &token))?;

    let responder = ChatResponder::new(state.completion.as_ref(), state.documents.as_ref())
        .with_options(state.options);
    let reply = responder.respond(&record.profile(), &request.message).await;

    Ok(Json(ChatReply { reply }))
}
