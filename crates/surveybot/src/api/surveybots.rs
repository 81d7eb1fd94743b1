//! Survey bot endpoints: management, results, direct submission and the
//! conversational turn.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use surveybot_core::{compile, SurveyEngine, Transcript, TurnOutcome, FALLBACK_REPLY};
use surveybot_db::{ResponseRecord, SurveyDraft, SurveyRecord};

use super::{db_error, not_found, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation: Transcript,
    #[serde(default)]
    pub respondent_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatTurnResponse {
    pub message: String,
    /// Present only when the reply re-poses the previous question
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hold: bool,
    /// Present only when the turn failed and closed the survey
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub closed: bool,
    pub survey_complete: bool,
}

impl ChatTurnResponse {
    fn fallback() -> Self {
        Self {
            message: FALLBACK_REPLY.to_string(),
            hold: false,
            closed: true,
            survey_complete: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    pub respondent_id: Option<String>,
}

pub async fn create_surveybot(
    State(state): State<AppState>,
    Json(draft): Json<SurveyDraft>,
) -> Result<(StatusCode, Json<SurveyRecord>), ApiError> {
    let record = state
        .db
        .surveys()
        .map_err(db_error)?
        .create(&draft)
        .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_surveybots(
    State(state): State<AppState>,
) -> Result<Json<Vec<SurveyRecord>>, ApiError> {
    let records = state.db.surveys().map_err(db_error)?.list().map_err(db_error)?;
    Ok(Json(records))
}

pub async fn get_surveybot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SurveyRecord>, ApiError> {
    load_survey(&state, &id).map(Json)
}

pub async fn get_surveybot_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SurveyRecord>, ApiError> {
    state
        .db
        .surveys()
        .map_err(db_error)?
        .get_by_token(&token)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Survey bot", &token))
}

pub async fn update_surveybot(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<SurveyDraft>,
) -> Result<Json<SurveyRecord>, ApiError> {
    state
        .db
        .surveys()
        .map_err(db_error)?
        .update(&id, &draft)
        .map_err(db_error)?
        .map(Json)
        .ok_or_else(|| not_found("Survey bot", &id))
}

pub async fn delete_surveybot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.db.surveys().map_err(db_error)?.delete(&id).map_err(db_error)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Survey bot", &id))
    }
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ResponseRecord>>, ApiError> {
    load_survey(&state, &id)?;
    let results = state
        .db
        .responses()
        .map_err(db_error)?
        .results(&id)
        .map_err(db_error)?;
    Ok(Json(results))
}

pub async fn submit_answers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SubmitParams>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let Value::Object(answers) = body else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Answers must be an object of question id to answer".to_string(),
        ));
    };

    state
        .db
        .responses()
        .map_err(db_error)?
        .submit_answers(&id, params.respondent_id.as_deref(), &answers)
        .map_err(db_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// One conversational turn. An empty conversation yields the greeting.
///
/// Completion failures answer with the fallback message, `closed` and a
/// finished survey; clients echo `closed` on the appended turn so later
/// messages replay as already complete. Only a failed result write is
/// reported as an error.
pub async fn chat_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, ApiError> {
    let record = load_survey(&state, &id)?;
    let survey = match record.definition() {
        Ok(survey) => survey,
        Err(e) => {
            error!(surveybot = %id, error = %e, "Stored survey is invalid");
            return Ok(Json(ChatTurnResponse::fallback()));
        }
    };

    let engine = SurveyEngine::new(state.completion.as_ref()).with_options(state.options);

    if request.conversation.is_empty() {
        return match engine.initial_greeting(&survey).await {
            Ok(greeting) => Ok(Json(ChatTurnResponse {
                message: greeting,
                hold: false,
                closed: false,
                survey_complete: false,
            })),
            Err(e) => {
                error!(surveybot = %id, error = %e, "Failed to generate greeting");
                Ok(Json(ChatTurnResponse::fallback()))
            }
        };
    }

    let advance = match engine
        .advance(&survey, &request.conversation, &request.message)
        .await
    {
        Ok(advance) => advance,
        Err(e) => {
            warn!(surveybot = %id, error = %e, "Turn failed");
            return Ok(Json(ChatTurnResponse::fallback()));
        }
    };

    if advance.outcome == TurnOutcome::Completed {
        let mut full = request.conversation.clone();
        full.push_respondent(request.message.as_str());
        full.push(advance.turn());

        let bundle = compile(&survey, &full, &advance.interpreted_answers);
        let response_id = state
            .db
            .responses()
            .map_err(db_error)?
            .record_result(&survey, request.respondent_id.as_deref(), &bundle)
            .map_err(db_error)?;
        info!(surveybot = %id, response = %response_id, "Survey conversation stored");
    }

    Ok(Json(ChatTurnResponse {
        survey_complete: advance.is_complete(),
        hold: advance.hold,
        closed: advance.is_aborted(),
        message: advance.reply,
    }))
}

fn load_survey(state: &AppState, id: &str) -> Result<SurveyRecord, ApiError> {
    state
        .db
        .surveys()
        .map_err(db_error)?
        .get(id)
        .map_err(db_error)?
        .ok_or_else(|| not_found("Survey bot", id))
}
