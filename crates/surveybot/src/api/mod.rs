mod chatbots;
mod surveybots;

use std::sync::Arc;

use axum::http::{HeaderValue, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use surveybot_completion::{CompletionClient, CompletionOptions};
use surveybot_db::{Database, DbError};
use surveybot_documents::DocumentSource;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub completion: Arc<dyn CompletionClient>,
    pub documents: Arc<dyn DocumentSource>,
    pub options: CompletionOptions,
}

pub type ApiError = (StatusCode, String);

pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let api = Router::new()
        .route(
            "/surveybots",
            get(surveybots::list_surveybots).post(surveybots::create_surveybot),
        )
        .route(
            "/surveybots/token/{token}",
            get(surveybots::get_surveybot_by_token),
        )
        .route(
            "/surveybots/{id}",
            get(surveybots::get_surveybot)
                .put(surveybots::update_surveybot)
                .delete(surveybots::delete_surveybot),
        )
        .route("/surveybots/{id}/results", get(surveybots::get_results))
        .route("/surveybots/{id}/submit", post(surveybots::submit_answers))
        .route("/surveybots/{id}/chat", post(surveybots::chat_turn))
        .route(
            "/chatbots",
            get(chatbots::list_chatbots).post(chatbots::create_chatbot),
        )
        .route(
            "/chatbots/by-token/{token}",
            get(chatbots::get_chatbot_by_token),
        )
        .route(
            "/chatbots/{id}",
            get(chatbots::get_chatbot).delete(chatbots::delete_chatbot),
        )
        .route("/chat/{token}", post(chatbots::chat));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn db_error(e: DbError) -> ApiError {
    match e {
        DbError::Validation(_) | DbError::Survey(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        DbError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        _ => {
            error!(error = %e, "Database error");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn not_found(what: &str, id: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{} not found: {}", what, id))
}
