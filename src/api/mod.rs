mod admin;
mod routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::{FixtureStore, TicketStore};
use crate::error::Error;
use crate::settlement::SettlementEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub fixtures: FixtureStore,
    pub tickets: TicketStore,
    pub engine: SettlementEngine,
    /// When set, mutating admin endpoints require a matching x-admin-token
    pub admin_token: Option<String>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health_check))
        .route("/api/matches", get(routes::get_matches))
        .route("/api/check-user", post(routes::check_user))
        .route("/api/submit-bet", post(routes::submit_bet))
        .route("/api/search-ticket", post(routes::search_ticket))
        .route("/api/all-bets", get(admin::all_bets))
        .route("/api/reset-player", post(admin::reset_player))
        .route("/api/update-match-result", post(admin::update_match_result))
        .route("/api/update-odds", post(admin::update_odds))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized,
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::FixtureNotFound(_) | Error::TicketNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            Error::Store(_) => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "admin token missing or invalid".to_string(),
            ),
            ApiError::Internal(err) => {
                tracing::error!("Store error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}
