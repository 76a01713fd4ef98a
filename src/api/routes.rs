use axum::{extract::State, response::Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState};
use crate::error::Error;
use crate::models::{Fixture, Outcome, Selection, Ticket};

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Server is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Full fixture slate in matchId order
pub async fn get_matches(
    State(state): State<AppState>,
) -> Result<Json<MatchesResponse>, ApiError> {
    let matches = state.fixtures.list_fixtures().await?;
    Ok(Json(MatchesResponse {
        success: true,
        matches,
    }))
}

/// Whether a username already holds a ticket
pub async fn check_user(
    State(state): State<AppState>,
    Json(req): Json<UsernameRequest>,
) -> Result<Json<CheckUserResponse>, ApiError> {
    let username = req.username()?;
    let ticket = state.tickets.get_ticket_by_username(username).await?;

    Ok(Json(CheckUserResponse {
        success: true,
        has_bet: ticket.is_some(),
        ticket,
    }))
}

/// Submit an 8-leg parlay. Odds are captured from the current slate, so a
/// later odds update never changes an existing ticket.
pub async fn submit_bet(
    State(state): State<AppState>,
    Json(req): Json<SubmitBetRequest>,
) -> Result<Json<TicketResponse>, ApiError> {
    let username = req.username()?;

    let mut selections = Vec::with_capacity(req.bets.len());
    for leg in &req.bets {
        let fixture = state
            .fixtures
            .get_fixture(leg.match_id)
            .await
            .map_err(reference_error)?;
        selections.push(Selection {
            match_id: leg.match_id,
            chosen_outcome: leg.outcome,
            odds_at_submission: fixture.odds.for_outcome(leg.outcome),
        });
    }
    Ticket::validate_selections(&selections)?;

    let ticket = Ticket::new(username.to_string(), selections);
    state.tickets.insert_ticket(&ticket).await?;

    Ok(Json(TicketResponse {
        success: true,
        message: "Bet submitted successfully".to_string(),
        ticket,
    }))
}

/// Tickets held by a username (zero or one)
pub async fn search_ticket(
    State(state): State<AppState>,
    Json(req): Json<UsernameRequest>,
) -> Result<Json<SearchTicketResponse>, ApiError> {
    let username = req.username()?;
    let tickets = state
        .tickets
        .get_ticket_by_username(username)
        .await?
        .into_iter()
        .collect();

    Ok(Json(SearchTicketResponse {
        success: true,
        tickets,
    }))
}

/// A submission referencing an unknown fixture is a bad request, not a 404
fn reference_error(err: Error) -> ApiError {
    match err {
        Error::FixtureNotFound(match_id) => {
            ApiError::BadRequest(format!("bet references unknown match {match_id}"))
        }
        other => other.into(),
    }
}

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    pub username: Option<String>,
}

impl UsernameRequest {
    /// Reject missing or blank usernames
    pub fn username(&self) -> Result<&str, ApiError> {
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ApiError::BadRequest("Username is required".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitBetRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub bets: Vec<BetLeg>,
}

impl SubmitBetRequest {
    fn username(&self) -> Result<&str, ApiError> {
        match self.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(ApiError::BadRequest("Username is required".to_string())),
        }
    }
}

/// One leg of a submission; `type` matches the frontend field name
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetLeg {
    pub match_id: i64,
    #[serde(rename = "type")]
    pub outcome: Outcome,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct MatchesResponse {
    pub success: bool,
    pub matches: Vec<Fixture>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserResponse {
    pub success: bool,
    pub has_bet: bool,
    pub ticket: Option<Ticket>,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub success: bool,
    pub message: String,
    pub ticket: Ticket,
}

#[derive(Serialize)]
pub struct SearchTicketResponse {
    pub success: bool,
    pub tickets: Vec<Ticket>,
}
