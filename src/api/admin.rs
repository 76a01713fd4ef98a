use axum::{extract::State, http::HeaderMap, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::api::routes::UsernameRequest;
use crate::api::{ApiError, AppState};
use crate::models::{Fixture, Odds, Ticket};

/// Every ticket in the system, newest first
pub async fn all_bets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AllBetsResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let bets = state.tickets.list_tickets().await?;
    Ok(Json(AllBetsResponse {
        success: true,
        bets,
    }))
}

/// Delete a user's ticket so they can bet again
pub async fn reset_player(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UsernameRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let username = req.username()?;
    state.tickets.delete_by_username(username).await?;
    info!("Reset player {}", username);

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Player {username} has been reset successfully"),
    }))
}

/// Report a final score. The fixture write commits first, then exactly one
/// settlement pass runs over the tickets holding a leg on this fixture.
pub async fn update_match_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MatchResultRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let (home_score, away_score) = req.scores()?;
    let fixture = state
        .fixtures
        .set_result(req.match_id, home_score, away_score)
        .await?;

    match state.engine.settle_for_fixture(req.match_id).await {
        Ok(summary) => info!(
            "Match {} finished {}-{}: settled {} tickets ({} won, {} lost, {} failed)",
            req.match_id,
            home_score,
            away_score,
            summary.settled,
            summary.won,
            summary.lost,
            summary.failed,
        ),
        // The result is durable; the periodic sweep will settle what this
        // pass could not read
        Err(e) => error!("Settlement after match {} failed: {}", req.match_id, e),
    }

    Ok(Json(MatchResponse {
        success: true,
        message: "Match result updated successfully".to_string(),
        r#match: fixture,
    }))
}

/// Replace a fixture's live odds; submitted tickets are unaffected
pub async fn update_odds(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateOddsRequest>,
) -> Result<Json<MatchResponse>, ApiError> {
    require_admin(&state, &headers)?;

    let fixture = state.fixtures.set_odds(req.match_id, req.odds).await?;

    Ok(Json(MatchResponse {
        success: true,
        message: "Odds updated successfully".to_string(),
        r#match: fixture,
    }))
}

/// Check the x-admin-token header when an admin token is configured
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(());
    };

    let supplied = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok());
    if supplied == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResultRequest {
    pub match_id: i64,
    pub home_score: i64,
    pub away_score: i64,
}

impl MatchResultRequest {
    /// Scores must be non-negative integers
    fn scores(&self) -> Result<(u32, u32), ApiError> {
        let parse = |label: &str, value: i64| -> Result<u32, ApiError> {
            u32::try_from(value).map_err(|_| {
                ApiError::BadRequest(format!("{label} score must be non-negative, got {value}"))
            })
        };
        Ok((
            parse("home", self.home_score)?,
            parse("away", self.away_score)?,
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOddsRequest {
    pub match_id: i64,
    pub odds: Odds,
}

#[derive(Serialize)]
pub struct AllBetsResponse {
    pub success: bool,
    pub bets: Vec<Ticket>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct MatchResponse {
    pub success: bool,
    pub message: String,
    pub r#match: Fixture,
}
