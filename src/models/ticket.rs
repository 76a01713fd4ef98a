use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::Outcome;

/// Number of legs every parlay ticket must carry
pub const REQUIRED_LEGS: usize = 8;

/// Settlement state of a ticket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Awaiting a settlement pass
    Pending,
    /// Every leg matched its fixture's outcome
    Won,
    /// At least one leg failed to match
    Lost,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Won => "won",
            TicketStatus::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(TicketStatus::Pending),
            "won" => Ok(TicketStatus::Won),
            "lost" => Ok(TicketStatus::Lost),
            other => Err(Error::Validation(format!(
                "invalid ticket status '{other}'"
            ))),
        }
    }
}

/// One leg of a parlay ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Fixture this leg predicts
    pub match_id: i64,

    pub chosen_outcome: Outcome,

    /// Odds captured at submission time; immutable afterwards
    pub odds_at_submission: f64,
}

/// Outcome of the last settlement pass over a ticket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Legs whose finished fixture matched the chosen outcome
    pub correct_count: u32,

    /// Always the full leg count, regardless of how many fixtures finished
    pub total_count: u32,

    pub is_winner: bool,
}

impl Settlement {
    /// State before any settlement pass has run
    pub fn unsettled(leg_count: usize) -> Self {
        Self {
            correct_count: 0,
            total_count: leg_count as u32,
            is_winner: false,
        }
    }
}

/// A user's all-or-nothing parlay bet across the slate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Opaque unique token generated at submission
    pub ticket_id: String,

    /// At most one ticket exists per username
    pub username: String,

    pub selections: Vec<Selection>,

    /// Product of all submission-time leg odds; immutable
    pub combined_odds: f64,

    pub status: TicketStatus,

    pub settlement: Settlement,

    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Build a fresh pending ticket, computing combined odds from the legs
    pub fn new(username: String, selections: Vec<Selection>) -> Self {
        let combined_odds = selections
            .iter()
            .map(|s| s.odds_at_submission)
            .product();
        let settlement = Settlement::unsettled(selections.len());

        Self {
            ticket_id: uuid::Uuid::new_v4().to_string(),
            username,
            selections,
            combined_odds,
            status: TicketStatus::Pending,
            settlement,
            created_at: Utc::now(),
        }
    }

    /// Validate a submission's legs: exact leg count, distinct fixtures
    pub fn validate_selections(selections: &[Selection]) -> Result<(), Error> {
        if selections.len() != REQUIRED_LEGS {
            return Err(Error::Validation(format!(
                "a ticket must have exactly {REQUIRED_LEGS} legs, got {}",
                selections.len()
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for selection in selections {
            if !seen.insert(selection.match_id) {
                return Err(Error::Validation(format!(
                    "duplicate leg for match {}",
                    selection.match_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(match_id: i64, odds: f64) -> Selection {
        Selection {
            match_id,
            chosen_outcome: Outcome::Home,
            odds_at_submission: odds,
        }
    }

    #[test]
    fn combined_odds_is_product_of_legs() {
        let legs: Vec<Selection> = (1..=8).map(|id| leg(id, 2.0)).collect();
        let ticket = Ticket::new("alice".to_string(), legs);

        assert_eq!(ticket.combined_odds, 256.0);
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.settlement, Settlement::unsettled(8));
    }

    #[test]
    fn rejects_wrong_leg_count() {
        let legs: Vec<Selection> = (1..=7).map(|id| leg(id, 2.0)).collect();
        assert!(Ticket::validate_selections(&legs).is_err());
    }

    #[test]
    fn rejects_duplicate_legs() {
        let mut legs: Vec<Selection> = (1..=7).map(|id| leg(id, 2.0)).collect();
        legs.push(leg(3, 1.5));
        assert!(Ticket::validate_selections(&legs).is_err());
    }

    #[test]
    fn accepts_full_distinct_slate() {
        let legs: Vec<Selection> = (1..=8).map(|id| leg(id, 2.0)).collect();
        assert!(Ticket::validate_selections(&legs).is_ok());
    }
}
