use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Three-way result of a fixture, derived from the final score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    /// Derive the outcome from a final score
    pub fn from_scores(home_score: u32, away_score: u32) -> Self {
        if home_score > away_score {
            Outcome::Home
        } else if home_score < away_score {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Home => "home",
            Outcome::Draw => "draw",
            Outcome::Away => "away",
        }
    }

    /// Parse a wire/database value, rejecting anything unknown
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "home" => Ok(Outcome::Home),
            "draw" => Ok(Outcome::Draw),
            "away" => Ok(Outcome::Away),
            other => Err(Error::Validation(format!(
                "invalid outcome '{other}', expected home, draw or away"
            ))),
        }
    }
}

/// Decimal odds for the three outcomes of a fixture
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Odds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Odds {
    /// Reject zero, negative or non-finite odds
    pub fn validate(&self) -> Result<(), Error> {
        for (label, value) in [
            ("home", self.home),
            ("draw", self.draw),
            ("away", self.away),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::Validation(format!(
                    "{label} odds must be a positive number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Odds for one specific outcome
    pub fn for_outcome(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

/// Final result of a finished fixture
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureResult {
    pub home_score: u32,

    pub away_score: u32,

    /// Derived from the scores, never user-supplied
    pub outcome: Outcome,

    /// One-way latch: set by the result report, never cleared
    pub is_finished: bool,
}

/// A scheduled match with odds and an eventual result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Stable identifier assigned at creation; immutable
    pub match_id: i64,

    pub home_team: String,

    pub away_team: String,

    /// Informational only; submission is not gated on kickoff time
    pub start_time: DateTime<Utc>,

    /// Mutable until the fixture is finished
    pub odds: Odds,

    /// Present once a result has been reported
    pub result: Option<FixtureResult>,

    pub created_at: DateTime<Utc>,
}

impl Fixture {
    pub fn is_finished(&self) -> bool {
        self.result.map(|r| r.is_finished).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_scores() {
        assert_eq!(Outcome::from_scores(2, 0), Outcome::Home);
        assert_eq!(Outcome::from_scores(0, 3), Outcome::Away);
        assert_eq!(Outcome::from_scores(1, 1), Outcome::Draw);
        assert_eq!(Outcome::from_scores(0, 0), Outcome::Draw);
    }

    #[test]
    fn outcome_parse_round_trip() {
        for outcome in [Outcome::Home, Outcome::Draw, Outcome::Away] {
            assert_eq!(Outcome::parse(outcome.as_str()).unwrap(), outcome);
        }
        assert!(Outcome::parse("win").is_err());
    }

    #[test]
    fn odds_validation() {
        let good = Odds {
            home: 2.10,
            draw: 3.40,
            away: 3.20,
        };
        assert!(good.validate().is_ok());

        let zero = Odds { home: 0.0, ..good };
        assert!(zero.validate().is_err());

        let negative = Odds {
            away: -1.5,
            ..good
        };
        assert!(negative.validate().is_err());

        let nan = Odds {
            draw: f64::NAN,
            ..good
        };
        assert!(nan.validate().is_err());
    }
}
