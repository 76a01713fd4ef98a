use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{Fixture, FixtureResult, Odds, Outcome};

/// SQLite store for the fixture slate
#[derive(Clone)]
pub struct FixtureStore {
    pool: Pool<Sqlite>,
}

impl FixtureStore {
    /// Create the store and initialize its schema
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fixtures (
                match_id INTEGER PRIMARY KEY,
                home_team TEXT NOT NULL,
                away_team TEXT NOT NULL,
                start_time TEXT NOT NULL,
                odds_home REAL NOT NULL,
                odds_draw REAL NOT NULL,
                odds_away REAL NOT NULL,
                home_score INTEGER,
                away_score INTEGER,
                outcome TEXT,
                is_finished INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_fixtures_finished
            ON fixtures (is_finished)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All fixtures in slate order
    pub async fn list_fixtures(&self) -> Result<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>(
            "SELECT * FROM fixtures ORDER BY match_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Fixture::from).collect())
    }

    /// Look up a single fixture
    pub async fn get_fixture(&self, match_id: i64) -> Result<Fixture> {
        let row = sqlx::query_as::<_, FixtureRow>(
            "SELECT * FROM fixtures WHERE match_id = ?",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Fixture::from)
            .ok_or(Error::FixtureNotFound(match_id))
    }

    /// Fixtures with a reported result
    pub async fn get_finished_fixtures(&self) -> Result<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>(
            "SELECT * FROM fixtures WHERE is_finished = 1 ORDER BY match_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Fixture::from).collect())
    }

    /// Report a final score, deriving the outcome and latching the fixture
    /// finished. The single UPDATE commits before settlement reads it.
    pub async fn set_result(
        &self,
        match_id: i64,
        home_score: u32,
        away_score: u32,
    ) -> Result<Fixture> {
        let existing = self.get_fixture(match_id).await?;
        if existing.is_finished() {
            warn!("Match {} already finished; overwriting its score", match_id);
        }

        let outcome = Outcome::from_scores(home_score, away_score);

        sqlx::query(
            r#"
            UPDATE fixtures
            SET home_score = ?, away_score = ?, outcome = ?, is_finished = 1
            WHERE match_id = ?
            "#,
        )
        .bind(home_score)
        .bind(away_score)
        .bind(outcome.as_str())
        .bind(match_id)
        .execute(&self.pool)
        .await?;

        self.get_fixture(match_id).await
    }

    /// Replace a fixture's odds. Tickets keep their submission-time odds.
    pub async fn set_odds(&self, match_id: i64, odds: Odds) -> Result<Fixture> {
        odds.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE fixtures
            SET odds_home = ?, odds_draw = ?, odds_away = ?
            WHERE match_id = ?
            "#,
        )
        .bind(odds.home)
        .bind(odds.draw)
        .bind(odds.away)
        .bind(match_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::FixtureNotFound(match_id));
        }

        self.get_fixture(match_id).await
    }

    async fn insert_fixture(&self, fixture: &Fixture) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fixtures (
                match_id, home_team, away_team, start_time,
                odds_home, odds_draw, odds_away, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(fixture.match_id)
        .bind(&fixture.home_team)
        .bind(&fixture.away_team)
        .bind(fixture.start_time.to_rfc3339())
        .bind(fixture.odds.home)
        .bind(fixture.odds.draw)
        .bind(fixture.odds.away)
        .bind(fixture.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Seed the reference 8-match slate when the table is empty
    pub async fn seed_default_slate(&self) -> Result<()> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fixtures")
            .fetch_one(&self.pool)
            .await?;

        if count > 0 {
            return Ok(());
        }

        for fixture in default_slate() {
            self.insert_fixture(&fixture).await?;
        }
        info!("Seeded default fixture slate");

        Ok(())
    }
}

/// The sample slate the service boots with
fn default_slate() -> Vec<Fixture> {
    let slate = [
        (1, "Manchester United", "Liverpool", "2025-07-12T15:00:00Z", 2.10, 3.40, 3.20),
        (2, "Barcelona", "Real Madrid", "2025-07-12T18:00:00Z", 2.50, 3.10, 2.80),
        (3, "Bayern Munich", "Borussia Dortmund", "2025-07-12T20:00:00Z", 1.80, 3.60, 4.20),
        (4, "PSG", "Lyon", "2025-07-13T15:00:00Z", 1.70, 3.80, 4.50),
        (5, "Juventus", "AC Milan", "2025-07-13T18:00:00Z", 2.20, 3.30, 3.10),
        (6, "Chelsea", "Arsenal", "2025-07-13T20:00:00Z", 2.60, 3.20, 2.70),
        (7, "Atletico Madrid", "Sevilla", "2025-07-14T15:00:00Z", 2.00, 3.50, 3.60),
        (8, "Inter Milan", "Napoli", "2025-07-14T18:00:00Z", 2.40, 3.25, 2.90),
    ];

    slate
        .into_iter()
        .map(|(match_id, home, away, start, h, d, a)| Fixture {
            match_id,
            home_team: home.to_string(),
            away_team: away.to_string(),
            start_time: DateTime::parse_from_rfc3339(start)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            odds: Odds {
                home: h,
                draw: d,
                away: a,
            },
            result: None,
            created_at: Utc::now(),
        })
        .collect()
}

/// Database row representation
#[derive(sqlx::FromRow)]
struct FixtureRow {
    match_id: i64,
    home_team: String,
    away_team: String,
    start_time: String,
    odds_home: f64,
    odds_draw: f64,
    odds_away: f64,
    home_score: Option<i64>,
    away_score: Option<i64>,
    outcome: Option<String>,
    is_finished: i64,
    created_at: String,
}

impl From<FixtureRow> for Fixture {
    fn from(row: FixtureRow) -> Self {
        let result = match (row.is_finished != 0, row.home_score, row.away_score) {
            (true, Some(home), Some(away)) => {
                let home = home.max(0) as u32;
                let away = away.max(0) as u32;
                let outcome = row
                    .outcome
                    .as_deref()
                    .and_then(|s| Outcome::parse(s).ok())
                    .unwrap_or_else(|| Outcome::from_scores(home, away));
                Some(FixtureResult {
                    home_score: home,
                    away_score: away,
                    outcome,
                    is_finished: true,
                })
            }
            _ => None,
        };

        Fixture {
            match_id: row.match_id,
            home_team: row.home_team,
            away_team: row.away_team,
            start_time: parse_timestamp(&row.start_time),
            odds: Odds {
                home: row.odds_home,
                draw: row.odds_draw,
                away: row.odds_away,
            },
            result,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
