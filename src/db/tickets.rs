use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Outcome, Selection, Settlement, Ticket, TicketStatus};

/// Pending tickets from one query, plus the count of rows skipped because
/// they could not be decoded
pub struct PendingBatch {
    pub tickets: Vec<Ticket>,
    pub unreadable: usize,
}

/// SQLite store for parlay tickets and their selections
#[derive(Clone)]
pub struct TicketStore {
    pool: Pool<Sqlite>,
}

impl TicketStore {
    /// Create the store and initialize its schema
    pub async fn new(pool: Pool<Sqlite>) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                ticket_id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                combined_odds REAL NOT NULL,
                status TEXT NOT NULL,
                correct_count INTEGER NOT NULL,
                total_count INTEGER NOT NULL,
                is_winner INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS selections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id TEXT NOT NULL REFERENCES tickets (ticket_id),
                match_id INTEGER NOT NULL,
                chosen_outcome TEXT NOT NULL,
                odds_at_submission REAL NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // match_id -> tickets index: lets a fixture-finish event settle only
        // the tickets holding a leg on that fixture
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_selections_match
            ON selections (match_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_selections_ticket
            ON selections (ticket_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tickets_status
            ON tickets (status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new ticket with its selections in one transaction.
    /// A second ticket for the same username is rejected.
    pub async fn insert_ticket(&self, ticket: &Ticket) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tickets (
                ticket_id, username, combined_odds, status,
                correct_count, total_count, is_winner, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&ticket.ticket_id)
        .bind(&ticket.username)
        .bind(ticket.combined_odds)
        .bind(ticket.status.as_str())
        .bind(ticket.settlement.correct_count)
        .bind(ticket.settlement.total_count)
        .bind(ticket.settlement.is_winner)
        .bind(ticket.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if is_unique_violation(&e) {
                return Err(Error::Validation(format!(
                    "user {} already has a ticket",
                    ticket.username
                )));
            }
            return Err(e.into());
        }

        for selection in &ticket.selections {
            sqlx::query(
                r#"
                INSERT INTO selections (
                    ticket_id, match_id, chosen_outcome, odds_at_submission
                ) VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(&ticket.ticket_id)
            .bind(selection.match_id)
            .bind(selection.chosen_outcome.as_str())
            .bind(selection.odds_at_submission)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Look up a user's ticket, if any
    pub async fn get_ticket_by_username(&self, username: &str) -> Result<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_ticket(row).await?)),
            None => Ok(None),
        }
    }

    /// Every ticket, newest first
    pub async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        self.load_tickets(rows).await
    }

    /// Tickets awaiting settlement. A row that fails to decode is logged
    /// and skipped so one corrupt ticket cannot stall every pass.
    pub async fn get_pending_tickets(&self) -> Result<PendingBatch> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE status = 'pending'",
        )
        .fetch_all(&self.pool)
        .await?;

        self.load_pending(rows).await
    }

    /// Pending tickets holding a leg on the given fixture
    pub async fn get_pending_tickets_for_match(&self, match_id: i64) -> Result<PendingBatch> {
        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT DISTINCT t.*
            FROM tickets t
            JOIN selections s ON s.ticket_id = t.ticket_id
            WHERE t.status = 'pending' AND s.match_id = ?
            "#,
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await?;

        self.load_pending(rows).await
    }

    /// Persist a settlement pass outcome for one ticket. The UPDATE only
    /// applies while the ticket is still pending, so a pass working from a
    /// stale snapshot can never overwrite a terminal status. Returns
    /// whether the write applied.
    pub async fn update_settlement(
        &self,
        ticket_id: &str,
        status: TicketStatus,
        settlement: Settlement,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET status = ?, correct_count = ?, total_count = ?, is_winner = ?
            WHERE ticket_id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(settlement.correct_count)
        .bind(settlement.total_count)
        .bind(settlement.is_winner)
        .bind(ticket_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Nothing matched: either a concurrent pass already settled the
        // ticket, or it does not exist at all
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT status FROM tickets WHERE ticket_id = ?")
                .bind(ticket_id)
                .fetch_optional(&self.pool)
                .await?;

        match exists {
            Some(_) => Ok(false),
            None => Err(Error::TicketNotFound(ticket_id.to_string())),
        }
    }

    /// Remove a user's ticket and its selections (admin reset)
    pub async fn delete_by_username(&self, username: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM selections
            WHERE ticket_id IN (SELECT ticket_id FROM tickets WHERE username = ?)
            "#,
        )
        .bind(username)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM tickets WHERE username = ?")
            .bind(username)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::TicketNotFound(username.to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_tickets(&self, rows: Vec<TicketRow>) -> Result<Vec<Ticket>> {
        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            tickets.push(self.load_ticket(row).await?);
        }
        Ok(tickets)
    }

    async fn load_pending(&self, rows: Vec<TicketRow>) -> Result<PendingBatch> {
        let mut tickets = Vec::with_capacity(rows.len());
        let mut unreadable = 0;
        for row in rows {
            let ticket_id = row.ticket_id.clone();
            match self.load_ticket(row).await {
                Ok(ticket) => tickets.push(ticket),
                Err(e) => {
                    unreadable += 1;
                    warn!("Skipping unreadable ticket {}: {}", ticket_id, e);
                }
            }
        }
        Ok(PendingBatch {
            tickets,
            unreadable,
        })
    }

    async fn load_ticket(&self, row: TicketRow) -> Result<Ticket> {
        let selection_rows = sqlx::query_as::<_, SelectionRow>(
            "SELECT * FROM selections WHERE ticket_id = ? ORDER BY id",
        )
        .bind(&row.ticket_id)
        .fetch_all(&self.pool)
        .await?;

        let mut selections = Vec::with_capacity(selection_rows.len());
        for s in selection_rows {
            selections.push(Selection {
                match_id: s.match_id,
                chosen_outcome: Outcome::parse(&s.chosen_outcome)?,
                odds_at_submission: s.odds_at_submission,
            });
        }

        Ok(Ticket {
            status: TicketStatus::parse(&row.status)?,
            settlement: Settlement {
                correct_count: row.correct_count.max(0) as u32,
                total_count: row.total_count.max(0) as u32,
                is_winner: row.is_winner != 0,
            },
            ticket_id: row.ticket_id,
            username: row.username,
            selections,
            combined_odds: row.combined_odds,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Database row representation
#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_id: String,
    username: String,
    combined_odds: f64,
    status: String,
    correct_count: i64,
    total_count: i64,
    is_winner: i64,
    created_at: String,
}

#[derive(sqlx::FromRow)]
struct SelectionRow {
    #[allow(dead_code)]
    id: i64,
    #[allow(dead_code)]
    ticket_id: String,
    match_id: i64,
    chosen_outcome: String,
    odds_at_submission: f64,
}
