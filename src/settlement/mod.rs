use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::db::{FixtureStore, PendingBatch, TicketStore};
use crate::error::Result;
use crate::models::{Outcome, Selection, Settlement, TicketStatus};

/// Recomputes win/loss for pending tickets from the finished fixture set.
///
/// The pass is a pure function of current store contents, so repeated or
/// interleaved invocations are safe: each ticket write is atomic and a
/// rerun with unchanged inputs writes the same values.
#[derive(Clone)]
pub struct SettlementEngine {
    fixtures: FixtureStore,
    tickets: TicketStore,
}

/// What a settlement pass did, for logging
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub settled: usize,
    pub won: usize,
    pub lost: usize,
    pub failed: usize,
}

impl SettlementEngine {
    pub fn new(fixtures: FixtureStore, tickets: TicketStore) -> Self {
        Self { fixtures, tickets }
    }

    /// Settle every pending ticket against the finished fixtures
    pub async fn settle_all(&self) -> Result<PassSummary> {
        let finished = self.finished_outcomes().await?;
        // No finished fixture means no trigger has fired yet; leave every
        // ticket pending rather than failing them all against an empty slate
        if finished.is_empty() {
            return Ok(PassSummary::default());
        }

        let pending = self.tickets.get_pending_tickets().await?;
        self.settle_batch(pending, &finished).await
    }

    /// Settle only the pending tickets holding a leg on the given fixture.
    /// Called once per successful result report, after the fixture write
    /// has committed.
    pub async fn settle_for_fixture(&self, match_id: i64) -> Result<PassSummary> {
        let finished = self.finished_outcomes().await?;
        if finished.is_empty() {
            return Ok(PassSummary::default());
        }

        let pending = self.tickets.get_pending_tickets_for_match(match_id).await?;
        self.settle_batch(pending, &finished).await
    }

    async fn settle_batch(
        &self,
        batch: PendingBatch,
        finished: &HashMap<i64, Outcome>,
    ) -> Result<PassSummary> {
        let mut summary = PassSummary {
            // Unreadable tickets are retried by the next pass
            failed: batch.unreadable,
            ..PassSummary::default()
        };

        for ticket in batch.tickets {
            let settlement = evaluate(&ticket.selections, finished);
            let status = if settlement.is_winner {
                TicketStatus::Won
            } else {
                TicketStatus::Lost
            };

            // One ticket failing to persist must not abort the rest;
            // the next sweep picks it up again
            match self
                .tickets
                .update_settlement(&ticket.ticket_id, status, settlement)
                .await
            {
                Ok(true) => {
                    summary.settled += 1;
                    match status {
                        TicketStatus::Won => summary.won += 1,
                        _ => summary.lost += 1,
                    }
                    info!(
                        "Settled ticket {} ({}): {} - {}/{} correct",
                        ticket.ticket_id,
                        ticket.username,
                        status.as_str(),
                        settlement.correct_count,
                        settlement.total_count,
                    );
                }
                // A concurrent pass got there first; its write stands
                Ok(false) => {
                    debug!(
                        "Ticket {} already settled by a concurrent pass",
                        ticket.ticket_id
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Failed to settle ticket {}: {}", ticket.ticket_id, e);
                }
            }
        }

        Ok(summary)
    }

    /// Outcomes of all finished fixtures, keyed by match id
    async fn finished_outcomes(&self) -> Result<HashMap<i64, Outcome>> {
        let fixtures = self.fixtures.get_finished_fixtures().await?;
        Ok(fixtures
            .into_iter()
            .filter_map(|f| f.result.map(|r| (f.match_id, r.outcome)))
            .collect())
    }
}

/// Evaluate a ticket's legs against the finished outcomes.
///
/// An unfinished leg is simply unmatched: it never increments
/// `correct_count` but still counts toward `total_count`. A ticket
/// therefore goes lost as soon as any leg is wrong (or merely unresolved at
/// pass time) and can only win once every leg has a finished, matching
/// fixture.
pub fn evaluate(selections: &[Selection], finished: &HashMap<i64, Outcome>) -> Settlement {
    let total_count = selections.len() as u32;
    let correct_count = selections
        .iter()
        .filter(|s| finished.get(&s.match_id) == Some(&s.chosen_outcome))
        .count() as u32;

    Settlement {
        correct_count,
        total_count,
        is_winner: correct_count == total_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, FixtureStore, TicketStore};
    use crate::models::Ticket;

    fn legs(outcomes: &[(i64, Outcome)]) -> Vec<Selection> {
        outcomes
            .iter()
            .map(|&(match_id, chosen_outcome)| Selection {
                match_id,
                chosen_outcome,
                odds_at_submission: 2.0,
            })
            .collect()
    }

    fn full_slate_legs(chosen: Outcome) -> Vec<Selection> {
        legs(&(1..=8).map(|id| (id, chosen)).collect::<Vec<_>>())
    }

    #[test]
    fn all_legs_correct_wins() {
        let selections = full_slate_legs(Outcome::Home);
        let finished: HashMap<i64, Outcome> =
            (1..=8).map(|id| (id, Outcome::Home)).collect();

        let settlement = evaluate(&selections, &finished);
        assert_eq!(settlement.correct_count, 8);
        assert_eq!(settlement.total_count, 8);
        assert!(settlement.is_winner);
    }

    #[test]
    fn one_wrong_leg_loses() {
        let mut selections = full_slate_legs(Outcome::Home);
        selections[0].chosen_outcome = Outcome::Away;
        let finished: HashMap<i64, Outcome> =
            (1..=8).map(|id| (id, Outcome::Home)).collect();

        let settlement = evaluate(&selections, &finished);
        assert_eq!(settlement.correct_count, 7);
        assert!(!settlement.is_winner);
    }

    #[test]
    fn unfinished_leg_blocks_a_win() {
        // 7 of 8 fixtures finished, all guessed right: still not a winner
        let selections = full_slate_legs(Outcome::Home);
        let finished: HashMap<i64, Outcome> =
            (1..=7).map(|id| (id, Outcome::Home)).collect();

        let settlement = evaluate(&selections, &finished);
        assert_eq!(settlement.correct_count, 7);
        assert_eq!(settlement.total_count, 8);
        assert!(!settlement.is_winner);
    }

    #[test]
    fn evaluate_is_deterministic() {
        let selections = full_slate_legs(Outcome::Draw);
        let finished: HashMap<i64, Outcome> =
            (1..=4).map(|id| (id, Outcome::Draw)).collect();

        assert_eq!(
            evaluate(&selections, &finished),
            evaluate(&selections, &finished)
        );
    }

    struct Harness {
        pool: sqlx::Pool<sqlx::Sqlite>,
        fixtures: FixtureStore,
        tickets: TicketStore,
        engine: SettlementEngine,
    }

    async fn harness() -> Harness {
        let pool = memory_pool().await;
        let fixtures = FixtureStore::new(pool.clone()).await.unwrap();
        let tickets = TicketStore::new(pool.clone()).await.unwrap();
        fixtures.seed_default_slate().await.unwrap();
        let engine = SettlementEngine::new(fixtures.clone(), tickets.clone());
        Harness {
            pool,
            fixtures,
            tickets,
            engine,
        }
    }

    async fn submit(harness: &Harness, username: &str, selections: Vec<Selection>) -> Ticket {
        let ticket = Ticket::new(username.to_string(), selections);
        harness.tickets.insert_ticket(&ticket).await.unwrap();
        ticket
    }

    #[tokio::test]
    async fn all_correct_ticket_wins_once_slate_finishes() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Home)).await;

        for match_id in 1..=8 {
            h.fixtures.set_result(match_id, 2, 0).await.unwrap();
        }
        let summary = h.engine.settle_all().await.unwrap();
        assert_eq!(summary.won, 1);

        let ticket = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Won);
        assert_eq!(ticket.settlement.correct_count, 8);
        assert!(ticket.settlement.is_winner);
    }

    #[tokio::test]
    async fn early_loss_with_unresolved_legs() {
        // Fixture 1 guessed wrong, fixtures 2..8 not yet finished: the pass
        // still moves the ticket to lost
        let h = harness().await;
        let mut selections = full_slate_legs(Outcome::Home);
        selections[0].chosen_outcome = Outcome::Away;
        submit(&h, "alice", selections).await;

        h.fixtures.set_result(1, 2, 0).await.unwrap();
        let summary = h.engine.settle_for_fixture(1).await.unwrap();
        assert_eq!(summary.lost, 1);

        let ticket = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Lost);
        assert_eq!(ticket.settlement.correct_count, 0);
        assert_eq!(ticket.settlement.total_count, 8);
    }

    #[tokio::test]
    async fn pass_without_finished_fixtures_settles_nothing() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Home)).await;

        let summary = h.engine.settle_all().await.unwrap();
        assert_eq!(summary, PassSummary::default());

        let ticket = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(ticket.status, TicketStatus::Pending);
    }

    #[tokio::test]
    async fn repeated_pass_is_idempotent() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Home)).await;

        h.fixtures.set_result(1, 0, 2).await.unwrap();
        h.engine.settle_all().await.unwrap();
        let first = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();

        // Terminal tickets are no longer pending, so a second pass is a no-op
        let summary = h.engine.settle_all().await.unwrap();
        assert_eq!(summary, PassSummary::default());

        let second = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(second.status, first.status);
        assert_eq!(second.settlement, first.settlement);
    }

    #[tokio::test]
    async fn terminal_status_never_reverts() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Away)).await;

        h.fixtures.set_result(1, 3, 0).await.unwrap();
        h.engine.settle_for_fixture(1).await.unwrap();

        let lost = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(lost.status, TicketStatus::Lost);

        // Later finishes re-trigger settlement but never touch the ticket
        for match_id in 2..=8 {
            h.fixtures.set_result(match_id, 0, 1).await.unwrap();
            h.engine.settle_for_fixture(match_id).await.unwrap();
        }
        let after = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(after.status, TicketStatus::Lost);
        assert_eq!(after.settlement, lost.settlement);
    }

    #[tokio::test]
    async fn fixture_scoped_pass_skips_unrelated_tickets() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Home)).await;

        let outsider = legs(&(11..=18).map(|id| (id, Outcome::Home)).collect::<Vec<_>>());
        submit(&h, "bob", outsider).await;

        h.fixtures.set_result(1, 1, 2).await.unwrap();
        h.engine.settle_for_fixture(1).await.unwrap();

        let alice = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        let bob = h.tickets.get_ticket_by_username("bob").await.unwrap().unwrap();
        assert_eq!(alice.status, TicketStatus::Lost);
        assert_eq!(bob.status, TicketStatus::Pending);
    }

    #[tokio::test]
    async fn stale_pass_cannot_reverse_a_won_ticket() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Home)).await;

        // A slow pass captures its pending snapshot while only 7 fixtures
        // have finished
        for match_id in 1..=7 {
            h.fixtures.set_result(match_id, 2, 0).await.unwrap();
        }
        let stale_snapshot = h.tickets.get_pending_tickets().await.unwrap();
        let stale_outcomes = h.engine.finished_outcomes().await.unwrap();
        assert_eq!(stale_snapshot.tickets.len(), 1);
        assert_eq!(stale_outcomes.len(), 7);

        // Meanwhile the last fixture finishes and a fresh pass settles the
        // ticket as won
        h.fixtures.set_result(8, 2, 0).await.unwrap();
        h.engine.settle_all().await.unwrap();
        let won = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(won.status, TicketStatus::Won);

        // The slow pass now resumes with its stale 7-of-8 view; its write
        // must not apply
        let summary = h.engine.settle_batch(stale_snapshot, &stale_outcomes).await.unwrap();
        assert_eq!(summary, PassSummary::default());

        let after = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(after.status, TicketStatus::Won);
        assert_eq!(after.settlement.correct_count, 8);
        assert!(after.settlement.is_winner);
    }

    #[tokio::test]
    async fn unreadable_ticket_does_not_stall_the_pass() {
        let h = harness().await;
        submit(&h, "alice", full_slate_legs(Outcome::Home)).await;
        let bob = submit(&h, "bob", full_slate_legs(Outcome::Home)).await;

        sqlx::query("UPDATE selections SET chosen_outcome = 'banana' WHERE ticket_id = ?")
            .bind(&bob.ticket_id)
            .execute(&h.pool)
            .await
            .unwrap();

        for match_id in 1..=8 {
            h.fixtures.set_result(match_id, 2, 0).await.unwrap();
        }
        let summary = h.engine.settle_all().await.unwrap();
        assert_eq!(summary.settled, 1);
        assert_eq!(summary.won, 1);
        assert_eq!(summary.failed, 1);

        let alice = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.status, TicketStatus::Won);
    }

    #[tokio::test]
    async fn captured_odds_survive_odds_updates() {
        let h = harness().await;
        let ticket = submit(&h, "alice", full_slate_legs(Outcome::Home)).await;
        let original = ticket.combined_odds;

        h.fixtures
            .set_odds(
                1,
                crate::models::Odds {
                    home: 9.0,
                    draw: 9.0,
                    away: 9.0,
                },
            )
            .await
            .unwrap();

        let reloaded = h.tickets.get_ticket_by_username("alice").await.unwrap().unwrap();
        assert_eq!(reloaded.combined_odds, original);
        assert_eq!(reloaded.selections[0].odds_at_submission, 2.0);
    }
}
