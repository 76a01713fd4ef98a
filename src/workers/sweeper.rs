use std::time::Duration;

use tokio::time;
use tracing::{error, info};

use crate::settlement::SettlementEngine;

/// Worker that periodically re-runs a full settlement pass.
///
/// Settlement is idempotent, so the sweep is free when nothing changed and
/// retries any ticket a request-triggered pass failed to write.
pub struct SettlementSweeperWorker {
    engine: SettlementEngine,
    sweep_interval: Duration,
}

impl SettlementSweeperWorker {
    /// Create a new settlement sweeper worker
    pub fn new(engine: SettlementEngine, sweep_interval_secs: u64) -> Self {
        Self {
            engine,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        }
    }

    /// Run the worker loop
    pub async fn run(&self) {
        info!(
            "Settlement sweeper started (interval: {:?})",
            self.sweep_interval
        );

        // Run initial sweep immediately
        self.sweep().await;

        // Then run on interval
        let mut interval = time::interval(self.sweep_interval);
        interval.tick().await; // Skip first tick (already ran)

        loop {
            interval.tick().await;
            self.sweep().await;
        }
    }

    /// Perform a single settlement sweep
    async fn sweep(&self) {
        match self.engine.settle_all().await {
            Ok(summary) if summary.settled > 0 || summary.failed > 0 => {
                info!(
                    "Settlement sweep: {} settled ({} won, {} lost), {} failed",
                    summary.settled, summary.won, summary.lost, summary.failed
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!("Settlement sweep failed: {}", e);
            }
        }
    }
}
