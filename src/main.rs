mod api;
mod config;
mod db;
mod error;
mod models;
mod settlement;
mod workers;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::config::Config;
use crate::db::{FixtureStore, TicketStore};
use crate::settlement::SettlementEngine;
use crate::workers::SettlementSweeperWorker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "football_parlay=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting football-parlay");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    // Initialize stores over a shared pool and seed the slate
    let pool = db::connect(&config.database_url).await?;
    let fixtures = FixtureStore::new(pool.clone()).await?;
    let tickets = TicketStore::new(pool).await?;
    fixtures.seed_default_slate().await?;
    info!("Database initialized");

    let engine = SettlementEngine::new(fixtures.clone(), tickets.clone());

    // Periodic settlement sweep (self-healing retry of failed ticket writes)
    let sweeper = SettlementSweeperWorker::new(engine.clone(), config.settlement_sweep_interval);
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run().await;
    });

    // HTTP server
    let app = api::create_router(AppState {
        fixtures,
        tickets,
        engine,
        admin_token: config.admin_token.clone(),
    });
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = sweeper_handle => {
            error!("Settlement sweeper exited unexpectedly: {:?}", result);
        }
        result = server_handle => {
            error!("HTTP server exited unexpectedly: {:?}", result);
        }
    }

    info!("Shutting down football-parlay");
    Ok(())
}
