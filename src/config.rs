use std::env;

use anyhow::{Context, Result};
use tracing::warn;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// SQLite database path
    pub database_url: String,

    /// Interval in seconds between full settlement sweeps
    pub settlement_sweep_interval: u64,

    /// Token required on admin endpoints; unset leaves them open
    pub admin_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let admin_token = env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());
        if admin_token.is_none() {
            warn!("ADMIN_TOKEN not set; admin endpoints are unauthenticated");
        }

        Ok(Config {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/parlay.db".to_string()),

            settlement_sweep_interval: env::var("SETTLEMENT_SWEEP_INTERVAL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("SETTLEMENT_SWEEP_INTERVAL must be a valid number")?,

            admin_token,
        })
    }
}
