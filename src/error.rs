use thiserror::Error;

/// Domain errors surfaced by the stores and the settlement engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("fixture {0} not found")]
    FixtureNotFound(i64),

    #[error("no ticket found for {0}")]
    TicketNotFound(String),

    #[error("{0}")]
    Validation(String),

    /// Transient store failure; settlement retries on the next trigger
    #[error("store unavailable: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
