//! Dayshare error taxonomy.
//!
//! `Config` is fatal at load time. The transient variants are retried a
//! bounded number of times and then degrade to a per-recipient failure;
//! they never abort a whole run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DayShareError {
    /// Invalid or inconsistent configuration. Fatal at startup.
    #[error("Config error: {0}")]
    Config(String),

    /// SQLite read/write failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// External source fetch failure (timeout, bad payload).
    #[error("Source error: {0}")]
    Source(String),

    /// Generation collaborator failure.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Delivery collaborator failure.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// An external call exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A run was rejected because another run holds the lock.
    #[error("A run is already in progress")]
    RunInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DayShareError>;
