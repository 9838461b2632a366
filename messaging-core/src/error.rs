//! Error types shared by the outbox, inbox, unit-of-work, and broker modules.

use thiserror::Error;

/// Errors surfaced by the messaging substrate.
///
/// Maps loosely onto the error kinds a use case needs to react to: a
/// `Conflict` is locally recoverable (re-check and no-op), a `StaleUpdate`
/// is not an error at all to the caller but is modeled here so the UoW can
/// record the inbox key and commit without propagating a hard failure, and
/// everything else is infrastructure the caller should let roll back the
/// transaction via `?`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("event already applied at version {version} (stale, ignored)")]
    StaleUpdate { version: i64 },

    #[error("poison message: {0}")]
    PoisonMessage(String),

    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// True for failures that should be retried (by the publisher's next
    /// poll cycle, or by the broker's redelivery mechanism), false for
    /// failures that are terminal for the message/row in question.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Database(_) | CoreError::Broker(_))
    }

    /// True when the underlying database error is a unique-constraint
    /// violation (Postgres SQLSTATE 23505) — the signal a concurrent UoW
    /// lost the race to insert an inbox key or an order row.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            CoreError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
            }
            _ => false,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
