//! Unit of Work: scopes one database transaction plus the outbox and inbox
//! writers bound to it.
//!
//! The aggregate repository (orders, or processing-states) is service
//! specific and is not modeled here — each service's repository takes
//! `uow.tx_mut()` and runs its own queries against the same open
//! transaction, so a single commit covers state change, outbox row, and
//! inbox key together.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::CoreResult;
use crate::{inbox, outbox};

/// An open transaction plus the outbox/inbox writers scoped to it.
///
/// A `UnitOfWork` that is dropped without `commit()` rolls back: `Drop` on
/// the underlying `sqlx::Transaction` does this automatically, so there is
/// no bespoke drop glue here.
pub struct UnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl UnitOfWork {
    /// Opens a new transaction against `pool`. A failure to open is an
    /// infrastructure error.
    pub async fn begin(pool: &PgPool) -> CoreResult<UnitOfWork> {
        let tx = pool.begin().await?;
        Ok(UnitOfWork { tx })
    }

    /// Mutable access to the open transaction, for the service-specific
    /// aggregate repository to run its own queries against.
    pub fn tx_mut(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.tx
    }

    /// Appends a durable outbox row inside this scope.
    pub async fn outbox_put(&mut self, event_type: &str, payload: &serde_json::Value) -> CoreResult<()> {
        outbox::insert(&mut self.tx, event_type, payload).await
    }

    /// Whether `key` has already been recorded as processed.
    pub async fn inbox_exists(&mut self, key: &str) -> CoreResult<bool> {
        inbox::exists(&mut self.tx, key).await
    }

    /// Records `key` as processed within this scope.
    pub async fn inbox_add(&mut self, key: &str) -> CoreResult<()> {
        inbox::add(&mut self.tx, key).await
    }

    /// Commits. Any failure leaves the transaction rolled back by `sqlx`.
    pub async fn commit(self) -> CoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
