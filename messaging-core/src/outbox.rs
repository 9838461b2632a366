//! Transactional outbox: durable enqueue of outbound events, plus the
//! background pump that drains them to the broker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::metrics::CoreMetrics;

/// A row in the `outbox` table, mirrored identically by both services.
#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: i64,
    pub event_type: String,
    pub payload: Value,
    pub published_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub dlq_at: Option<DateTime<Utc>>,
}

/// Aggregate view of outbox backlog, exposed as metrics gauges.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboxStats {
    pub pending_count: i64,
    pub oldest_pending_age_seconds: i64,
}

/// Appends a row to the outbox inside the caller's open transaction. Never
/// called outside a UoW commit boundary.
pub async fn insert(
    conn: &mut PgConnection,
    event_type: &str,
    payload: &Value,
) -> CoreResult<()> {
    sqlx::query("INSERT INTO outbox (event_type, payload) VALUES ($1, $2)")
        .bind(event_type)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(())
}

/// Reads up to `batch_size` unpublished, non-DLQ'd rows in insertion order.
/// A plain read with no held lock: a single pump per service process is the
/// concurrency model (see the outbox publisher's module docs below).
pub async fn fetch_unpublished(pool: &PgPool, batch_size: i64) -> CoreResult<Vec<OutboxRow>> {
    let rows = sqlx::query(
        "SELECT id, event_type, payload, published_at, retry_count, dlq_at \
         FROM outbox WHERE published_at IS NULL AND dlq_at IS NULL \
         ORDER BY id ASC LIMIT $1",
    )
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| OutboxRow {
            id: row.get("id"),
            event_type: row.get("event_type"),
            payload: row.get("payload"),
            published_at: row.get("published_at"),
            retry_count: row.get("retry_count"),
            dlq_at: row.get("dlq_at"),
        })
        .collect())
}

async fn mark_published(pool: &PgPool, id: i64) -> CoreResult<()> {
    sqlx::query("UPDATE outbox SET published_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Increments `retry_count`; if it has now reached `max_retries`, also sets
/// `dlq_at`. Returns whether the row was just routed to the DLQ.
async fn mark_failed(pool: &PgPool, id: i64, max_retries: i32) -> CoreResult<bool> {
    let row = sqlx::query(
        "UPDATE outbox SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count",
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    let retry_count: i32 = row.get("retry_count");

    if retry_count >= max_retries {
        sqlx::query("UPDATE outbox SET dlq_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Backlog snapshot used to populate `outbox_pending_count` and
/// `outbox_oldest_pending_age_seconds`.
pub async fn pending_stats(pool: &PgPool) -> CoreResult<OutboxStats> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS pending_count, \
                COALESCE(EXTRACT(EPOCH FROM (now() - MIN(created_at)))::BIGINT, 0) AS oldest_age \
         FROM outbox WHERE published_at IS NULL AND dlq_at IS NULL",
    )
    .fetch_one(pool)
    .await?;

    Ok(OutboxStats {
        pending_count: row.get("pending_count"),
        oldest_pending_age_seconds: row.get("oldest_age"),
    })
}

/// Abstracts the broker side of publishing so the pump can be tested
/// without a running broker.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, routing_key: &str, message_id: &str, payload: &[u8]) -> CoreResult<()>;

    async fn publish_to_dlq(
        &self,
        routing_key: &str,
        message_id: &str,
        payload: &[u8],
        death_reason: &str,
    ) -> CoreResult<()>;
}

/// Tunables for the background pump, sourced from service configuration.
#[derive(Debug, Clone)]
pub struct OutboxPumpConfig {
    pub batch_size: i64,
    pub poll_interval: Duration,
    pub max_retries: i32,
}

impl Default for OutboxPumpConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// The outbox publisher pump: one instance per service process.
///
/// Retries on a fixed poll interval rather than exponential backoff — the
/// per-row `retry_count` bound (`max_retries`) is what caps total attempts,
/// not the cadence between cycles.
pub struct OutboxProcessor {
    pool: PgPool,
    publisher: Arc<dyn OutboxPublisher>,
    config: OutboxPumpConfig,
    metrics: Arc<CoreMetrics>,
}

impl OutboxProcessor {
    pub fn new(
        pool: PgPool,
        publisher: Arc<dyn OutboxPublisher>,
        config: OutboxPumpConfig,
        metrics: Arc<CoreMetrics>,
    ) -> Self {
        Self {
            pool,
            publisher,
            config,
            metrics,
        }
    }

    /// Runs until `shutdown` is cancelled. On cancellation, finishes the
    /// current batch's publish-then-mark cycle before returning.
    pub async fn start(&self, shutdown: CancellationToken) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "outbox publisher starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("outbox publisher shutting down");
                return;
            }

            let processed = match self.process_batch().await {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "outbox batch processing failed, will retry next cycle");
                    0
                }
            };

            if let Ok(stats) = pending_stats(&self.pool).await {
                self.metrics.set_outbox_backlog(
                    stats.pending_count,
                    stats.oldest_pending_age_seconds,
                );
            }

            if processed > 0 {
                // A non-empty batch might mean more work is waiting; loop
                // immediately instead of sleeping a full interval.
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.cancelled() => {
                    info!("outbox publisher shutting down mid-sleep");
                    return;
                }
            }
        }
    }

    /// Reads one batch and attempts to publish each row. Returns the number
    /// of rows that were successfully published (used only to decide
    /// whether to loop immediately or sleep).
    async fn process_batch(&self) -> CoreResult<usize> {
        let rows = fetch_unpublished(&self.pool, self.config.batch_size).await?;
        let mut published = 0usize;

        for row in rows {
            let message_id = format!("outbox-{}", row.id);
            let payload_bytes = serde_json::to_vec(&row.payload)?;

            match self
                .publisher
                .publish(&row.event_type, &message_id, &payload_bytes)
                .await
            {
                Ok(()) => {
                    mark_published(&self.pool, row.id).await?;
                    self.metrics.inc_events_published(&row.event_type);
                    published += 1;
                    debug!(outbox_id = row.id, event_type = %row.event_type, "event published");
                }
                Err(e) => {
                    self.metrics.inc_events_failed(&row.event_type);
                    let dlq_routed = mark_failed(&self.pool, row.id, self.config.max_retries).await?;
                    if dlq_routed {
                        warn!(
                            outbox_id = row.id,
                            event_type = %row.event_type,
                            error = %e,
                            "retry budget exhausted, routing to DLQ"
                        );
                        if let Err(dlq_err) = self
                            .publisher
                            .publish_to_dlq(&row.event_type, &message_id, &payload_bytes, &e.to_string())
                            .await
                        {
                            error!(outbox_id = row.id, error = %dlq_err, "failed to publish DLQ copy");
                        } else {
                            self.metrics.inc_events_moved_to_dlq(&row.event_type);
                        }
                    } else {
                        warn!(
                            outbox_id = row.id,
                            event_type = %row.event_type,
                            error = %e,
                            "publish failed, will retry next cycle"
                        );
                    }
                }
            }
        }

        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_config_defaults_match_bit_exact_contract() {
        let config = OutboxPumpConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
    }

    struct RecordingPublisher {
        fail_until: i32,
    }

    #[async_trait]
    impl OutboxPublisher for RecordingPublisher {
        async fn publish(&self, _routing_key: &str, _message_id: &str, _payload: &[u8]) -> CoreResult<()> {
            if self.fail_until > 0 {
                return Err(CoreError::Other("simulated broker outage".into()));
            }
            Ok(())
        }

        async fn publish_to_dlq(
            &self,
            _routing_key: &str,
            _message_id: &str,
            _payload: &[u8],
            _death_reason: &str,
        ) -> CoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_publisher_returns_an_error_for_every_attempt() {
        let publisher = RecordingPublisher { fail_until: 1 };
        let result = publisher.publish("order.created", "m-1", b"{}").await;
        assert!(result.is_err());
    }
}
