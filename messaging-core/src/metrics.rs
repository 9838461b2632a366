//! Prometheus counters and gauges shared by the outbox publisher and the
//! consumer pipeline, exposed by each service's `/metrics` handler.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::warn;

/// Registers the messaging-substrate metrics against `registry` and hands
/// back a handle the outbox pump and consumer pipeline can update.
pub struct CoreMetrics {
    events_published_total: IntCounterVec,
    events_failed_total: IntCounterVec,
    events_moved_to_dlq_total: IntCounterVec,
    orders_created_total: IntCounter,
    orders_processed_total: IntCounter,
    outbox_pending_count: IntGauge,
    outbox_oldest_pending_age_seconds: IntGauge,
}

impl CoreMetrics {
    pub fn new(registry: &Registry) -> Self {
        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Outbox events successfully published"),
            &["event_type"],
        )
        .expect("metric options are valid");
        let events_failed_total = IntCounterVec::new(
            Opts::new("events_failed_total", "Outbox publish attempts that failed"),
            &["event_type"],
        )
        .expect("metric options are valid");
        let events_moved_to_dlq_total = IntCounterVec::new(
            Opts::new("events_moved_to_dlq_total", "Outbox rows routed to the DLQ"),
            &["event_type"],
        )
        .expect("metric options are valid");
        let orders_created_total = IntCounter::new(
            "orders_created_total",
            "Orders created via the create-order use case",
        )
        .expect("metric options are valid");
        let orders_processed_total = IntCounter::new(
            "orders_processed_total",
            "order.processed events successfully applied",
        )
        .expect("metric options are valid");
        let outbox_pending_count = IntGauge::new(
            "outbox_pending_count",
            "Unpublished, non-DLQ outbox rows",
        )
        .expect("metric options are valid");
        let outbox_oldest_pending_age_seconds = IntGauge::new(
            "outbox_oldest_pending_age_seconds",
            "Age in seconds of the oldest unpublished outbox row",
        )
        .expect("metric options are valid");

        for collector in [
            Box::new(events_published_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(events_failed_total.clone()),
            Box::new(events_moved_to_dlq_total.clone()),
        ] {
            if let Err(e) = registry.register(collector) {
                warn!(error = %e, "metric already registered, skipping");
            }
        }
        for collector in [
            Box::new(orders_created_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(orders_processed_total.clone()),
        ] {
            if let Err(e) = registry.register(collector) {
                warn!(error = %e, "metric already registered, skipping");
            }
        }
        if let Err(e) = registry.register(Box::new(outbox_pending_count.clone())) {
            warn!(error = %e, "metric already registered, skipping");
        }
        if let Err(e) = registry.register(Box::new(outbox_oldest_pending_age_seconds.clone())) {
            warn!(error = %e, "metric already registered, skipping");
        }

        Self {
            events_published_total,
            events_failed_total,
            events_moved_to_dlq_total,
            orders_created_total,
            orders_processed_total,
            outbox_pending_count,
            outbox_oldest_pending_age_seconds,
        }
    }

    pub fn inc_events_published(&self, event_type: &str) {
        self.events_published_total.with_label_values(&[event_type]).inc();
    }

    pub fn inc_events_failed(&self, event_type: &str) {
        self.events_failed_total.with_label_values(&[event_type]).inc();
    }

    pub fn inc_events_moved_to_dlq(&self, event_type: &str) {
        self.events_moved_to_dlq_total.with_label_values(&[event_type]).inc();
    }

    pub fn inc_orders_created(&self) {
        self.orders_created_total.inc();
    }

    pub fn inc_orders_processed(&self) {
        self.orders_processed_total.inc();
    }

    pub fn set_outbox_backlog(&self, pending_count: i64, oldest_pending_age_seconds: i64) {
        self.outbox_pending_count.set(pending_count);
        self.outbox_oldest_pending_age_seconds
            .set(oldest_pending_age_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_against_fresh_registries_does_not_panic() {
        let registry_a = Registry::new();
        let metrics = CoreMetrics::new(&registry_a);
        metrics.inc_events_published("order.created");
        metrics.set_outbox_backlog(3, 42);
    }
}
