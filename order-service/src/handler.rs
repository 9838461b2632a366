use std::sync::Arc;

use async_trait::async_trait;
use messaging_core::broker::Handler;
use messaging_core::error::{CoreError, CoreResult};
use messaging_core::metrics::CoreMetrics;
use messaging_core::UnitOfWork;

use crate::use_cases::apply_processed::{apply_processed, OrderProcessedEvent};

/// Binds the consumer pipeline's generic `Handler` contract to the
/// apply-processed use case for the `order.processed` routing key.
pub struct ApplyProcessedHandler {
    metrics: Arc<CoreMetrics>,
}

impl ApplyProcessedHandler {
    pub fn new(metrics: Arc<CoreMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl Handler for ApplyProcessedHandler {
    fn event_type(&self) -> &'static str {
        "order.processed"
    }

    fn identity(&self, payload: &serde_json::Value) -> CoreResult<(String, i64)> {
        let order_id = payload
            .get("order_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::PoisonMessage("order.processed missing order_id".into()))?
            .to_string();
        let version = payload
            .get("version")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| CoreError::PoisonMessage("order.processed missing version".into()))?;
        Ok((order_id, version))
    }

    async fn handle(&self, uow: &mut UnitOfWork, payload: serde_json::Value) -> CoreResult<()> {
        let event: OrderProcessedEvent = serde_json::from_value(payload)
            .map_err(|e| CoreError::PoisonMessage(format!("undecodable order.processed: {e}")))?;

        apply_processed(uow, event)
            .await
            .map_err(|e| CoreError::Other(e.to_string()))?;
        self.metrics.inc_orders_processed();
        Ok(())
    }
}
