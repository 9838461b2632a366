use std::sync::Arc;

use async_trait::async_trait;
use messaging_core::broker::Handler;
use messaging_core::error::{CoreError, CoreResult};
use messaging_core::UnitOfWork;

use crate::policy::ProcessingPolicy;
use crate::use_cases::handle_order_created::{handle_order_created, OrderCreatedEvent};

/// Binds the consumer pipeline's generic `Handler` contract to the
/// handle-order-created use case for the `order.created` routing key.
pub struct HandleOrderCreatedHandler {
    policy: Arc<dyn ProcessingPolicy>,
}

impl HandleOrderCreatedHandler {
    pub fn new(policy: Arc<dyn ProcessingPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Handler for HandleOrderCreatedHandler {
    fn event_type(&self) -> &'static str {
        "order.created"
    }

    fn identity(&self, payload: &serde_json::Value) -> CoreResult<(String, i64)> {
        let order_id = payload
            .get("order_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::PoisonMessage("order.created missing order_id".into()))?
            .to_string();
        let version = payload
            .get("version")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| CoreError::PoisonMessage("order.created missing version".into()))?;
        Ok((order_id, version))
    }

    async fn handle(&self, uow: &mut UnitOfWork, payload: serde_json::Value) -> CoreResult<()> {
        let event: OrderCreatedEvent = serde_json::from_value(payload)
            .map_err(|e| CoreError::PoisonMessage(format!("undecodable order.created: {e}")))?;

        handle_order_created(uow, event, self.policy.as_ref())
            .await
            .map_err(|e| CoreError::Other(e.to_string()))
    }
}
