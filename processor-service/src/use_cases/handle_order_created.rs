use messaging_core::UnitOfWork;
use serde::Deserialize;
use serde_json::json;

use crate::domain::ProcessingState;
use crate::error::AppError;
use crate::policy::ProcessingPolicy;
use crate::repository;

#[derive(Debug, Deserialize)]
pub struct OrderItem {
    pub sku: String,
    #[allow(dead_code)]
    pub quantity: i64,
    #[allow(dead_code)]
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: String,
    #[allow(dead_code)]
    pub customer_id: String,
    pub items: Vec<OrderItem>,
    #[allow(dead_code)]
    pub amount: f64,
    pub version: i64,
}

/// Applies one decoded `order.created` event within `uow` and enqueues the
/// resulting `order.processed` event.
///
/// Called from the consumer pipeline's `Handler::handle`, which has already
/// checked the inbox for an exact duplicate of this event key and will
/// record the key and commit once this returns.
pub async fn handle_order_created(
    uow: &mut UnitOfWork,
    event: OrderCreatedEvent,
    policy: &dyn ProcessingPolicy,
) -> Result<(), AppError> {
    let mut state = repository::get_by_id(uow.tx_mut(), &event.order_id)
        .await?
        .unwrap_or_else(|| ProcessingState::new(event.order_id.clone()));

    let skus: Vec<String> = event.items.iter().map(|i| i.sku.clone()).collect();
    let (status, reason) = policy.evaluate(&event.order_id, &skus);

    let emitted_version = event.version + 1;
    state.record_attempt(emitted_version, status, reason.clone());
    repository::upsert(uow.tx_mut(), &state).await?;

    let payload = json!({
        "order_id": event.order_id,
        "status": status.as_str(),
        "fail_reason": reason,
        "version": emitted_version,
    });
    uow.outbox_put("order.processed", &payload)
        .await
        .map_err(AppError::Core)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_created_event_deserializes_from_the_documented_wire_shape() {
        let json = r#"{"order_id":"ord-1","customer_id":"c-1","items":[{"sku":"laptop","quantity":1,"price":1200.0}],"amount":1200.0,"version":0}"#;
        let event: OrderCreatedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.order_id, "ord-1");
        assert_eq!(event.items.len(), 1);
    }
}
