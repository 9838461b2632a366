use messaging_core::UnitOfWork;
use serde::Deserialize;

use crate::domain::OrderStatus;
use crate::error::AppError;
use crate::repository;

#[derive(Debug, Deserialize)]
pub struct OrderProcessedEvent {
    pub order_id: String,
    pub status: String,
    pub fail_reason: Option<String>,
    pub version: i64,
}

/// Applies one decoded `order.processed` event within `uow`.
///
/// Called from the consumer pipeline's `Handler::handle`, which has already
/// checked the inbox for an exact duplicate of this event key and will
/// record the key and commit once this returns — this function never opens
/// or commits its own transaction, and never touches the inbox itself.
///
/// The highest-versioned event wins regardless of delivery order: an
/// unknown `order_id` or a stale `version` both leave state untouched
/// rather than erroring, since the pipeline still needs to record the inbox
/// key and ack the message.
pub async fn apply_processed(uow: &mut UnitOfWork, event: OrderProcessedEvent) -> Result<(), AppError> {
    let Some(mut order) = repository::get_by_id(uow.tx_mut(), &event.order_id).await? else {
        return Ok(());
    };

    if event.version <= order.version {
        return Ok(());
    }

    let status = match event.status.as_str() {
        "success" => OrderStatus::Done,
        _ => OrderStatus::Failed,
    };
    order.apply_processed(status, event.fail_reason, event.version);
    repository::upsert(uow.tx_mut(), &order).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_processed_event_deserializes_from_the_documented_wire_shape() {
        let json = r#"{"order_id":"ord-1","status":"failed","fail_reason":"embargo:teapot","version":1}"#;
        let event: OrderProcessedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.order_id, "ord-1");
        assert_eq!(event.fail_reason.as_deref(), Some("embargo:teapot"));
    }
}
