use messaging_core::UnitOfWork;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::domain::{LineItem, Order};
use crate::error::AppError;
use crate::repository;

#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub order_id: String,
    pub customer_id: String,
    pub items: Vec<LineItem>,
}

/// Idempotent: creating the same `order_id` twice returns the existing
/// order's view without enqueueing a second `order.created` event.
pub async fn create_order(pool: &PgPool, input: CreateOrderInput) -> Result<(Order, bool), AppError> {
    let mut uow = UnitOfWork::begin(pool).await.map_err(AppError::Core)?;

    if let Some(existing) = repository::get_by_id(uow.tx_mut(), &input.order_id).await? {
        uow.commit().await.map_err(AppError::Core)?;
        return Ok((existing, false));
    }

    let order = Order::new(input.order_id, input.customer_id, input.items)?;
    repository::upsert(uow.tx_mut(), &order).await?;

    let payload = json!({
        "order_id": order.order_id,
        "customer_id": order.customer_id,
        "items": order.items,
        "amount": order.total_amount,
        "version": order.version,
    });
    uow.outbox_put("order.created", &payload).await.map_err(AppError::Core)?;

    uow.commit().await.map_err(AppError::Core)?;

    Ok((order, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_order_input_deserializes_from_the_documented_json_shape() {
        let json = r#"{"order_id":"ord-1","customer_id":"c-1","items":[{"sku":"laptop","quantity":1,"price":1200.0}]}"#;
        let input: CreateOrderInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.order_id, "ord-1");
        assert_eq!(input.items.len(), 1);
    }
}
