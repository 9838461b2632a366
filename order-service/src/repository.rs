use sqlx::{Postgres, Row, Transaction};

use crate::domain::{LineItem, Order, OrderStatus};
use crate::error::AppError;

/// Looks up an order by id within the caller's open transaction.
pub async fn get_by_id(tx: &mut Transaction<'static, Postgres>, order_id: &str) -> Result<Option<Order>, AppError> {
    let row = sqlx::query(
        "SELECT order_id, customer_id, items, total_amount, status, fail_reason, version \
         FROM orders WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::Core(e.into()))?;

    let Some(row) = row else { return Ok(None) };

    let items: Vec<LineItem> = serde_json::from_value(row.get("items"))
        .map_err(|e| AppError::Core(e.into()))?;

    Ok(Some(Order {
        order_id: row.get("order_id"),
        customer_id: row.get("customer_id"),
        items,
        total_amount: row.get("total_amount"),
        status: OrderStatus::parse(row.get::<String, _>("status").as_str()),
        fail_reason: row.get("fail_reason"),
        version: row.get("version"),
    }))
}

/// Upserts an order by primary key, within the caller's open transaction.
pub async fn upsert(tx: &mut Transaction<'static, Postgres>, order: &Order) -> Result<(), AppError> {
    let items = serde_json::to_value(&order.items).map_err(|e| AppError::Core(e.into()))?;

    sqlx::query(
        "INSERT INTO orders (order_id, customer_id, items, total_amount, status, fail_reason, version, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
         ON CONFLICT (order_id) DO UPDATE SET \
            items = EXCLUDED.items, \
            total_amount = EXCLUDED.total_amount, \
            status = EXCLUDED.status, \
            fail_reason = EXCLUDED.fail_reason, \
            version = EXCLUDED.version, \
            updated_at = now()",
    )
    .bind(&order.order_id)
    .bind(&order.customer_id)
    .bind(items)
    .bind(order.total_amount)
    .bind(order.status.as_str())
    .bind(&order.fail_reason)
    .bind(order.version)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Core(e.into()))?;

    Ok(())
}
