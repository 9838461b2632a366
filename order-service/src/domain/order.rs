use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub sku: String,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Done,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Done => "done",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "done" => OrderStatus::Done,
            "failed" => OrderStatus::Failed,
            _ => OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub fail_reason: Option<String>,
    pub version: i64,
}

impl Order {
    /// Validates line items and computes `total_amount`, constructing a new
    /// order at version 0 with status `pending`. Used only by create-order.
    pub fn new(order_id: String, customer_id: String, items: Vec<LineItem>) -> Result<Self, AppError> {
        validate_items(&items)?;
        let total_amount = compute_total(&items);

        Ok(Self {
            order_id,
            customer_id,
            items,
            total_amount,
            status: OrderStatus::Pending,
            fail_reason: None,
            version: 0,
        })
    }

    /// Applies an `order.processed` result under the version gate: the
    /// caller must have already checked `incoming_version > self.version`.
    pub fn apply_processed(&mut self, status: OrderStatus, fail_reason: Option<String>, incoming_version: i64) {
        self.status = status;
        self.fail_reason = if status == OrderStatus::Failed { fail_reason } else { None };
        self.version = incoming_version;
    }
}

pub fn validate_items(items: &[LineItem]) -> Result<(), AppError> {
    if items.is_empty() {
        return Err(AppError::Validation("items must not be empty".into()));
    }
    for item in items {
        if item.quantity < 1 {
            return Err(AppError::Validation(format!(
                "item {} quantity must be >= 1",
                item.sku
            )));
        }
        if item.price < 0.0 {
            return Err(AppError::Validation(format!(
                "item {} price must be >= 0",
                item.sku
            )));
        }
    }
    Ok(())
}

pub fn compute_total(items: &[LineItem]) -> f64 {
    items.iter().map(|i| i.quantity as f64 * i.price).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, quantity: i64, price: f64) -> LineItem {
        LineItem {
            sku: sku.into(),
            quantity,
            price,
        }
    }

    #[test]
    fn total_amount_matches_sum_of_quantity_times_price() {
        let items = vec![item("laptop", 1, 1200.0), item("mouse", 2, 25.0)];
        let order = Order::new("ord-1".into(), "c-1".into(), items).unwrap();
        assert_eq!(order.total_amount, 1250.0);
        assert_eq!(order.version, 0);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn empty_items_is_a_validation_error() {
        let err = Order::new("ord-1".into(), "c-1".into(), vec![]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_quantity_is_a_validation_error() {
        let err = Order::new("ord-1".into(), "c-1".into(), vec![item("sku", 0, 1.0)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn negative_price_is_a_validation_error() {
        let err = Order::new("ord-1".into(), "c-1".into(), vec![item("sku", 1, -1.0)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn apply_processed_sets_fail_reason_only_when_failed() {
        let mut order = Order::new("ord-1".into(), "c-1".into(), vec![item("sku", 1, 1.0)]).unwrap();
        order.apply_processed(OrderStatus::Done, None, 1);
        assert_eq!(order.status, OrderStatus::Done);
        assert!(order.fail_reason.is_none());

        order.apply_processed(OrderStatus::Failed, Some("embargo:sku".into()), 2);
        assert_eq!(order.fail_reason.as_deref(), Some("embargo:sku"));
    }
}
