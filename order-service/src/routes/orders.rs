use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::domain::Order;
use crate::error::AppError;
use crate::repository;
use crate::state::AppState;
use crate::use_cases::create_order::{create_order as create_order_use_case, CreateOrderInput};

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_id: String,
    pub customer_id: String,
    pub status: &'static str,
    pub total_amount: f64,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.order_id,
            customer_id: order.customer_id,
            status: order.status.as_str(),
            total_amount: order.total_amount,
            version: order.version,
            fail_reason: order.fail_reason,
        }
    }
}

pub async fn create_order(
    state: web::Data<AppState>,
    input: web::Json<CreateOrderInput>,
) -> Result<HttpResponse, AppError> {
    let (order, created) = create_order_use_case(&state.pool, input.into_inner()).await?;

    if created {
        state.metrics.inc_orders_created();
        Ok(HttpResponse::Created().json(OrderView::from(order)))
    } else {
        Ok(HttpResponse::Ok().json(OrderView::from(order)))
    }
}

pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let mut uow = messaging_core::UnitOfWork::begin(&state.pool)
        .await
        .map_err(AppError::Core)?;
    let order = repository::get_by_id(uow.tx_mut(), &order_id).await?;
    uow.commit().await.map_err(AppError::Core)?;

    match order {
        Some(order) => Ok(HttpResponse::Ok().json(OrderView::from(order))),
        None => Err(AppError::NotFound),
    }
}
