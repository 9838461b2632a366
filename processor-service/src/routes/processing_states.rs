use actix_web::{web, HttpResponse};
use messaging_core::UnitOfWork;
use serde::Serialize;

use crate::domain::ProcessingState;
use crate::error::AppError;
use crate::repository;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProcessingStateView {
    pub order_id: String,
    pub status: &'static str,
    pub attempt_count: i32,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<ProcessingState> for ProcessingStateView {
    fn from(state: ProcessingState) -> Self {
        Self {
            order_id: state.order_id,
            status: state.status.as_str(),
            attempt_count: state.attempt_count,
            version: state.version,
            last_error: state.last_error,
        }
    }
}

/// Diagnostic read endpoint mirroring the Order service's `GET /orders/{id}`
/// for the Processor's own aggregate — not part of the conversation
/// contract between the two services.
pub async fn get_processing_state(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let mut uow = UnitOfWork::begin(&state.pool).await.map_err(AppError::Core)?;
    let processing_state = repository::get_by_id(uow.tx_mut(), &order_id).await?;
    uow.commit().await.map_err(AppError::Core)?;

    match processing_state {
        Some(state) => Ok(HttpResponse::Ok().json(ProcessingStateView::from(state))),
        None => Err(AppError::NotFound),
    }
}
