use sqlx::{Postgres, Row, Transaction};

use crate::domain::{ProcessingState, ProcessingStatus};
use crate::error::AppError;

pub async fn get_by_id(
    tx: &mut Transaction<'static, Postgres>,
    order_id: &str,
) -> Result<Option<ProcessingState>, AppError> {
    let row = sqlx::query(
        "SELECT order_id, version, status, attempt_count, last_error \
         FROM processing_states WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| AppError::Core(e.into()))?;

    Ok(row.map(|row| ProcessingState {
        order_id: row.get("order_id"),
        version: row.get("version"),
        status: ProcessingStatus::parse(row.get::<String, _>("status").as_str()),
        attempt_count: row.get("attempt_count"),
        last_error: row.get("last_error"),
    }))
}

pub async fn upsert(
    tx: &mut Transaction<'static, Postgres>,
    state: &ProcessingState,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO processing_states (order_id, version, status, attempt_count, last_error, updated_at) \
         VALUES ($1, $2, $3, $4, $5, now()) \
         ON CONFLICT (order_id) DO UPDATE SET \
            version = EXCLUDED.version, \
            status = EXCLUDED.status, \
            attempt_count = EXCLUDED.attempt_count, \
            last_error = EXCLUDED.last_error, \
            updated_at = now()",
    )
    .bind(&state.order_id)
    .bind(state.version)
    .bind(state.status.as_str())
    .bind(state.attempt_count)
    .bind(&state.last_error)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::Core(e.into()))?;

    Ok(())
}
