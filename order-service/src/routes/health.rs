use actix_web::{web, HttpResponse};

use crate::state::AppState;

/// `200` when both the database and the broker channel are healthy, `503`
/// otherwise.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let broker_ok = state.broker_channel.status().connected();

    if db_ok && broker_ok {
        HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
    } else {
        tracing::warn!(db_ok, broker_ok, "health check failed");
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "unavailable",
            "db_ok": db_ok,
            "broker_ok": broker_ok,
        }))
    }
}
