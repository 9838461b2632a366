use actix_web::{HttpResponse, ResponseError};
use chrono::Utc;
use messaging_core::CoreError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("processing state not found")]
    NotFound,

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AppError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Core(e) if e.is_retryable())
    }
}

#[derive(Debug, Serialize)]
struct HttpErrorResponse {
    status: u16,
    code: String,
    message: String,
    timestamp: chrono::DateTime<Utc>,
}

impl HttpErrorResponse {
    fn new(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Validation(msg) => HttpErrorResponse::new(422, "VALIDATION_FAILED", msg.clone()),
            AppError::NotFound => HttpErrorResponse::new(404, "NOT_FOUND", "processing state not found"),
            AppError::Config(msg) | AppError::StartServer(msg) => {
                HttpErrorResponse::new(500, "INTERNAL_ERROR", msg.clone())
            }
            AppError::Core(CoreError::Validation(msg)) => {
                HttpErrorResponse::new(422, "VALIDATION_FAILED", msg.clone())
            }
            AppError::Core(CoreError::Conflict(msg)) => {
                HttpErrorResponse::new(409, "CONFLICT", msg.clone())
            }
            AppError::Core(e) => HttpErrorResponse::new(500, "INTERNAL_ERROR", e.to_string()),
        };

        HttpResponse::build(
            actix_web::http::StatusCode::from_u16(body.status)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        )
        .json(body)
    }
}
