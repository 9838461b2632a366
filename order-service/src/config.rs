use std::env;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::AppError;

/// Environment-driven configuration. Every field has a documented default so
/// the service boots in a local/dev environment with nothing but `DB_DSN`
/// and `BROKER_URL` set.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_dsn: String,
    pub broker_url: String,
    pub service_name: String,
    pub http_port: u16,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: i64,
    pub max_retries: i32,
    pub consumer_prefetch: u16,
    pub shutdown_drain_timeout: Duration,
    pub db_op_timeout: Duration,
    pub broker_connect_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let db_dsn = env::var("DB_DSN").map_err(|_| AppError::Config("DB_DSN missing".into()))?;
        let broker_url =
            env::var("BROKER_URL").map_err(|_| AppError::Config("BROKER_URL missing".into()))?;

        Ok(Self {
            db_dsn,
            broker_url,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "order-service".into()),
            http_port: env::var("HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            outbox_poll_interval: Duration::from_secs(
                env::var("OUTBOX_POLL_INTERVAL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),
            outbox_batch_size: env::var("OUTBOX_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            consumer_prefetch: env::var("CONSUMER_PREFETCH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            shutdown_drain_timeout: Duration::from_secs(
                env::var("SHUTDOWN_DRAIN_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            db_op_timeout: Duration::from_secs(
                env::var("DB_OP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            broker_connect_timeout: Duration::from_secs(
                env::var("BROKER_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            db_dsn: "postgres://localhost/order_service_test".into(),
            broker_url: "amqp://127.0.0.1:5672/%2f".into(),
            service_name: "order-service".into(),
            http_port: 8080,
            outbox_poll_interval: Duration::from_secs(5),
            outbox_batch_size: 100,
            max_retries: 3,
            consumer_prefetch: 10,
            shutdown_drain_timeout: Duration::from_secs(30),
            db_op_timeout: Duration::from_secs(10),
            broker_connect_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_external_interface_values() {
        let config = Config::test_defaults();
        assert_eq!(config.outbox_batch_size, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.consumer_prefetch, 10);
        assert_eq!(config.http_port, 8080);
    }
}
