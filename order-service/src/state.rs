use std::sync::Arc;

use lapin::Channel;
use messaging_core::metrics::CoreMetrics;
use prometheus::Registry;
use sqlx::PgPool;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub metrics: Arc<CoreMetrics>,
    pub registry: Arc<Registry>,
    pub broker_channel: Channel,
}
