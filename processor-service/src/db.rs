use db_pool::{create_pool, DbConfig};
use sqlx::{Pool, Postgres};

use crate::config::Config;

pub async fn init_pool(config: &Config) -> Result<Pool<Postgres>, sqlx::Error> {
    let mut pool_config = DbConfig::from_env(&config.service_name, config.db_dsn.clone());
    pool_config.connect_timeout_secs = config.db_op_timeout.as_secs();
    pool_config.log_config();
    create_pool(pool_config).await
}
