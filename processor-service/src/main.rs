use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use messaging_core::broker::{self, ConsumerPipeline, LapinOutboxPublisher, ORDER_CREATED};
use messaging_core::metrics::CoreMetrics;
use messaging_core::outbox::{OutboxProcessor, OutboxPumpConfig};
use prometheus::Registry;
use tokio_util::sync::CancellationToken;

use processor_service::{
    config, db,
    error::AppError,
    handler::HandleOrderCreatedHandler,
    logging, migrations,
    policy::DefaultPolicy,
    routes,
    state::AppState,
};

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let pool = db::init_pool(&cfg)
        .await
        .map_err(|e| AppError::StartServer(format!("db: {e}")))?;

    migrations::run_all(&pool)
        .await
        .map_err(|e| AppError::StartServer(format!("migrations: {e}")))?;

    let registry = Arc::new(Registry::new());
    let metrics = Arc::new(CoreMetrics::new(&registry));

    let (_broker_conn, channel) = broker::connect_and_declare(&cfg.broker_url, &[ORDER_CREATED])
        .await
        .map_err(|e| AppError::StartServer(format!("broker: {e}")))?;

    let publisher = Arc::new(LapinOutboxPublisher::new(channel.clone()));
    let pump_config = OutboxPumpConfig {
        batch_size: cfg.outbox_batch_size,
        poll_interval: cfg.outbox_poll_interval,
        max_retries: cfg.max_retries,
    };
    let outbox_processor = OutboxProcessor::new(pool.clone(), publisher, pump_config, metrics.clone());

    let shutdown = CancellationToken::new();

    let pump_shutdown = shutdown.clone();
    let pump_handle = tokio::spawn(async move {
        outbox_processor.start(pump_shutdown).await;
    });

    let policy: Arc<dyn processor_service::policy::ProcessingPolicy> = Arc::new(DefaultPolicy::new(
        cfg.embargo_skus.clone(),
        cfg.processing_success_prob,
    ));

    let consumer_pipeline = Arc::new(ConsumerPipeline::new(
        channel.clone(),
        pool.clone(),
        Arc::new(HandleOrderCreatedHandler::new(policy)),
        cfg.consumer_prefetch,
    ));
    let consumer_shutdown = shutdown.clone();
    let drain_timeout = cfg.shutdown_drain_timeout;
    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = consumer_pipeline.run(consumer_shutdown, drain_timeout).await {
            tracing::error!(error = %e, "consumer pipeline exited with an error");
        }
    });

    let state = AppState {
        pool: pool.clone(),
        config: cfg.clone(),
        metrics: metrics.clone(),
        registry: registry.clone(),
        broker_channel: channel,
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.http_port);
    tracing::info!(%bind_addr, "processor-service starting");

    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure_routes)
    })
    .bind(&bind_addr)
    .map_err(|e| AppError::StartServer(format!("failed to bind HTTP server: {e}")))?
    .run();

    tokio::select! {
        result = http_server => {
            result.map_err(|e| AppError::StartServer(format!("HTTP server error: {e}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    shutdown.cancel();
    let _ = tokio::join!(pump_handle, consumer_handle);

    Ok(())
}
