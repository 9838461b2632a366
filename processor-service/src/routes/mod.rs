pub mod health;
pub mod metrics;
pub mod processing_states;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .route("/metrics", web::get().to(metrics::metrics))
        .route(
            "/processing-states/{order_id}",
            web::get().to(processing_states::get_processing_state),
        );
}
