pub mod health;
pub mod metrics;
pub mod orders;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health))
        .route("/metrics", web::get().to(metrics::metrics))
        .route("/orders", web::post().to(orders::create_order))
        .route("/orders/{order_id}", web::get().to(orders::get_order));
}
