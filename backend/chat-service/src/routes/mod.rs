pub mod conversations;
pub mod wsroute;

use crate::metrics::metrics_handler;
use actix_middleware::{JwtAuthMiddleware, JwtValidator};
use actix_web::web;
use std::sync::Arc;

async fn health() -> &'static str {
    "OK"
}

/// Register every route. The REST scope sits behind bearer-token middleware; the
/// websocket routes authenticate inside the handler because they also accept
/// `?token=`.
pub fn configure(cfg: &mut web::ServiceConfig, validator: Arc<JwtValidator>) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/ws/{conversation_id}", web::get().to(wsroute::ws_handler))
        .route("/ws/chat/{conversation_id}", web::get().to(wsroute::ws_handler))
        .service(
            web::scope("/api")
                .wrap(JwtAuthMiddleware::new(validator))
                .service(conversations::create_connection)
                .service(conversations::list_connections)
                .service(conversations::get_messages),
        );
}
