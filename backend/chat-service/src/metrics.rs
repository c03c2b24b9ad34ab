//! Prometheus metrics for live sessions and message fanout

use actix_web::{HttpResponse, Responder};
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static::lazy_static! {
    /// Websocket sessions currently held by the registry
    pub static ref LIVE_SESSIONS: IntGauge = register_int_gauge!(
        "chat_live_sessions",
        "Number of registered websocket sessions"
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Broadcast passes by outcome (delivered/dropped)
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chat_broadcasts_total",
        "Broadcast passes by outcome",
        &["outcome"]
    ).expect("Prometheus metrics registration should succeed at startup");

    /// Individual pushes by result (ok/closed/timeout)
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chat_deliveries_total",
        "Per-session message pushes by result",
        &["result"]
    ).expect("Prometheus metrics registration should succeed at startup");

    pub static ref SESSIONS_EVICTED_TOTAL: IntCounter = register_int_counter!(
        "chat_sessions_evicted_total",
        "Sessions torn down after a failed push"
    ).expect("Prometheus metrics registration should succeed at startup");

    pub static ref MESSAGES_PERSISTED_TOTAL: IntCounter = register_int_counter!(
        "chat_messages_persisted_total",
        "Inbound messages appended to the store"
    ).expect("Prometheus metrics registration should succeed at startup");

    pub static ref PERSIST_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "chat_persist_failures_total",
        "Inbound messages the store failed to append"
    ).expect("Prometheus metrics registration should succeed at startup");

    pub static ref SLOW_CLIENTS_CLOSED_TOTAL: IntCounter = register_int_counter!(
        "chat_slow_clients_closed_total",
        "Sessions closed because the client stopped reading"
    ).expect("Prometheus metrics registration should succeed at startup");
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl Responder {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
