use actix::Actor;
use actix_cors::Cors;
use actix_middleware::{JwtValidator, Logging};
use actix_web::{http::header, web, App, HttpServer};
use chat_service::{
    config, db, error, logging,
    middleware::JwtAuthenticator,
    routes,
    services::PgConversationStore,
    state::AppState,
    websocket::{ConversationLocks, SessionRegistry, Shutdown},
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);
    tracing::debug!(config = ?cfg, "configuration loaded");

    let pool = db::init_pool(&cfg.database_url).await?;
    let store = Arc::new(PgConversationStore::new(pool));

    let registry = SessionRegistry::new(store.clone(), cfg.registry_settings()).start();
    let validator = Arc::new(JwtValidator::new(cfg.jwt_secret.as_bytes()));

    let state = AppState {
        store,
        registry: registry.clone(),
        auth: Arc::new(JwtAuthenticator::new(validator.clone())),
        conversation_locks: Arc::new(ConversationLocks::new()),
        session_settings: cfg.session_settings(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    let cors_origin = cfg.cors_allowed_origin.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        let validator = validator.clone();
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(Logging)
            .configure(move |svc| routes::configure(svc, validator))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind {bind_addr}: {e}")))?
    .run();

    let result = server
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()));

    // Close remaining sockets before the process exits.
    if let Err(e) = registry.send(Shutdown).await {
        tracing::warn!(error = %e, "session registry already stopped");
    }
    tracing::info!("chat-service stopped");
    result
}
