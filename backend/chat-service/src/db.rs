use crate::error::AppError;
use crate::migrations;
use db_pool::{create_pool as create_pg_pool, DbConfig as DbPoolConfig, PgPool};

pub async fn init_pool(database_url: &str) -> Result<PgPool, AppError> {
    let mut cfg = DbPoolConfig::from_env("chat-service").unwrap_or_default();
    cfg.service_name = "chat-service".to_string();
    if cfg.database_url.is_empty() {
        cfg.database_url = database_url.to_string();
    }
    cfg.log_config();

    let pool = create_pg_pool(cfg)
        .await
        .map_err(|e| AppError::StartServer(format!("db: {e}")))?;
    migrations::run_all(&pool)
        .await
        .map_err(|e| AppError::StartServer(format!("migrations: {e}")))?;
    Ok(pool)
}
