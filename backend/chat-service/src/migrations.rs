use db_pool::PgPool;

// Embedded at compile time; every statement is idempotent so startup can re-run them.
const MIG_0001: &str = include_str!("../migrations/0001_create_conversations.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_messages.sql");

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("failed to acquire connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("migration {label} failed: {source}")]
    Apply {
        label: usize,
        #[source]
        source: tokio_postgres::Error,
    },
}

pub async fn run_all(db: &PgPool) -> Result<(), MigrationError> {
    let client = db.get().await?;
    for (i, sql) in [MIG_0001, MIG_0002].into_iter().enumerate() {
        let label = i + 1;
        client
            .batch_execute(sql)
            .await
            .map_err(|source| MigrationError::Apply { label, source })?;
        tracing::info!(migration = %label, "chat-service migration applied");
    }
    Ok(())
}
