use super::conversation_store::{ConversationStore, StoreError};
use crate::models::{ConversationSummary, Message, Participants};
use async_trait::async_trait;
use db_pool::{acquire_with_metrics, PgPool};
use deadpool_postgres::Client;
use tokio_postgres::Row;

const SERVICE_NAME: &str = "chat-service";

/// Insert a message and refresh the conversation cache in one statement.
///
/// The conversation row is locked for the duration of the statement and the new
/// timestamp is clamped to the previous `last_message_at`, so the cache always
/// reflects the newest message even when the wall clock steps backwards. No row
/// comes back when the sender is not a participant.
const APPEND_MESSAGE_SQL: &str = r#"
WITH conv AS (
    SELECT id, last_message_at
    FROM conversations
    WHERE id = $1 AND (user_id_1 = $2 OR user_id_2 = $2)
    FOR UPDATE
), inserted AS (
    INSERT INTO messages (conversation_id, sender_id, content, created_at)
    SELECT conv.id, $2, $3,
           GREATEST(clock_timestamp(), COALESCE(conv.last_message_at, '-infinity'::timestamptz))
    FROM conv
    RETURNING id, conversation_id, sender_id, content, read, created_at
), touched AS (
    UPDATE conversations c
    SET last_message = inserted.content,
        last_message_at = inserted.created_at
    FROM inserted
    WHERE c.id = inserted.conversation_id
)
SELECT id, conversation_id, sender_id, content, read, created_at
FROM inserted
"#;

const LIST_CONVERSATIONS_SQL: &str = r#"
SELECT c.id,
       CASE WHEN c.user_id_1 = $1 THEN c.user_id_2 ELSE c.user_id_1 END AS other_user_id,
       c.last_message,
       c.last_message_at,
       (SELECT COUNT(*)
          FROM messages m
         WHERE m.conversation_id = c.id
           AND m.sender_id <> $1
           AND NOT m.read) AS unread_count
FROM conversations c
WHERE c.user_id_1 = $1 OR c.user_id_2 = $1
ORDER BY c.last_message_at DESC NULLS LAST, c.id DESC
"#;

/// PostgreSQL-backed [`ConversationStore`]
#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn client(&self) -> Result<Client, StoreError> {
        Ok(acquire_with_metrics(&self.pool, SERVICE_NAME).await?)
    }
}

fn message_from_row(row: &Row) -> Result<Message, tokio_postgres::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender_id: row.try_get("sender_id")?,
        content: row.try_get("content")?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn summary_from_row(row: &Row) -> Result<ConversationSummary, tokio_postgres::Error> {
    Ok(ConversationSummary {
        id: row.try_get("id")?,
        other_user_id: row.try_get("other_user_id")?,
        last_message: row.try_get("last_message")?,
        last_message_at: row.try_get("last_message_at")?,
        unread_count: row.try_get("unread_count")?,
    })
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn resolve_participants(&self, conversation_id: i64) -> Result<Participants, StoreError> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT user_id_1, user_id_2 FROM conversations WHERE id = $1",
                &[&conversation_id],
            )
            .await?
            .ok_or(StoreError::NotFound(conversation_id))?;

        Ok(Participants::new(row.try_get(0)?, row.try_get(1)?))
    }

    async fn append_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<Message, StoreError> {
        if content.trim().is_empty() {
            return Err(StoreError::EmptyContent);
        }

        let client = self.client().await?;
        let row = client
            .query_opt(APPEND_MESSAGE_SQL, &[&conversation_id, &sender_id, &content])
            .await?
            .ok_or(StoreError::NotParticipant {
                conversation_id,
                user_id: sender_id,
            })?;

        Ok(message_from_row(&row)?)
    }

    async fn create_conversation(&self, user_a: i64, user_b: i64) -> Result<i64, StoreError> {
        if user_a == user_b {
            return Err(StoreError::InvalidPair(
                "cannot start a conversation with yourself".into(),
            ));
        }
        // Pairs are stored smaller id first so (a, b) and (b, a) hit the same key.
        let (low, high) = (user_a.min(user_b), user_a.max(user_b));

        let client = self.client().await?;
        let inserted = client
            .query_opt(
                "INSERT INTO conversations (user_id_1, user_id_2) VALUES ($1, $2) \
                 ON CONFLICT (user_id_1, user_id_2) DO NOTHING RETURNING id",
                &[&low, &high],
            )
            .await?;

        if let Some(row) = inserted {
            let id: i64 = row.try_get(0)?;
            tracing::info!(conversation_id = id, user_a = low, user_b = high, "conversation created");
            return Ok(id);
        }

        let row = client
            .query_one(
                "SELECT id FROM conversations WHERE user_id_1 = $1 AND user_id_2 = $2",
                &[&low, &high],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn list_conversations(
        &self,
        user_id: i64,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let client = self.client().await?;
        let rows = client.query(LIST_CONVERSATIONS_SQL, &[&user_id]).await?;

        rows.iter()
            .map(|row| summary_from_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn fetch_messages(
        &self,
        conversation_id: i64,
        reader_id: i64,
    ) -> Result<Vec<Message>, StoreError> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT user_id_1, user_id_2 FROM conversations WHERE id = $1",
                &[&conversation_id],
            )
            .await?
            .ok_or(StoreError::NotFound(conversation_id))?;
        let participants = Participants::new(row.try_get(0)?, row.try_get(1)?);
        if !participants.contains(reader_id) {
            return Err(StoreError::NotParticipant {
                conversation_id,
                user_id: reader_id,
            });
        }

        tx.execute(
            "UPDATE messages SET read = TRUE \
             WHERE conversation_id = $1 AND sender_id <> $2 AND NOT read",
            &[&conversation_id, &reader_id],
        )
        .await?;

        let rows = tx
            .query(
                "SELECT id, conversation_id, sender_id, content, read, created_at \
                 FROM messages WHERE conversation_id = $1 \
                 ORDER BY created_at ASC, id ASC",
                &[&conversation_id],
            )
            .await?;
        let messages = rows
            .iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit().await?;
        Ok(messages)
    }
}
