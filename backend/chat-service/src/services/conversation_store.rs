use crate::models::{ConversationSummary, Message, Participants};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(i64),

    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotParticipant { conversation_id: i64, user_id: i64 },

    #[error("invalid conversation pair: {0}")]
    InvalidPair(String),

    #[error("message content is empty")]
    EmptyContent,

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

impl StoreError {
    /// Errors caused by the backing database being unreachable or failing,
    /// as opposed to the request itself being wrong.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Pool(_) | StoreError::Database(_))
    }
}

/// Durable storage for conversations and their messages.
///
/// The websocket path only needs `resolve_participants` and `append_message`;
/// the remaining operations back the REST endpoints.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Both participants of a conversation, or `NotFound`.
    async fn resolve_participants(&self, conversation_id: i64) -> Result<Participants, StoreError>;

    /// Atomically insert a message and refresh the conversation's
    /// `last_message`/`last_message_at`. A message's timestamp is never older than
    /// the previous one in the same conversation.
    async fn append_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<Message, StoreError>;

    /// Id of the conversation between two distinct users, creating it if needed.
    /// The pair is unordered.
    async fn create_conversation(&self, user_a: i64, user_b: i64) -> Result<i64, StoreError>;

    /// Conversations of `user_id`, most recent activity first.
    async fn list_conversations(&self, user_id: i64)
        -> Result<Vec<ConversationSummary>, StoreError>;

    /// Full history in send order. Messages from the peer are marked read.
    async fn fetch_messages(
        &self,
        conversation_id: i64,
        reader_id: i64,
    ) -> Result<Vec<Message>, StoreError>;
}
