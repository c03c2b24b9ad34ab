use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted chat message.
///
/// This is also the outbound websocket frame: it is serialized verbatim for every
/// recipient, so field names are part of the client contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
