use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two users of a one-to-one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participants {
    pub user_a: i64,
    pub user_b: i64,
}

impl Participants {
    pub fn new(user_a: i64, user_b: i64) -> Self {
        Self { user_a, user_b }
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    /// The peer of `user_id`, if `user_id` is a participant
    pub fn other(&self, user_id: i64) -> Option<i64> {
        if self.user_a == user_id {
            Some(self.user_b)
        } else if self.user_b == user_id {
            Some(self.user_a)
        } else {
            None
        }
    }
}

/// One row of the conversation list shown to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub other_user_id: i64,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
}
