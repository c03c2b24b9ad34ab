use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-conversation write turn.
///
/// A session holds the turn from the start of its append until its `Broadcast`
/// sits in the registry mailbox, so broadcasts for one conversation are queued in
/// the order the store assigned the messages, whichever session sent them.
#[derive(Default)]
pub struct ConversationLocks {
    turns: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

pub type ConversationTurn = OwnedMutexGuard<()>;

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the write turn of `conversation_id`. The turn is released when the
    /// guard is dropped.
    pub async fn acquire(&self, conversation_id: i64) -> ConversationTurn {
        let turn = {
            let mut turns = self
                .turns
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries nobody holds or waits on are dropped.
            turns.retain(|_, turn| Arc::strong_count(turn) > 1);
            Arc::clone(turns.entry(conversation_id).or_default())
        };
        turn.lock_owned().await
    }

    /// Conversations with a held or awaited turn
    pub fn active(&self) -> usize {
        self.turns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|turn| Arc::strong_count(turn) > 1)
            .count()
    }
}
