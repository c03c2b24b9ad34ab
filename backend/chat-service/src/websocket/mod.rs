//! Websocket fanout: one actor per live connection plus a single registry actor
//! that owns the connection-to-user table and performs every broadcast.

use std::fmt;
use uuid::Uuid;

pub mod message_types;
pub mod ordering;
pub mod registry;
pub mod session;

pub use registry::{
    Broadcast, BroadcastReport, CloseSession, Deliver, Register, RegistryError,
    RegistrySettings, SessionCount, SessionHandle, SessionRegistry, Shutdown, Unregister,
    UserSessionCount,
};
pub use ordering::ConversationLocks;
pub use session::{ChatSession, SessionSettings};

/// Unique identifier of one websocket connection
///
/// A user may hold several connections at once (tabs, devices); each gets its own
/// id so it can be registered and torn down independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
