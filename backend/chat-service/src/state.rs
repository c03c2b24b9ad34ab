use crate::middleware::JwtAuthenticator;
use crate::services::ConversationStore;
use crate::websocket::{ConversationLocks, SessionRegistry, SessionSettings};
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub registry: Addr<SessionRegistry>,
    pub auth: Arc<JwtAuthenticator>,
    pub conversation_locks: Arc<ConversationLocks>,
    pub session_settings: SessionSettings,
}
