use super::SessionId;
use crate::metrics::{
    BROADCASTS_TOTAL, DELIVERIES_TOTAL, LIVE_SESSIONS, SESSIONS_EVICTED_TOTAL,
};
use crate::models::{Message as ChatMessage, Participants};
use crate::services::{ConversationStore, StoreError};
use actix::dev::ToEnvelope;
use actix::prelude::*;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

// =========================================================================
// Session-facing messages
// =========================================================================

/// One serialized message frame to write to a session's socket
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct Deliver(pub Arc<str>);

/// Ask a session to close its socket and stop
#[derive(Debug, Clone, Copy, Message)]
#[rtype(result = "()")]
pub struct CloseSession;

/// What the registry keeps for each live connection
#[derive(Clone)]
pub struct SessionHandle {
    deliver: Recipient<Deliver>,
    close: Recipient<CloseSession>,
}

impl SessionHandle {
    pub fn new<A>(addr: Addr<A>) -> Self
    where
        A: Actor + Handler<Deliver> + Handler<CloseSession>,
        A::Context: ToEnvelope<A, Deliver> + ToEnvelope<A, CloseSession>,
    {
        Self {
            deliver: addr.clone().recipient(),
            close: addr.recipient(),
        }
    }
}

// =========================================================================
// Registry messages
// =========================================================================

#[derive(Message)]
#[rtype(result = "Result<(), RegistryError>")]
pub struct Register {
    pub session_id: SessionId,
    pub user_id: i64,
    pub handle: SessionHandle,
}

/// Remove a session. Resolves to `true` only for the call that removed it.
#[derive(Debug, Message)]
#[rtype(result = "bool")]
pub struct Unregister {
    pub session_id: SessionId,
}

/// Push a persisted message to every live session of both participants
#[derive(Debug, Message)]
#[rtype(result = "Result<BroadcastReport, RegistryError>")]
pub struct Broadcast {
    pub conversation_id: i64,
    pub message: ChatMessage,
}

#[derive(Debug, Message)]
#[rtype(result = "usize")]
pub struct SessionCount;

#[derive(Debug, Message)]
#[rtype(result = "usize")]
pub struct UserSessionCount(pub i64);

/// Close every live session and stop the registry
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct Shutdown;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions belonging to either participant
    pub recipients: usize,
    pub delivered: usize,
    /// Sessions torn down because their push failed
    pub evicted: usize,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),

    #[error("participant lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("failed to encode message frame: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    /// Deadline for a single push into one session
    pub delivery_timeout: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_millis(2000),
        }
    }
}

// =========================================================================
// Registry actor
// =========================================================================

struct SessionEntry {
    user_id: i64,
    handle: SessionHandle,
}

type PushTarget = (SessionId, Recipient<Deliver>);
type PushResult = (SessionId, Result<(), MailboxError>);

/// Single owner of the live connection table.
///
/// Register, unregister and broadcast are mailbox messages handled one at a time.
/// A broadcast is an atomic response: no other message is handled until its
/// pushes have completed and failed sessions have been evicted, so recipients see
/// the messages of a conversation in the order they were submitted.
pub struct SessionRegistry {
    store: Arc<dyn ConversationStore>,
    sessions: HashMap<SessionId, SessionEntry>,
    settings: RegistrySettings,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn ConversationStore>, settings: RegistrySettings) -> Self {
        Self {
            store,
            sessions: HashMap::new(),
            settings,
        }
    }

    fn push_targets(&self, participants: &Participants) -> Vec<PushTarget> {
        self.sessions
            .iter()
            .filter(|(_, entry)| participants.contains(entry.user_id))
            .map(|(id, entry)| (*id, entry.handle.deliver.clone()))
            .collect()
    }

    /// Drop the entry and close its socket. Only the call that actually removes
    /// the entry closes it.
    fn remove_session(&mut self, session_id: SessionId) -> bool {
        match self.sessions.remove(&session_id) {
            Some(entry) => {
                entry.handle.close.do_send(CloseSession);
                LIVE_SESSIONS.set(self.sessions.len() as i64);
                true
            }
            None => false,
        }
    }
}

impl Actor for SessionRegistry {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(
            delivery_timeout_ms = self.settings.delivery_timeout.as_millis() as u64,
            "session registry started"
        );
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!("session registry stopped");
    }
}

impl Handler<Register> for SessionRegistry {
    type Result = Result<(), RegistryError>;

    fn handle(&mut self, msg: Register, _: &mut Context<Self>) -> Self::Result {
        if self.sessions.contains_key(&msg.session_id) {
            warn!(session_id = %msg.session_id, user_id = msg.user_id, "duplicate session registration refused");
            return Err(RegistryError::DuplicateSession(msg.session_id));
        }

        self.sessions.insert(
            msg.session_id,
            SessionEntry {
                user_id: msg.user_id,
                handle: msg.handle,
            },
        );
        LIVE_SESSIONS.set(self.sessions.len() as i64);
        debug!(session_id = %msg.session_id, user_id = msg.user_id, "session registered");
        Ok(())
    }
}

impl Handler<Unregister> for SessionRegistry {
    type Result = bool;

    fn handle(&mut self, msg: Unregister, _: &mut Context<Self>) -> bool {
        let removed = self.remove_session(msg.session_id);
        if removed {
            debug!(session_id = %msg.session_id, "session unregistered");
        }
        removed
    }
}

impl Handler<Broadcast> for SessionRegistry {
    type Result = AtomicResponse<Self, Result<BroadcastReport, RegistryError>>;

    fn handle(&mut self, msg: Broadcast, _: &mut Context<Self>) -> Self::Result {
        let Broadcast {
            conversation_id,
            message,
        } = msg;

        let payload: Arc<str> = match serde_json::to_string(&message) {
            Ok(json) => json.into(),
            Err(e) => {
                BROADCASTS_TOTAL.with_label_values(&["dropped"]).inc();
                let result: Result<BroadcastReport, RegistryError> = Err(e.into());
                return AtomicResponse::new(Box::pin(fut::ready(result)));
            }
        };
        let store = Arc::clone(&self.store);
        let delivery_timeout = self.settings.delivery_timeout;

        AtomicResponse::new(Box::pin(
            async move { store.resolve_participants(conversation_id).await }
                .into_actor(self)
                .map(
                    |lookup, act, _| -> Result<Vec<PushTarget>, RegistryError> {
                        Ok(act.push_targets(&lookup?))
                    },
                )
                .then(move |targets, act, _| {
                    async move {
                        match targets {
                            Ok(targets) => {
                                let pushes = targets.into_iter().map(|(session_id, recipient)| {
                                    let frame = Deliver(Arc::clone(&payload));
                                    async move {
                                        let result =
                                            recipient.send(frame).timeout(delivery_timeout).await;
                                        (session_id, result)
                                    }
                                });
                                Ok(join_all(pushes).await)
                            }
                            Err(e) => Err(e),
                        }
                    }
                    .into_actor(act)
                })
                .map(
                    move |outcome: Result<Vec<PushResult>, RegistryError>, act, _| {
                        let results = match outcome {
                            Ok(results) => results,
                            Err(e) => {
                                warn!(conversation_id, error = %e, "broadcast dropped");
                                BROADCASTS_TOTAL.with_label_values(&["dropped"]).inc();
                                return Err(e);
                            }
                        };

                        let mut report = BroadcastReport {
                            recipients: results.len(),
                            ..BroadcastReport::default()
                        };
                        for (session_id, result) in results {
                            match result {
                                Ok(()) => {
                                    report.delivered += 1;
                                    DELIVERIES_TOTAL.with_label_values(&["ok"]).inc();
                                }
                                Err(e) => {
                                    let label = match e {
                                        MailboxError::Timeout => "timeout",
                                        _ => "closed",
                                    };
                                    DELIVERIES_TOTAL.with_label_values(&[label]).inc();
                                    warn!(%session_id, conversation_id, reason = label, "push failed, evicting session");
                                    if act.remove_session(session_id) {
                                        report.evicted += 1;
                                        SESSIONS_EVICTED_TOTAL.inc();
                                    }
                                }
                            }
                        }

                        BROADCASTS_TOTAL.with_label_values(&["delivered"]).inc();
                        debug!(
                            conversation_id,
                            recipients = report.recipients,
                            delivered = report.delivered,
                            evicted = report.evicted,
                            "broadcast complete"
                        );
                        Ok(report)
                    },
                ),
        ))
    }
}

impl Handler<SessionCount> for SessionRegistry {
    type Result = usize;

    fn handle(&mut self, _: SessionCount, _: &mut Context<Self>) -> usize {
        self.sessions.len()
    }
}

impl Handler<UserSessionCount> for SessionRegistry {
    type Result = usize;

    fn handle(&mut self, msg: UserSessionCount, _: &mut Context<Self>) -> usize {
        self.sessions
            .values()
            .filter(|entry| entry.user_id == msg.0)
            .count()
    }
}

impl Handler<Shutdown> for SessionRegistry {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Context<Self>) {
        info!(sessions = self.sessions.len(), "closing all sessions");
        for (_, entry) in self.sessions.drain() {
            entry.handle.close.do_send(CloseSession);
        }
        LIVE_SESSIONS.set(0);
        ctx.stop();
    }
}
