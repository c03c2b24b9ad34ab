use super::message_types::{ErrorCode, ErrorFrame, InboundFrame};
use super::ordering::ConversationLocks;
use super::registry::{
    Broadcast, CloseSession, Deliver, Register, SessionHandle, SessionRegistry, Unregister,
};
use super::SessionId;
use crate::metrics::{
    MESSAGES_PERSISTED_TOTAL, PERSIST_FAILURES_TOTAL, SLOW_CLIENTS_CLOSED_TOTAL,
};
use crate::services::ConversationStore;
use actix::prelude::*;
use actix_web_actors::ws;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Contents accepted but not yet persisted, per connection
pub const MAX_PENDING_FRAMES: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    /// Upper bound on message content, in characters
    pub max_message_length: usize,
    /// Delivered frames the client may leave unacknowledged before it is dropped
    pub max_unacked_frames: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(30),
            max_message_length: 4000,
            max_unacked_frames: 256,
        }
    }
}

/// Most recent heartbeat pings remembered for acknowledgement
const MAX_PINGS_IN_FLIGHT: usize = 16;

/// Counts delivered frames the client has not shown it has read.
///
/// Every heartbeat ping carries a sequence number. A pong echoing it proves the
/// client read everything written before that ping.
#[derive(Debug, Default)]
struct OutboundWindow {
    delivered: u64,
    acked: u64,
    last_ping: u64,
    pings: VecDeque<(u64, u64)>,
}

impl OutboundWindow {
    /// Record one more delivered frame, returning the unacknowledged count
    fn push_frame(&mut self) -> u64 {
        self.delivered += 1;
        self.unacked()
    }

    fn unacked(&self) -> u64 {
        self.delivered - self.acked
    }

    fn next_ping(&mut self) -> [u8; 8] {
        self.last_ping += 1;
        if self.pings.len() == MAX_PINGS_IN_FLIGHT {
            self.pings.pop_front();
        }
        self.pings.push_back((self.last_ping, self.delivered));
        self.last_ping.to_be_bytes()
    }

    /// Returns false for a pong that answers none of our pings
    fn ack(&mut self, payload: &[u8]) -> bool {
        let Ok(seq) = <[u8; 8]>::try_from(payload).map(u64::from_be_bytes) else {
            return false;
        };
        let mut matched = false;
        while let Some(&(ping, delivered_before)) = self.pings.front() {
            if ping > seq {
                break;
            }
            self.pings.pop_front();
            self.acked = self.acked.max(delivered_before);
            matched = true;
        }
        matched
    }
}

/// Actor owning one client socket bound to one conversation.
///
/// Inbound contents are appended to the store one at a time in arrival order.
/// Each append runs under the conversation's write turn, which is released only
/// once the stored message has been handed to the registry, so every participant
/// sees a conversation's messages in store order. Outbound frames arrive only as
/// [`Deliver`] from the registry, including the echo of the client's own messages.
pub struct ChatSession {
    id: SessionId,
    user_id: i64,
    conversation_id: i64,
    registry: Addr<SessionRegistry>,
    store: Arc<dyn ConversationStore>,
    locks: Arc<ConversationLocks>,
    settings: SessionSettings,
    hb: Instant,
    pending: VecDeque<String>,
    persisting: bool,
    outbound: OutboundWindow,
}

impl ChatSession {
    pub fn new(
        user_id: i64,
        conversation_id: i64,
        registry: Addr<SessionRegistry>,
        store: Arc<dyn ConversationStore>,
        locks: Arc<ConversationLocks>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            conversation_id,
            registry,
            store,
            locks,
            settings,
            hb: Instant::now(),
            pending: VecDeque::new(),
            persisting: false,
            outbound: OutboundWindow::default(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.settings.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.hb) > act.settings.client_timeout {
                warn!(session_id = %act.id, user_id = act.user_id, "websocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            let seq = act.outbound.next_ping();
            ctx.ping(&seq);
        });
    }

    fn send_error(ctx: &mut ws::WebsocketContext<Self>, code: ErrorCode, message: String) {
        ctx.text(ErrorFrame::new(code, message).to_json());
    }

    fn accept(&mut self, content: String, ctx: &mut ws::WebsocketContext<Self>) {
        if content.trim().is_empty() {
            debug!(session_id = %self.id, "empty message dropped");
            return;
        }

        let max = self.settings.max_message_length;
        if content.chars().count() > max {
            Self::send_error(
                ctx,
                ErrorCode::MessageTooLong,
                format!("message exceeds {max} characters"),
            );
            return;
        }

        if self.pending.len() >= MAX_PENDING_FRAMES {
            warn!(session_id = %self.id, user_id = self.user_id, "inbound backlog full");
            Self::send_error(
                ctx,
                ErrorCode::BacklogFull,
                "too many messages in flight, slow down".to_string(),
            );
            return;
        }

        self.pending.push_back(content);
        self.persist_next(ctx);
    }

    fn persist_next(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if self.persisting {
            return;
        }
        let Some(content) = self.pending.pop_front() else {
            return;
        };
        self.persisting = true;

        let store = Arc::clone(&self.store);
        let locks = Arc::clone(&self.locks);
        let (conversation_id, sender_id) = (self.conversation_id, self.user_id);
        let append = async move {
            let turn = locks.acquire(conversation_id).await;
            let result = store.append_message(conversation_id, sender_id, &content).await;
            (result, turn)
        };

        ctx.spawn(append.into_actor(self).map(|(result, turn), act, ctx| {
            act.persisting = false;
            match result {
                Ok(message) => {
                    MESSAGES_PERSISTED_TOTAL.inc();
                    act.registry.do_send(Broadcast {
                        conversation_id: act.conversation_id,
                        message,
                    });
                }
                Err(e) => {
                    PERSIST_FAILURES_TOTAL.inc();
                    error!(
                        session_id = %act.id,
                        conversation_id = act.conversation_id,
                        user_id = act.user_id,
                        error = %e,
                        "failed to persist message"
                    );
                    Self::send_error(
                        ctx,
                        ErrorCode::MessageNotPersisted,
                        "message could not be saved, please retry".to_string(),
                    );
                }
            }
            // The broadcast is queued; the next append may take the turn.
            drop(turn);
            act.persist_next(ctx);
        }));
    }

    fn close_with(ctx: &mut ws::WebsocketContext<Self>, code: ws::CloseCode, description: &str) {
        ctx.close(Some(ws::CloseReason {
            code,
            description: Some(description.to_string()),
        }));
        ctx.stop();
    }
}

impl Actor for ChatSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);

        let register = Register {
            session_id: self.id,
            user_id: self.user_id,
            handle: SessionHandle::new(ctx.address()),
        };
        // Frames are not read until the registry knows about this session, so the
        // sender always receives the echo of its first message.
        ctx.wait(
            self.registry
                .send(register)
                .into_actor(self)
                .map(|result, act, ctx| match result {
                    Ok(Ok(())) => info!(
                        session_id = %act.id,
                        user_id = act.user_id,
                        conversation_id = act.conversation_id,
                        "websocket session connected"
                    ),
                    Ok(Err(e)) => {
                        warn!(session_id = %act.id, error = %e, "session registration refused");
                        ctx.stop();
                    }
                    Err(e) => {
                        error!(session_id = %act.id, error = %e, "session registry unavailable");
                        ctx.stop();
                    }
                }),
        );
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        self.registry.do_send(Unregister {
            session_id: self.id,
        });
        info!(
            session_id = %self.id,
            user_id = self.user_id,
            conversation_id = self.conversation_id,
            dropped_pending = self.pending.len(),
            "websocket session closed"
        );
    }
}

impl Handler<Deliver> for ChatSession {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        let unacked = self.outbound.push_frame();
        if unacked > self.settings.max_unacked_frames {
            SLOW_CLIENTS_CLOSED_TOTAL.inc();
            warn!(session_id = %self.id, user_id = self.user_id, unacked, "client is not reading, closing session");
            Self::close_with(ctx, ws::CloseCode::Policy, "client is not keeping up");
            return;
        }
        ctx.text(&*msg.0);
    }
}

impl Handler<CloseSession> for ChatSession {
    type Result = ();

    fn handle(&mut self, _: CloseSession, ctx: &mut Self::Context) {
        Self::close_with(ctx, ws::CloseCode::Away, "session closed by server");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ChatSession {
    fn handle(&mut self, item: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match item {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "websocket protocol error");
                ctx.stop();
                return;
            }
        };

        match msg {
            ws::Message::Ping(bytes) => {
                self.hb = Instant::now();
                ctx.pong(&bytes);
            }
            ws::Message::Pong(bytes) => {
                self.hb = Instant::now();
                if !self.outbound.ack(&bytes) {
                    debug!(session_id = %self.id, "pong without a matching ping");
                }
            }
            ws::Message::Text(text) => {
                self.hb = Instant::now();
                match serde_json::from_str::<InboundFrame>(&text) {
                    Ok(frame) => self.accept(frame.content, ctx),
                    Err(e) => {
                        warn!(session_id = %self.id, error = %e, "malformed frame, closing session");
                        Self::close_with(ctx, ws::CloseCode::Invalid, "malformed message");
                    }
                }
            }
            ws::Message::Binary(_) | ws::Message::Continuation(_) => {
                warn!(session_id = %self.id, "unsupported frame type, closing session");
                Self::close_with(ctx, ws::CloseCode::Unsupported, "text frames only");
            }
            ws::Message::Close(reason) => {
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Nop => {}
        }
    }
}
