use crate::error::AppError;
use crate::state::AppState;
use crate::websocket::ChatSession;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use std::sync::Arc;
use tracing::warn;

/// `GET /ws/{conversation_id}`
///
/// The caller must be authenticated and a participant of the conversation before
/// the upgrade happens; nothing is registered for a refused handshake.
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let conversation_id = path.into_inner();
    let user_id = state.auth.authenticate_request(&req)?;

    let participants = state
        .store
        .resolve_participants(conversation_id)
        .await
        .map_err(|e| {
            if e.is_unavailable() {
                AppError::ServiceUnavailable(e.to_string())
            } else {
                AppError::from(e)
            }
        })?;

    if !participants.contains(user_id) {
        warn!(user_id, conversation_id, "websocket upgrade refused: not a participant");
        return Err(AppError::Forbidden.into());
    }

    let session = ChatSession::new(
        user_id,
        conversation_id,
        state.registry.clone(),
        Arc::clone(&state.store),
        Arc::clone(&state.conversation_locks),
        state.session_settings,
    );
    ws::start(session, &req, stream)
}
