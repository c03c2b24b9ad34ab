use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_middleware::UserId;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub user_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConnectionResponse {
    pub connection_id: i64,
}

/// Open (or return the existing) conversation with another user
#[post("/connections")]
pub async fn create_connection(
    user: UserId,
    state: web::Data<AppState>,
    body: web::Json<CreateConnectionRequest>,
) -> AppResult<HttpResponse> {
    let other = body.into_inner().user_id;
    if other <= 0 {
        return Err(AppError::BadRequest("user_id must be positive".into()));
    }

    let connection_id = state.store.create_conversation(user.0, other).await?;
    Ok(HttpResponse::Ok().json(CreateConnectionResponse { connection_id }))
}

#[get("/connections")]
pub async fn list_connections(
    user: UserId,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let conversations = state.store.list_conversations(user.0).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

/// Message history for a conversation; marks the peer's messages as read
#[get("/connections/{id}/messages")]
pub async fn get_messages(
    user: UserId,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let messages = state.store.fetch_messages(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(messages))
}
