use crate::error::AppError;
use actix_middleware::{bearer_token, JwtValidator};
use actix_web::{web, HttpRequest};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Resolves the caller of a websocket upgrade.
///
/// Browsers cannot set headers on a websocket handshake, so besides
/// `Authorization: Bearer` the token is also accepted as `?token=`. The header
/// wins when both are present.
#[derive(Clone)]
pub struct JwtAuthenticator {
    validator: Arc<JwtValidator>,
}

impl JwtAuthenticator {
    pub fn new(validator: Arc<JwtValidator>) -> Self {
        Self { validator }
    }

    pub fn authenticate_request(&self, req: &HttpRequest) -> Result<i64, AppError> {
        let token = bearer_token(req.headers())
            .map(str::to_owned)
            .or_else(|| query_token(req.query_string()))
            .ok_or(AppError::Unauthorized)?;

        let claims = self.validator.validate(&token)?;
        Ok(claims.user_id)
    }
}

fn query_token(query: &str) -> Option<String> {
    web::Query::<TokenQuery>::from_query(query)
        .ok()
        .and_then(|q| q.into_inner().token)
        .filter(|t| !t.is_empty())
}
