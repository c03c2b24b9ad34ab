use crate::middleware::error_handling;
use crate::services::StoreError;
use actix_middleware::JwtError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid conversation pair: {0}")]
    InvalidPair(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("token expired")]
    TokenExpired,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) | AppError::InvalidPair(_) => 400,
            AppError::Unauthorized | AppError::TokenExpired => 401,
            AppError::Forbidden => 403,
            AppError::NotFound(_) => 404,
            AppError::ServiceUnavailable(_) => 503,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Database(_)
            | AppError::Internal => 500,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            StoreError::NotParticipant { .. } => AppError::Forbidden,
            StoreError::InvalidPair(reason) => AppError::InvalidPair(reason),
            StoreError::EmptyContent => AppError::BadRequest(e.to_string()),
            StoreError::Pool(_) => AppError::ServiceUnavailable(e.to_string()),
            StoreError::Database(_) => AppError::Database(e.to_string()),
        }
    }
}

impl From<JwtError> for AppError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => AppError::TokenExpired,
            JwtError::Missing | JwtError::Invalid(_) => AppError::Unauthorized,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(AppError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self)
    }
}
