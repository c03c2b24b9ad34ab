use crate::error::AppError;
use actix_web::{http::StatusCode, HttpResponse};
use error_types::{error_codes, error_types as kinds, status_reason, ErrorResponse};

/// Map a service error onto the shared JSON error body
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let (error_type, code) = match err {
        AppError::BadRequest(_) => (kinds::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
        AppError::InvalidPair(_) => (
            kinds::VALIDATION_ERROR,
            error_codes::INVALID_CONVERSATION_PAIR,
        ),
        AppError::Unauthorized => (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_INVALID),
        AppError::TokenExpired => (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_EXPIRED),
        AppError::Forbidden => (
            kinds::AUTHORIZATION_ERROR,
            error_codes::NOT_CONVERSATION_PARTICIPANT,
        ),
        AppError::NotFound(_) => (kinds::NOT_FOUND_ERROR, error_codes::CONVERSATION_NOT_FOUND),
        AppError::ServiceUnavailable(_) => (
            kinds::SERVICE_UNAVAILABLE_ERROR,
            error_codes::SERVICE_UNAVAILABLE,
        ),
        AppError::Database(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
            (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
        }
    };

    // Server-side details stay in the logs.
    let message = if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
        status_reason(status.as_u16()).to_string()
    } else {
        err.to_string()
    };

    let response = ErrorResponse::new(
        status_reason(status.as_u16()),
        &message,
        status.as_u16(),
        error_type,
        code,
    );
    (status, response)
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, body) = map_error(err);
    HttpResponse::build(status).json(body)
}
