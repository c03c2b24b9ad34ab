//! # Actix Middleware Library
//!
//! Shared middleware components for the chat backend's Actix services
//!
//! ## Modules
//! - `jwt_auth`: HS256 bearer-token validation and the authentication middleware
//! - `logging`: request/response logging through `tracing`

pub mod jwt_auth;
pub mod logging;

pub use jwt_auth::{bearer_token, Claims, JwtAuthMiddleware, JwtError, JwtValidator, UserId};
pub use logging::Logging;
