use crate::error::AppError;
use crate::websocket::{RegistrySettings, SessionSettings};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub cors_allowed_origin: String,
    pub delivery_timeout_ms: u64,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
    pub max_message_length: usize,
    pub max_unacked_frames: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .field("delivery_timeout_ms", &self.delivery_timeout_ms)
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("client_timeout_secs", &self.client_timeout_secs)
            .field("max_message_length", &self.max_message_length)
            .field("max_unacked_frames", &self.max_unacked_frames)
            .finish_non_exhaustive()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::Config(format!(
                "JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }

        let config = Self {
            database_url,
            port: env_or("PORT", 8080),
            jwt_secret,
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            delivery_timeout_ms: env_or("WS_DELIVERY_TIMEOUT_MS", 2000),
            heartbeat_interval_secs: env_or("WS_HEARTBEAT_INTERVAL_SECS", 5),
            client_timeout_secs: env_or("WS_CLIENT_TIMEOUT_SECS", 30),
            max_message_length: env_or("WS_MAX_MESSAGE_LENGTH", 4000),
            max_unacked_frames: env_or("WS_MAX_UNACKED_FRAMES", 256),
        };

        if config.delivery_timeout_ms == 0 || config.heartbeat_interval_secs == 0 {
            return Err(AppError::Config(
                "WS_DELIVERY_TIMEOUT_MS and WS_HEARTBEAT_INTERVAL_SECS must be positive".into(),
            ));
        }
        if config.max_unacked_frames == 0 {
            return Err(AppError::Config("WS_MAX_UNACKED_FRAMES must be positive".into()));
        }
        if config.client_timeout_secs <= config.heartbeat_interval_secs {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }

        Ok(config)
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            delivery_timeout: Duration::from_millis(self.delivery_timeout_ms),
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(self.client_timeout_secs),
            max_message_length: self.max_message_length,
            max_unacked_frames: self.max_unacked_frames,
        }
    }
}
