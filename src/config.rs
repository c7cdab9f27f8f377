//! Client configuration parsed from environment variables.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::ws::{ReconnectPolicy, TicketSource, WsOptions};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_ROOM: &str = "lobby";
pub const DEFAULT_RECONNECT_MIN_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("reconnect floor {min_ms}ms exceeds ceiling {max_ms}ms")]
    InvalidBackoff { min_ms: u64, max_ms: u64 },
    #[error("room name must not be empty")]
    EmptyRoom,
}

/// Values given on the command line; `None` keeps the environment's value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub room: Option<String>,
    pub session_token: Option<String>,
    pub reconnect_min_ms: Option<u64>,
    pub reconnect_max_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// `http(s)://host[:port]` without a trailing slash.
    pub base_url: String,
    pub room: String,
    pub session_token: Option<String>,
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non-HTTP base URL, an empty room or a
    /// reconnect floor above the ceiling.
    pub fn new(
        base_url: &str,
        room: &str,
        session_token: Option<String>,
        reconnect_min_ms: u64,
        reconnect_max_ms: u64,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        let room = room.trim();
        if room.is_empty() {
            return Err(ConfigError::EmptyRoom);
        }
        if reconnect_min_ms > reconnect_max_ms {
            return Err(ConfigError::InvalidBackoff { min_ms: reconnect_min_ms, max_ms: reconnect_max_ms });
        }

        Ok(Self {
            base_url,
            room: room.to_owned(),
            session_token: session_token.filter(|token| !token.is_empty()),
            reconnect: ReconnectPolicy {
                min: Duration::from_millis(reconnect_min_ms),
                max: Duration::from_millis(reconnect_max_ms),
            },
        })
    }

    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `CHAT_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `CHAT_ROOM`: default `lobby`
    /// - `CHAT_SESSION_TOKEN`: session cookie value for the identity provider
    /// - `CHAT_RECONNECT_MIN_MS`: default 1000
    /// - `CHAT_RECONNECT_MAX_MS`: default 10000
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("CHAT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let room = std::env::var("CHAT_ROOM").unwrap_or_else(|_| DEFAULT_ROOM.to_owned());
        let session_token = std::env::var("CHAT_SESSION_TOKEN").ok();
        Self::new(
            &base_url,
            &room,
            session_token,
            env_parse("CHAT_RECONNECT_MIN_MS", DEFAULT_RECONNECT_MIN_MS),
            env_parse("CHAT_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS),
        )
    }

    /// Apply explicitly supplied values on top of this config and validate
    /// the result again.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn with_overrides(&self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::new(
            overrides.base_url.as_deref().unwrap_or(&self.base_url),
            overrides.room.as_deref().unwrap_or(&self.room),
            overrides.session_token.or_else(|| self.session_token.clone()),
            overrides.reconnect_min_ms.unwrap_or_else(|| millis(self.reconnect.min)),
            overrides.reconnect_max_ms.unwrap_or_else(|| millis(self.reconnect.max)),
        )
    }

    /// WebSocket endpoint derived from the base URL, without a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] unless the base URL is `http` or `https`.
    pub fn ws_endpoint(&self) -> Result<String, ConfigError> {
        if let Some(rest) = self.base_url.strip_prefix("http://") {
            return Ok(format!("ws://{rest}/api/ws"));
        }
        if let Some(rest) = self.base_url.strip_prefix("https://") {
            return Ok(format!("wss://{rest}/api/ws"));
        }
        Err(ConfigError::InvalidBaseUrl(self.base_url.clone()))
    }

    /// Connection options for [`crate::channel::ws::WsChannel`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::ws_endpoint`].
    pub fn ws_options(&self, tickets: Option<Arc<dyn TicketSource>>) -> Result<WsOptions, ConfigError> {
        Ok(WsOptions {
            endpoint: self.ws_endpoint()?,
            room: self.room.clone(),
            reconnect: self.reconnect,
            tickets,
        })
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
