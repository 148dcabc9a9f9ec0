//! Live Class Controller configuration.
//!
//! Configuration is loaded from environment variables. Every value has a
//! default; values that are present but unparseable are rejected rather
//! than silently replaced.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default empty-room grace period in seconds.
pub const DEFAULT_ROOM_GRACE_PERIOD_SECONDS: u64 = 10;

/// Default bound on concurrently live rooms.
pub const DEFAULT_MAX_ROOMS: usize = 1000;

/// Default bound on participants per room.
pub const DEFAULT_MAX_PARTICIPANTS_PER_ROOM: usize = 250;

/// Default bound on an inbound WebSocket frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Default graceful shutdown deadline in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: u64 = 10;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "lc";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text.
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidValue(format!(
                "LC_LOG_FORMAT must be 'text' or 'json', got '{other}'"
            ))),
        }
    }
}

/// Live Class Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:8090").
    pub bind_address: String,

    /// Unique identifier for this instance, used in logs.
    pub instance_id: String,

    /// How long an empty room is kept before it is reclaimed (default: 10s).
    pub room_grace_period_seconds: u64,

    /// Maximum concurrently live rooms (default: 1000).
    pub max_rooms: usize,

    /// Maximum participants in a single room (default: 250).
    pub max_participants_per_room: usize,

    /// Maximum inbound frame size in bytes (default: 65536).
    pub max_frame_bytes: usize,

    /// Graceful shutdown deadline in seconds (default: 10).
    pub shutdown_timeout_seconds: u64,

    /// Log output format (default: text).
    pub log_format: LogFormat,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("LC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let room_grace_period_seconds = parse_var(
            vars,
            "LC_ROOM_GRACE_PERIOD_SECONDS",
            DEFAULT_ROOM_GRACE_PERIOD_SECONDS,
        )?;

        let max_rooms = positive(
            "LC_MAX_ROOMS",
            parse_var(vars, "LC_MAX_ROOMS", DEFAULT_MAX_ROOMS)?,
        )?;

        let max_participants_per_room = positive(
            "LC_MAX_PARTICIPANTS_PER_ROOM",
            parse_var(
                vars,
                "LC_MAX_PARTICIPANTS_PER_ROOM",
                DEFAULT_MAX_PARTICIPANTS_PER_ROOM,
            )?,
        )?;

        let max_frame_bytes = positive(
            "LC_MAX_FRAME_BYTES",
            parse_var(vars, "LC_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES)?,
        )?;

        let shutdown_timeout_seconds = parse_var(
            vars,
            "LC_SHUTDOWN_TIMEOUT_SECONDS",
            DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
        )?;

        let log_format = match vars.get("LC_LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::Text,
        };

        // Generate instance ID
        let instance_id = vars.get("LC_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            instance_id,
            room_grace_period_seconds,
            max_rooms,
            max_participants_per_room,
            max_frame_bytes,
            shutdown_timeout_seconds,
            log_format,
        })
    }

    /// Empty-room grace period.
    #[must_use]
    pub fn room_grace_period(&self) -> Duration {
        Duration::from_secs(self.room_grace_period_seconds)
    }

    /// Graceful shutdown deadline.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
        None => Ok(default),
    }
}

fn positive(key: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than zero"
        )))
    } else {
        Ok(value)
    }
}
