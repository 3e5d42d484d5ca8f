//! Configuration module for Lounge.

use serde::Deserialize;
use std::path::Path;

use crate::{LoungeError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Number of lines a connection's outbound queue can hold before
    /// deliveries to it are dropped.
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    /// Maximum accepted line length in bytes; longer input is truncated.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> usize {
    100
}

fn default_outbound_queue_capacity() -> usize {
    64
}

fn default_max_line_length() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            max_line_length: default_max_line_length(),
        }
    }
}

/// Chat configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Room created at startup and joined by every new session.
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Maximum username length in characters.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
}

fn default_room() -> String {
    "general".to_string()
}

fn default_max_name_length() -> usize {
    32
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_room: default_room(),
            max_name_length: default_max_name_length(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty disables file logging.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/lounge.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(LoungeError::Io)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| LoungeError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `LOUNGE_HOST`: Override the bind address
    /// - `LOUNGE_PORT`: Override the listen port (ignored if not a valid port)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LOUNGE_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }

        if let Ok(port) = std::env::var("LOUNGE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - Any connection or queue limit is zero
    /// - The default room name is empty or contains whitespace
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(LoungeError::Validation(
                "server.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.server.outbound_queue_capacity == 0 {
            return Err(LoungeError::Validation(
                "server.outbound_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.server.max_line_length == 0 {
            return Err(LoungeError::Validation(
                "server.max_line_length must be greater than 0".to_string(),
            ));
        }
        if self.chat.max_name_length == 0 {
            return Err(LoungeError::Validation(
                "chat.max_name_length must be greater than 0".to_string(),
            ));
        }
        let room = &self.chat.default_room;
        if room.is_empty() || room.chars().any(char::is_whitespace) {
            return Err(LoungeError::Validation(format!(
                "chat.default_room '{room}' must be non-empty and contain no whitespace"
            )));
        }
        Ok(())
    }
}
