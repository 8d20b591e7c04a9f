use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub rooms: RoomsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub grpc_port: u16,
    pub http_port: u16,
    /// Serve the REST/WebSocket gateway next to gRPC
    pub enable_gateway: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            grpc_port: 9090,
            http_port: 8080,
            enable_gateway: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

/// Room engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// How long a new room waits for a listener to accept it
    pub handoff_timeout_ms: u64,
    /// Upper bound for a single push to a member's stream
    pub push_timeout_ms: u64,
    /// Outbound queue depth per connected member
    pub outbound_buffer: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            handoff_timeout_ms: 5000,
            push_timeout_ms: 2000,
            outbound_buffer: 64,
        }
    }
}

impl RoomsConfig {
    #[must_use]
    pub const fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    #[must_use]
    pub const fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // HUDDLE_SERVER__GRPC_PORT, HUDDLE_ROOMS__HANDOFF_TIMEOUT_MS, ...
        builder = builder.add_source(
            Environment::with_prefix("HUDDLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.host.trim().is_empty() {
            errors.push("server.host must not be empty".to_string());
        }
        if self.server.grpc_port == 0 {
            errors.push("server.grpc_port must be non-zero".to_string());
        }
        if self.server.enable_gateway {
            if self.server.http_port == 0 {
                errors.push("server.http_port must be non-zero".to_string());
            } else if self.server.http_port == self.server.grpc_port {
                errors.push(format!(
                    "server.http_port and server.grpc_port are both {}",
                    self.server.http_port
                ));
            }
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }
        if crate::logging::parse_log_level(&self.logging.level).is_err() {
            errors.push(format!("logging.level \"{}\" is not a level", self.logging.level));
        }

        if self.rooms.handoff_timeout_ms == 0 {
            errors.push("rooms.handoff_timeout_ms must be non-zero".to_string());
        }
        if self.rooms.push_timeout_ms == 0 {
            errors.push("rooms.push_timeout_ms must be non-zero".to_string());
        }
        if self.rooms.outbound_buffer == 0 {
            errors.push("rooms.outbound_buffer must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Get gRPC address
    #[must_use]
    pub fn grpc_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.grpc_port)
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.grpc_port, 9090);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.rooms.handoff_timeout(), Duration::from_secs(5));
        assert_eq!(config.rooms.push_timeout(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_addresses() {
        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                grpc_port: 50051,
                http_port: 8081,
                enable_gateway: true,
            },
            ..Config::default()
        };

        assert_eq!(config.grpc_address(), "127.0.0.1:50051");
        assert_eq!(config.http_address(), "127.0.0.1:8081");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = Config::default();
        config.server.http_port = config.server.grpc_port;
        config.logging.format = "xml".to_string();
        config.rooms.handoff_timeout_ms = 0;
        config.rooms.outbound_buffer = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.contains("http_port")));
        assert!(errors.iter().any(|e| e.contains("logging.format")));
    }

    #[test]
    fn test_gateway_port_ignored_when_disabled() {
        let mut config = Config::default();
        config.server.enable_gateway = false;
        config.server.http_port = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let path = std::env::temp_dir().join(format!("huddle-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "server:\n  grpc_port: 7000\nrooms:\n  handoff_timeout_ms: 250\n",
        )
        .unwrap();

        let config = Config::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.server.grpc_port, 7000);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.rooms.handoff_timeout_ms, 250);
        assert_eq!(config.rooms.push_timeout_ms, 2000);
    }
}
