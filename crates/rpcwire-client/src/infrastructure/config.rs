//! TOML configuration for the client and construction of its transport stack.
//!
//! Example file:
//!
//! ```toml
//! [connection]
//! host = "localhost"
//! port = 9090
//! connect_timeout_ms = 5000
//! read_timeout_ms = 10000
//! framed = false
//!
//! [protocol]
//! strict_read = false
//! strict_write = true
//! string_length_limit = 16777216
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field has a serde default, so an empty file (or no file at all) is a
//! working configuration pointing at `localhost:9090`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rpcwire_core::{
    BinaryProtocol, BinaryProtocolConfig, FramedTransport, Protocol, SocketTransport,
    TransportError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how to connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// TCP handshake deadline in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Per-read deadline in milliseconds; bounds how long a call waits for its reply.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Wrap the socket in 4-byte length-prefixed frames.
    #[serde(default)]
    pub framed: bool,
}

/// Binary protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub strict_read: bool,
    #[serde(default = "default_true")]
    pub strict_write: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_length_limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_length_limit: Option<usize>,
}

/// Logging settings for the binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    9090
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_read_timeout_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            framed: false,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            strict_read: false,
            strict_write: default_true(),
            string_length_limit: None,
            container_length_limit: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl From<&ProtocolConfig> for BinaryProtocolConfig {
    fn from(config: &ProtocolConfig) -> Self {
        BinaryProtocolConfig {
            strict_read: config.strict_read,
            strict_write: config.strict_write,
            string_length_limit: config.string_length_limit,
            container_length_limit: config.container_length_limit,
        }
    }
}

// ── Loading and connecting ────────────────────────────────────────────────────

impl ClientConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// for values that fail [`validate`](Self::validate).
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, plus everything
    /// [`from_toml`](Self::from_toml) returns.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Checks the values a transport cannot be built from.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for an empty host, port 0, or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_builder()
            .build()
            .map(drop)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.read_timeout_ms)
    }

    fn socket_builder(&self) -> rpcwire_core::transport::SocketTransportBuilder {
        SocketTransport::builder(self.connection.host.clone(), self.connection.port)
            .connect_timeout(self.connect_timeout())
            .read_timeout(self.read_timeout())
    }

    /// Connects and assembles socket → (framing) → binary protocol.
    ///
    /// The socket is driven by the runtime this is awaited on, so the
    /// returned protocol must be used from that runtime's blocking pool.
    ///
    /// # Errors
    ///
    /// [`TransportError::InvalidConfig`] for unusable settings,
    /// [`TransportError::Connect`] if the peer is unreachable.
    pub async fn connect(&self) -> Result<Box<dyn Protocol>, TransportError> {
        let mut socket = self.socket_builder().build()?;
        socket.connect().await?;
        info!(
            "connected to {}:{} (framed: {})",
            self.connection.host, self.connection.port, self.connection.framed
        );

        let protocol_config = BinaryProtocolConfig::from(&self.protocol);
        let protocol: Box<dyn Protocol> = if self.connection.framed {
            Box::new(BinaryProtocol::with_config(
                FramedTransport::new(socket),
                protocol_config,
            ))
        } else {
            Box::new(BinaryProtocol::with_config(socket, protocol_config))
        };
        Ok(protocol)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_localhost_9090() {
        let cfg = ClientConfig::default();

        assert_eq!(cfg.connection.host, "localhost");
        assert_eq!(cfg.connection.port, 9090);
        assert_eq!(cfg.read_timeout(), Duration::from_secs(10));
        assert!(!cfg.connection.framed);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg = ClientConfig::from_toml("").expect("empty config is valid");

        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let text = r#"
[connection]
port = 9999
framed = true

[protocol]
strict_read = true
container_length_limit = 1000
"#;

        // Act
        let cfg = ClientConfig::from_toml(text).expect("valid config");

        // Assert
        assert_eq!(cfg.connection.port, 9999);
        assert!(cfg.connection.framed);
        assert_eq!(cfg.connection.host, "localhost");
        assert!(cfg.protocol.strict_read);
        assert!(cfg.protocol.strict_write);
        assert_eq!(cfg.protocol.container_length_limit, Some(1000));
        assert_eq!(cfg.protocol.string_length_limit, None);
    }

    #[test]
    fn test_zero_port_is_invalid() {
        let result = ClientConfig::from_toml("[connection]\nport = 0\n");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_read_timeout_is_invalid() {
        let result = ClientConfig::from_toml("[connection]\nread_timeout_ms = 0\n");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = ClientConfig::from_toml("[[[ not valid toml");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/rpcwire.toml");

        let result = ClientConfig::load(&path);

        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_toml_round_trip() {
        // Arrange
        let mut cfg = ClientConfig::default();
        cfg.connection.host = "10.0.0.5".to_string();
        cfg.protocol.string_length_limit = Some(4096);
        cfg.logging.level = "debug".to_string();

        // Act
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let restored = ClientConfig::from_toml(&text).expect("deserialize");

        // Assert
        assert_eq!(restored, cfg);
    }

    #[test]
    fn test_protocol_section_maps_onto_codec_config() {
        let cfg = ProtocolConfig {
            strict_read: true,
            strict_write: false,
            string_length_limit: Some(10),
            container_length_limit: None,
        };

        let codec = BinaryProtocolConfig::from(&cfg);

        assert!(codec.strict_read);
        assert!(!codec.strict_write);
        assert_eq!(codec.string_length_limit, Some(10));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_with_connect_error() {
        // Arrange – bind then drop a listener to obtain a port nobody serves
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut cfg = ClientConfig::default();
        cfg.connection.host = "127.0.0.1".to_string();
        cfg.connection.port = port;
        cfg.connection.connect_timeout_ms = 500;

        // Act
        let result = cfg.connect().await;

        // Assert
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
