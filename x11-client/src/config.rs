//! Configuration types for the X11 client.

use crate::errors::XClientError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use x11_protocol::display::{DEFAULT_TCP_BASE_PORT, DEFAULT_UNIX_SOCKET_BASE};
use x11_protocol::{ByteOrder, MIT_MAGIC_COOKIE};

/// Complete X11 client configuration.
///
/// Every section may be omitted from a TOML file; missing values take
/// their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings.
    pub connection: ConnectionConfig,
    /// Authorization settings.
    pub auth: AuthConfig,
    /// Wire format settings.
    pub wire: WireConfig,
    /// Connection pump settings.
    pub pump: PumpConfig,
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Display identifier; `None` or empty means `$DISPLAY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// Dial and setup-response timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Prefix of the local display socket paths.
    #[serde(default = "default_unix_socket_base")]
    pub unix_socket_base: String,
    /// TCP port of display 0.
    #[serde(default = "default_tcp_base_port")]
    pub tcp_base_port: u16,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_unix_socket_base() -> String {
    DEFAULT_UNIX_SOCKET_BASE.to_string()
}

fn default_tcp_base_port() -> u16 {
    DEFAULT_TCP_BASE_PORT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            display: None,
            timeout_ms: default_timeout_ms(),
            unix_socket_base: default_unix_socket_base(),
            tcp_base_port: default_tcp_base_port(),
        }
    }
}

/// Authorization configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authority file to use instead of `$XAUTHORITY` / `$HOME/.Xauthority`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority_file: Option<PathBuf>,
    /// Authorization protocols in priority order.
    #[serde(default = "default_protocols")]
    pub protocols: Vec<String>,
}

fn default_protocols() -> Vec<String> {
    vec![MIT_MAGIC_COOKIE.to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authority_file: None,
            protocols: default_protocols(),
        }
    }
}

/// Byte order requested in the client prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrderSetting {
    /// Most significant byte first (`B`).
    #[default]
    Msb,
    /// Least significant byte first (`l`).
    Lsb,
    /// Whatever the host CPU uses.
    Native,
}

impl ByteOrderSetting {
    /// The concrete order announced on the wire.
    #[must_use]
    pub fn resolve(self) -> ByteOrder {
        match self {
            Self::Msb => ByteOrder::MsbFirst,
            Self::Lsb => ByteOrder::LsbFirst,
            Self::Native => ByteOrder::native(),
        }
    }
}

impl std::str::FromStr for ByteOrderSetting {
    type Err = XClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msb" => Ok(Self::Msb),
            "lsb" => Ok(Self::Lsb),
            "native" => Ok(Self::Native),
            other => Err(XClientError::Config(format!(
                "unknown byte order {:?} (expected msb, lsb or native)",
                other
            ))),
        }
    }
}

/// Wire format configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireConfig {
    /// Byte order announced in the client prefix.
    #[serde(default)]
    pub byte_order: ByteOrderSetting,
}

/// Connection pump configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Capacity of the outbound message queue.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Capacity of the inbound message queue.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
    /// Capacity of the error channel.
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
    /// Size of each read from the transport.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_outbound_capacity() -> usize {
    32
}

fn default_inbound_capacity() -> usize {
    64
}

fn default_error_capacity() -> usize {
    16
}

fn default_read_buffer_size() -> usize {
    8192
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
            inbound_capacity: default_inbound_capacity(),
            error_capacity: default_error_capacity(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl Config {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, XClientError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| XClientError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, XClientError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            XClientError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), XClientError> {
        if self.connection.timeout_ms == 0 {
            return Err(XClientError::Config("Timeout cannot be 0".to_string()));
        }

        if self.connection.unix_socket_base.is_empty() {
            return Err(XClientError::Config(
                "Unix socket base cannot be empty".to_string(),
            ));
        }

        if self.auth.protocols.iter().any(|p| p.is_empty()) {
            return Err(XClientError::Config(
                "Authorization protocol names cannot be empty".to_string(),
            ));
        }

        let pump = &self.pump;
        if pump.outbound_capacity == 0 || pump.inbound_capacity == 0 || pump.error_capacity == 0 {
            return Err(XClientError::Config(
                "Pump channel capacities must be at least 1".to_string(),
            ));
        }

        if pump.read_buffer_size == 0 {
            return Err(XClientError::Config(
                "Read buffer size cannot be 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the dial and setup-response timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.connection.timeout_ms)
    }

    /// The byte order to announce in the client prefix.
    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.wire.byte_order.resolve()
    }

    /// The display identifier to resolve; empty defers to `$DISPLAY`.
    #[must_use]
    pub fn display(&self) -> &str {
        self.connection.display.as_deref().unwrap_or("")
    }
}

/// Builder for creating a `Config`.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Sets the display identifier, e.g. `:0` or `host/tcp:1`.
    #[must_use]
    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.config.connection.display = Some(display.into());
        self
    }

    /// Sets the dial and setup timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.connection.timeout_ms = timeout_ms;
        self
    }

    /// Sets the socket path prefix for local displays.
    #[must_use]
    pub fn unix_socket_base(mut self, base: impl Into<String>) -> Self {
        self.config.connection.unix_socket_base = base.into();
        self
    }

    /// Sets the TCP port of display 0.
    #[must_use]
    pub fn tcp_base_port(mut self, port: u16) -> Self {
        self.config.connection.tcp_base_port = port;
        self
    }

    /// Sets the authority file to read instead of the default location.
    #[must_use]
    pub fn authority_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.auth.authority_file = Some(path.into());
        self
    }

    /// Replaces the authorization protocol priority list.
    #[must_use]
    pub fn auth_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.auth.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the byte order announced to the server.
    #[must_use]
    pub fn byte_order(mut self, order: ByteOrderSetting) -> Self {
        self.config.wire.byte_order = order;
        self
    }

    /// Sets the queue sizes of the connection pump.
    #[must_use]
    pub fn pump(mut self, pump: PumpConfig) -> Self {
        self.config.pump = pump;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<Config, XClientError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
