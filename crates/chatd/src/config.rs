//! Server configuration.
//!
//! Values come from, lowest precedence first: built-in defaults, an optional
//! TOML file, then explicit overrides applied by the binary (environment and
//! command line).
//!
//! ```toml
//! bind = "0.0.0.0:9001"
//! outbound_capacity = 256
//! max_line_length = 8192
//! overflow = "disconnect"
//! idle_timeout_secs = 600
//! write_timeout_secs = 10
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default listen port (the classic chat port).
pub const DEFAULT_PORT: u16 = 9001;

/// Default listen address: every interface on [`DEFAULT_PORT`].
pub const DEFAULT_BIND: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT);

/// Default per-client outbound queue capacity, in lines.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Largest accepted per-client outbound queue capacity, in lines.
///
/// Well below tokio's channel limit, which panics on larger bounds.
pub const MAX_OUTBOUND_CAPACITY: usize = 1 << 20;

/// Default maximum length of one client line, in bytes (terminator excluded).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Default per-write timeout, in seconds.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// What happens to a recipient whose outbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// The recipient misses the line; everyone else still gets it.
    #[default]
    Drop,
    /// The recipient is kicked; its own session terminates and cleans up.
    Disconnect,
}

/// Runtime configuration for [`ChatServer`](crate::server::ChatServer).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind: SocketAddr,

    /// Capacity of each client's outbound queue, in lines
    pub outbound_capacity: usize,

    /// Longest accepted client line in bytes; longer lines end the session
    pub max_line_length: usize,

    /// Policy for recipients whose outbound queue is full
    pub overflow: OverflowPolicy,

    /// Disconnect clients that send nothing for this long (disabled if unset)
    pub idle_timeout_secs: Option<u64>,

    /// Maximum time a single line write or flush may take before the client
    /// is dropped
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            overflow: OverflowPolicy::Drop,
            idle_timeout_secs: None,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file; missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                origin: path.display().to_string(),
                error,
            },
            other => other,
        })
    }

    /// Parses configuration from TOML text and validates it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse {
            origin: "inline TOML".to_string(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` if given, otherwise returns validated defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Replaces the bind address with a textual override (env var or flag).
    pub fn with_bind(mut self, value: &str) -> Result<Self, ConfigError> {
        self.bind = value.parse().map_err(|_| ConfigError::InvalidBind {
            value: value.to_string(),
        })?;
        Ok(self)
    }

    /// Checks value ranges that the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "outbound_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.outbound_capacity > MAX_OUTBOUND_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "outbound_capacity",
                reason: format!("must be at most {MAX_OUTBOUND_CAPACITY}"),
            });
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid {
                field: "max_line_length",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.idle_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "idle_timeout_secs",
                reason: "must be at least 1 (omit to disable)".to_string(),
            });
        }
        Ok(())
    }

    /// Idle timeout as a `Duration`, if enabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }

    /// Per-write timeout as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config from {origin}: {error}")]
    Parse { origin: String, error: String },

    #[error("Invalid bind address: {value}")]
    InvalidBind { value: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.bind.to_string(), "0.0.0.0:9001");
        assert_eq!(config.overflow, OverflowPolicy::Drop);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            bind = "127.0.0.1:7000"
            overflow = "disconnect"
            idle_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.port(), 7000);
        assert_eq!(config.overflow, OverflowPolicy::Disconnect);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.outbound_capacity, DEFAULT_OUTBOUND_CAPACITY);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ServerConfig::from_toml("port = 9001").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ServerConfig::from_toml("outbound_capacity = 0").unwrap_err();
        assert!(err.to_string().contains("outbound_capacity"));
    }

    #[test]
    fn test_huge_capacity_rejected() {
        let err = ServerConfig::from_toml("outbound_capacity = 4611686018427387904").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "outbound_capacity",
                ..
            }
        ));

        let config =
            ServerConfig::from_toml(&format!("outbound_capacity = {MAX_OUTBOUND_CAPACITY}")).unwrap();
        assert_eq!(config.outbound_capacity, MAX_OUTBOUND_CAPACITY);
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        assert!(ServerConfig::from_toml("idle_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_with_bind_override() {
        let config = ServerConfig::default().with_bind("127.0.0.1:0").unwrap();
        assert_eq!(config.bind.port(), 0);

        let err = ServerConfig::default().with_bind("not an address").unwrap_err();
        assert!(err.to_string().contains("not an address"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_line_length = 512").unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_line_length, 512);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "bind = ").unwrap();

        let err = ServerConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }
}
