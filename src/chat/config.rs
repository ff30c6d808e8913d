//! Chat configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chat::error::ChatError;

/// Default SOCKS5 proxy host (local Tor daemon).
pub const DEFAULT_PROXY_HOST: &str = "127.0.0.1";

/// Default SOCKS5 proxy port.
pub const DEFAULT_PROXY_PORT: u16 = 9050;

/// Well-known port shared by both roles.
pub const DEFAULT_CHAT_PORT: u16 = 9999;

/// Host the listener binds to. The overlay forwards the published port here.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";

/// Bytes requested per read on the connection.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Location of a SOCKS5 proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyEndpoint {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyEndpoint {
    /// Create a new proxy endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` string.
    pub fn parse(s: &str) -> Result<Self, ChatError> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| ChatError::Config(format!("Proxy must be host:port, got '{}'", s)))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| ChatError::Config(format!("Invalid proxy port '{}': {}", port, e)))?;
        if host.is_empty() {
            return Err(ChatError::Config("Proxy host cannot be empty".to_string()));
        }
        Ok(Self::new(host, port))
    }
}

impl Default for ProxyEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_HOST, DEFAULT_PROXY_PORT)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Configuration for a chat session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Host the listener binds to.
    pub listen_host: String,

    /// Port used both for listening and dialing.
    pub chat_port: u16,

    /// Bytes requested per read.
    pub read_chunk_size: usize,

    /// Path to the overlay `hostname` file. Defaults to the bundle layout
    /// next to the executable.
    pub hostname_file: Option<PathBuf>,

    /// SOCKS5 proxy used for dialing.
    // Must stay last: TOML tables come after plain values.
    pub proxy: ProxyEndpoint,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            listen_host: DEFAULT_LISTEN_HOST.to_string(),
            chat_port: DEFAULT_CHAT_PORT,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            hostname_file: None,
            proxy: ProxyEndpoint::default(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ChatError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ChatError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, or defaults when no file exists.
    pub fn load() -> Result<Self, ChatError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path (`<config dir>/hiddenchat/config.toml`).
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .map(|dir| dir.join("hiddenchat").join("config.toml"))
    }

    /// Check values that would make a session impossible.
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.proxy.host.trim().is_empty() {
            return Err(ChatError::Config("Proxy host cannot be empty".to_string()));
        }
        if self.proxy.port == 0 {
            return Err(ChatError::Config("Proxy port cannot be 0".to_string()));
        }
        if self.listen_host.trim().is_empty() {
            return Err(ChatError::Config("Listen host cannot be empty".to_string()));
        }
        if self.read_chunk_size == 0 {
            return Err(ChatError::Config("Read chunk size must be positive".to_string()));
        }
        Ok(())
    }

    /// Address the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.chat_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.proxy, ProxyEndpoint::new("127.0.0.1", 9050));
        assert_eq!(config.chat_port, DEFAULT_CHAT_PORT);
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.listen_addr(), "127.0.0.1:9999");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_proxy() {
        let proxy = ProxyEndpoint::parse("localhost:9150").unwrap();
        assert_eq!(proxy.host, "localhost");
        assert_eq!(proxy.port, 9150);
        assert_eq!(proxy.to_string(), "localhost:9150");

        assert!(ProxyEndpoint::parse("localhost").is_err());
        assert!(ProxyEndpoint::parse(":9050").is_err());
        assert!(ProxyEndpoint::parse("localhost:notaport").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ChatConfig::default();
        config.proxy.port = 0;
        assert!(config.validate().is_err());

        let mut config = ChatConfig::default();
        config.read_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = ChatConfig::default();
        config.listen_host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ChatConfig = toml::from_str("chat_port = 7000").unwrap();
        assert_eq!(config.chat_port, 7000);
        assert_eq!(config.proxy, ProxyEndpoint::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ChatConfig::default();
        config.proxy = ProxyEndpoint::new("10.0.0.1", 9150);
        config.hostname_file = Some(PathBuf::from("/tmp/hostname"));
        config.save_to(&path).unwrap();

        let loaded = ChatConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
