//! Server configuration.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default largest accepted frame payload (64 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Configuration for the TCP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent client connections.
    pub max_clients: usize,
    /// Largest accepted frame payload in bytes.
    pub max_frame_len: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_clients: 100,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    /// Sets the largest accepted frame payload.
    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_clients() -> usize {
    100
}

fn default_allowed_ips() -> Vec<String> {
    vec!["127.0.0.1".into(), "::1".into()]
}

/// Settings file contents.
///
/// ```json
/// {
///   "port": 8080,
///   "max_client_count": 100,
///   "allowed_ips": ["127.0.0.1", "@"],
///   "admins_file": "config/admins.json"
/// }
/// ```
///
/// Every key is optional. `"@"` in `allowed_ips` admits every address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent client connections.
    #[serde(default = "default_max_clients")]
    pub max_client_count: usize,
    /// Addresses allowed to connect.
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: Vec<String>,
    /// Credentials file, relative to the settings file.
    #[serde(default)]
    pub admins_file: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_client_count: default_max_clients(),
            allowed_ips: default_allowed_ips(),
            admins_file: None,
        }
    }
}

impl ServerSettings {
    /// Reads settings from a JSON file. A missing file yields defaults.
    ///
    /// A relative `admins_file` is resolved against the settings file's
    /// directory.
    pub fn load(path: &Path) -> ServerResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;

        if let (Some(admins), Some(base)) = (&settings.admins_file, path.parent()) {
            if admins.is_relative() {
                settings.admins_file = Some(base.join(admins));
            }
        }
        Ok(settings)
    }

    /// Builds a server configuration listening on `host`.
    pub fn server_config(&self, host: IpAddr) -> ServerConfig {
        ServerConfig::new(SocketAddr::new(host, self.port)).with_max_clients(self.max_client_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_clients, 100);
        assert_eq!(config.max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_clients(5)
            .with_max_frame_len(1024);
        assert_eq!(config.max_clients, 5);
        assert_eq!(config.max_frame_len, 1024);
    }

    #[test]
    fn missing_settings_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let settings = ServerSettings::load(&temp.path().join("nope.json")).unwrap();
        assert_eq!(settings, ServerSettings::default());
    }

    #[test]
    fn partial_settings_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, r#"{"port": 9001, "admins_file": "admins.json"}"#).unwrap();

        let settings = ServerSettings::load(&path).unwrap();
        assert_eq!(settings.port, 9001);
        assert_eq!(settings.max_client_count, 100);
        assert_eq!(settings.admins_file, Some(temp.path().join("admins.json")));

        let config = settings.server_config("0.0.0.0".parse().unwrap());
        assert_eq!(config.bind_addr.port(), 9001);
    }

    #[test]
    fn malformed_settings_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            ServerSettings::load(&path),
            Err(ServerError::Config(_))
        ));
    }
}
