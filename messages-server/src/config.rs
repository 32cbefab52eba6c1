//! Process-level configuration: the dev server record plus the paths and
//! addresses the launcher needs, overridable from the environment.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use messages_core::{CoreError, DevServerConfig};
use tracing::info;

use crate::error::ServerResult;

pub const CONFIG_ENV: &str = "MESSAGES_CONFIG";
pub const PORT_ENV: &str = "MESSAGES_PORT";
pub const HOST_ENV: &str = "MESSAGES_HOST";
pub const BASE_ENV: &str = "MESSAGES_BASE";
pub const STATIC_DIR_ENV: &str = "MESSAGES_STATIC_DIR";
pub const DATA_PATH_ENV: &str = "MESSAGES_DATA_PATH";
pub const API_ADDR_ENV: &str = "MESSAGES_API_ADDR";

pub const DEFAULT_STATIC_DIR: &str = "./client/dist";
pub const DEFAULT_DATA_PATH: &str = "./messages_data";
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dev: DevServerConfig,
    /// Directory holding the built front-end.
    pub static_dir: PathBuf,
    /// Directory holding the template store.
    pub data_path: PathBuf,
    /// Bind address of the template API.
    pub api_addr: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            dev: DevServerConfig::default(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            api_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

impl AppConfig {
    /// Loads from the process environment.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads using `lookup` for variables: defaults, then the optional
    /// config file, then single-value overrides. The result is validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let mut dev = match lookup(CONFIG_ENV) {
            Some(path) => {
                info!(path = %path, "Loading dev server config file");
                DevServerConfig::load(Path::new(&path))?
            }
            None => DevServerConfig::default(),
        };

        if let Some(port) = lookup(PORT_ENV) {
            dev.server.port = port.trim().parse::<u16>().map_err(|_| {
                CoreError::Configuration(format!("{} must be a port number, got '{}'", PORT_ENV, port))
            })?;
        }
        if let Some(host) = lookup(HOST_ENV) {
            dev.server.host = host;
        }
        if let Some(base) = lookup(BASE_ENV) {
            dev.base = base;
        }
        dev.validate()?;

        let api_raw = lookup(API_ADDR_ENV).unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let api_addr: SocketAddr = api_raw.trim().parse().map_err(|_| {
            CoreError::Configuration(format!("{} must be an ip:port address, got '{}'", API_ADDR_ENV, api_raw))
        })?;

        let config = AppConfig {
            dev,
            static_dir: PathBuf::from(lookup(STATIC_DIR_ENV).unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())),
            data_path: PathBuf::from(lookup(DATA_PATH_ENV).unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())),
            api_addr,
        };
        config.dev_addr()?;
        Ok(config)
    }

    /// Socket address of the dev server. `localhost` means the IPv4 loopback.
    pub fn dev_addr(&self) -> ServerResult<SocketAddr> {
        let host = self.dev.server.host.trim();
        let ip = if host.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            host.parse::<IpAddr>().map_err(|_| {
                CoreError::Configuration(format!("server.host '{}' must be an IP address or 'localhost'", host))
            })?
        };
        Ok(SocketAddr::new(ip, self.dev.server.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.dev, DevServerConfig::default());
        assert_eq!(config.dev_addr().unwrap(), "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.api_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.static_dir, PathBuf::from(DEFAULT_STATIC_DIR));
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "4100"),
            (HOST_ENV, "0.0.0.0"),
            (BASE_ENV, "/Editor/"),
            (API_ADDR_ENV, "127.0.0.1:5100"),
            (DATA_PATH_ENV, "/tmp/messages"),
        ]))
        .unwrap();
        assert_eq!(config.dev_addr().unwrap(), "0.0.0.0:4100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.dev.base, "/Editor/");
        assert_eq!(config.api_addr.port(), 5100);
        assert_eq!(config.data_path, PathBuf::from("/tmp/messages"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[(PORT_ENV, "http")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[(PORT_ENV, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[(BASE_ENV, "Editor")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[(API_ADDR_ENV, "localhost")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[(HOST_ENV, "example.test")])).is_err());
    }

    #[test]
    fn test_localhost_host() {
        let config = AppConfig::from_lookup(lookup_from(&[(HOST_ENV, "localhost")])).unwrap();
        assert_eq!(config.dev_addr().unwrap(), "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_config_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.config.json");
        std::fs::write(&path, r#"{"base": "/FromFile/", "server": {"port": 3500}}"#).unwrap();
        let path_str = path.to_string_lossy().to_string();

        let config = AppConfig::from_lookup(lookup_from(&[(CONFIG_ENV, path_str.as_str()), (PORT_ENV, "3600")])).unwrap();
        assert_eq!(config.dev.base, "/FromFile/");
        assert_eq!(config.dev.server.port, 3600);
    }
}
