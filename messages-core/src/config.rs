//! Dev server configuration: plugins, base path, port and proxy rules.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_BASE: &str = "/MessagesAPI/";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PROXY_PREFIX: &str = "/api";
pub const DEFAULT_PROXY_TARGET: &str = "http://localhost:5000";
pub const DEFAULT_PLUGIN: &str = "vue";

/// Top-level configuration record for the dev server.
///
/// Built once at startup, validated, then shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevServerConfig {
    /// Plugins to activate, applied in declaration order.
    pub plugins: Vec<PluginDescriptor>,
    /// Public base path the application is served under. Starts and ends with `/`.
    pub base: String,
    pub server: ServerOptions,
}

/// A plugin reference by name, with free-form options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        PluginDescriptor {
            name: name.into(),
            options: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub proxy: ProxyTable,
}

/// Where matching requests get forwarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyTarget {
    /// Upstream origin, e.g. `http://localhost:5000`.
    pub target: String,
    /// Rewrite the `Host` header to the target's authority.
    #[serde(default)]
    pub change_origin: bool,
}

/// One entry of the proxy table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRule {
    pub prefix: String,
    pub target: ProxyTarget,
}

/// Ordered mapping from path prefix to proxy target.
///
/// Serialized as a JSON object; key order is preserved so the first
/// declared rule wins on overlapping prefixes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProxyTable(Vec<ProxyRule>);

impl ProxyTable {
    pub fn new() -> Self {
        ProxyTable(Vec::new())
    }

    /// Adds a rule, replacing an existing one with the same prefix in place.
    pub fn insert(&mut self, prefix: impl Into<String>, target: ProxyTarget) {
        let prefix = prefix.into();
        match self.0.iter_mut().find(|rule| rule.prefix == prefix) {
            Some(rule) => rule.target = target,
            None => self.0.push(ProxyRule { prefix, target }),
        }
    }

    pub fn rules(&self) -> &[ProxyRule] {
        &self.0
    }

}

impl Serialize for ProxyTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for rule in &self.0 {
            map.serialize_entry(&rule.prefix, &rule.target)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProxyTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ProxyTableVisitor;

        impl<'de> Visitor<'de> for ProxyTableVisitor {
            type Value = ProxyTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of path prefixes to proxy targets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ProxyTable, A::Error> {
                let mut table = ProxyTable::new();
                while let Some((prefix, target)) = access.next_entry::<String, ProxyTarget>()? {
                    table.insert(prefix, target);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(ProxyTableVisitor)
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        let mut proxy = ProxyTable::new();
        proxy.insert(
            DEFAULT_PROXY_PREFIX,
            ProxyTarget {
                target: DEFAULT_PROXY_TARGET.to_string(),
                change_origin: true,
            },
        );
        ServerOptions {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            proxy,
        }
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        DevServerConfig {
            plugins: vec![PluginDescriptor::new(DEFAULT_PLUGIN)],
            base: DEFAULT_BASE.to_string(),
            server: ServerOptions::default(),
        }
    }
}

impl DevServerConfig {
    /// Parses a JSON document. Absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> CoreResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| CoreError::Deserialization(format!("Invalid dev server config: {}", e)))
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let config = Self::from_json_str(&raw)?;
        log::debug!("Loaded dev server config from {:?}", path);
        Ok(config)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> CoreResult<()> {
        validate_base(&self.base)?;
        if self.server.port == 0 {
            return Err(CoreError::Configuration("server.port must be greater than 0".to_string()));
        }
        if self.server.host.trim().is_empty() {
            return Err(CoreError::Configuration("server.host must not be empty".to_string()));
        }
        for plugin in &self.plugins {
            if plugin.name.trim().is_empty() {
                return Err(CoreError::Configuration("plugin name must not be empty".to_string()));
            }
        }
        for rule in self.server.proxy.rules() {
            if !rule.prefix.starts_with('/') {
                return Err(CoreError::Configuration(format!(
                    "proxy prefix '{}' must start with '/'",
                    rule.prefix
                )));
            }
            parse_origin(&rule.target.target)?;
        }
        Ok(())
    }
}

/// `base` must start and end with `/`.
pub fn validate_base(base: &str) -> CoreResult<()> {
    if !base.starts_with('/') || !base.ends_with('/') {
        return Err(CoreError::Configuration(format!(
            "base '{}' must start and end with '/'",
            base
        )));
    }
    if base.contains("//") {
        return Err(CoreError::Configuration(format!(
            "base '{}' must not contain empty segments",
            base
        )));
    }
    Ok(())
}

/// Parses a proxy target and checks that it is a bare `http` origin.
pub fn parse_origin(target: &str) -> CoreResult<Url> {
    let url = Url::parse(target).map_err(|e| {
        CoreError::Configuration(format!("proxy target '{}' is not a valid URL: {}", target, e))
    })?;
    if url.scheme() != "http" {
        return Err(CoreError::Configuration(format!(
            "proxy target '{}' must use the http scheme",
            target
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(CoreError::Configuration(format!("proxy target '{}' has no host", target)));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(CoreError::Configuration(format!(
            "proxy target '{}' must not carry credentials",
            target
        )));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(CoreError::Configuration(format!(
            "proxy target '{}' must be an origin without path, query or fragment",
            target
        )));
    }
    Ok(url)
}
