//! Dev server plugins.
//!
//! A plugin is looked up by the name given in configuration and gets a say
//! when a request under the base path does not match any static file.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use messages_core::{CoreError, PluginDescriptor};
use serde::Deserialize;
use tracing::info;

use crate::error::ServerResult;

pub trait DevPlugin: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Offers another asset path (relative to the static directory, with a
    /// leading `/`) for a request that matched no file. `path` is relative
    /// to the base.
    fn fallback_asset(&self, method: &Method, path: &str) -> Option<String>;
}

type PluginFactory = fn(&serde_json::Value) -> ServerResult<Arc<dyn DevPlugin>>;

/// Maps plugin names to constructors.
pub struct PluginRegistry {
    factories: HashMap<&'static str, PluginFactory>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&&str> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl PluginRegistry {
    pub fn empty() -> Self {
        PluginRegistry { factories: HashMap::new() }
    }

    /// Registry with every plugin shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(VuePlugin::NAME, VuePlugin::from_options);
        registry
    }

    pub fn register(&mut self, name: &'static str, factory: PluginFactory) {
        self.factories.insert(name, factory);
    }

    /// Instantiates the configured plugins in declaration order.
    pub fn resolve(&self, descriptors: &[PluginDescriptor]) -> ServerResult<Vec<Arc<dyn DevPlugin>>> {
        descriptors
            .iter()
            .map(|descriptor| -> ServerResult<Arc<dyn DevPlugin>> {
                let factory = self.factories.get(descriptor.name.as_str()).ok_or_else(|| {
                    CoreError::Configuration(format!("unknown plugin '{}'", descriptor.name))
                })?;
                let plugin = factory(&descriptor.options)?;
                info!(plugin = plugin.name(), "Plugin enabled");
                Ok(plugin)
            })
            .collect()
    }
}

/// Framework integration for the single-page editor: history-mode routing.
///
/// Client-side routes such as `/MessagesAPI/templates/3` have no file on
/// disk, so navigation requests fall back to the entry document. Requests
/// whose last segment carries an extension are treated as asset lookups and
/// keep their 404.
#[derive(Debug, Clone, PartialEq)]
pub struct VuePlugin {
    index: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct VueOptions {
    index: String,
}

impl Default for VueOptions {
    fn default() -> Self {
        VueOptions { index: "index.html".to_string() }
    }
}

impl VuePlugin {
    pub const NAME: &'static str = "vue";

    pub fn new(index: impl Into<String>) -> Self {
        VuePlugin { index: index.into() }
    }

    fn from_options(options: &serde_json::Value) -> ServerResult<Arc<dyn DevPlugin>> {
        let options: VueOptions = if options.is_null() {
            VueOptions::default()
        } else {
            serde_json::from_value(options.clone()).map_err(|e| {
                CoreError::Configuration(format!("invalid options for plugin 'vue': {}", e))
            })?
        };
        let index = options.index.trim_start_matches('/');
        if index.is_empty() || index.split('/').any(|segment| segment == "..") {
            return Err(CoreError::Configuration(format!(
                "plugin 'vue' index '{}' is not a file inside the static directory",
                options.index
            ))
            .into());
        }
        Ok(Arc::new(VuePlugin::new(index)))
    }
}

impl DevPlugin for VuePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fallback_asset(&self, method: &Method, path: &str) -> Option<String> {
        if *method != Method::GET && *method != Method::HEAD {
            return None;
        }
        let last = path.rsplit('/').next().unwrap_or_default();
        if last.contains('.') {
            return None;
        }
        Some(format!("/{}", self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_builtin_vue() {
        let registry = PluginRegistry::with_builtin();
        let plugins = registry.resolve(&[PluginDescriptor::new("vue")]).unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name(), "vue");
    }

    #[test]
    fn test_unknown_plugin_fails() {
        let registry = PluginRegistry::with_builtin();
        let err = registry.resolve(&[PluginDescriptor::new("react")]).unwrap_err();
        assert!(err.to_string().contains("unknown plugin 'react'"));
    }

    #[test]
    fn test_vue_options() {
        let registry = PluginRegistry::with_builtin();
        let descriptor = PluginDescriptor { name: "vue".to_string(), options: json!({"index": "app.html"}) };
        let plugins = registry.resolve(&[descriptor]).unwrap();
        assert_eq!(plugins[0].fallback_asset(&Method::GET, "/editor"), Some("/app.html".to_string()));

        let bad = PluginDescriptor { name: "vue".to_string(), options: json!({"index": "../secret"}) };
        assert!(registry.resolve(&[bad]).is_err());

        let wrong_type = PluginDescriptor { name: "vue".to_string(), options: json!({"index": 3}) };
        assert!(registry.resolve(&[wrong_type]).is_err());
    }

    #[test]
    fn test_vue_fallback_rules() {
        let plugin = VuePlugin::new("index.html");
        assert_eq!(plugin.fallback_asset(&Method::GET, "/templates/3"), Some("/index.html".to_string()));
        assert_eq!(plugin.fallback_asset(&Method::HEAD, "/"), Some("/index.html".to_string()));
        assert_eq!(plugin.fallback_asset(&Method::GET, "/assets/missing.js"), None);
        assert_eq!(plugin.fallback_asset(&Method::POST, "/templates"), None);
    }
}
