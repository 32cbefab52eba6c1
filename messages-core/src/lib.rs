pub mod config;
pub mod error;
pub mod store;
pub mod template;

// Re-export key types for easier use
pub use config::{DevServerConfig, PluginDescriptor, ProxyRule, ProxyTable, ProxyTarget, ServerOptions};
pub use error::{CoreError, CoreResult};
pub use store::{Template, TemplateId, TemplateStore, TemplateVersion, VersionId};
pub use template::{process_template, ProcessedTemplate};
