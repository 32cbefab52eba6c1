// Declare modules to be part of the library crate

pub mod backend;
pub mod config;
pub mod dev_server;
pub mod error;
pub mod handlers;
pub mod models;
pub mod persistence;
pub mod plugins;
pub mod proxy;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use dev_server::DevServer;
pub use error::{ServerError, ServerResult};
pub use state::AppState;
