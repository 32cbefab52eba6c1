use messages_server::{config::AppConfig, server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber for logging
    let filter = EnvFilter::from_default_env()
        .add_directive("messages_server=info".parse().expect("static directive"))
        .add_directive("messages_core=info".parse().expect("static directive"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting development servers...");

    let result = match AppConfig::from_env() {
        Ok(config) => server::run(config, server::shutdown_signal()).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(error = %e, "Development servers stopped with an error");
        std::process::exit(1);
    }
}
