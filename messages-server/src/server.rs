//! Binding and running the API backend and the dev server side by side.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backend;
use crate::config::AppConfig;
use crate::dev_server::DevServer;
use crate::error::{ServerError, ServerResult};
use crate::persistence;
use crate::plugins::PluginRegistry;
use crate::state::AppState;

/// Binds a listener. An address already in use is an error; there is no
/// fallback to another port.
pub async fn bind_listener(addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Loads everything from `config`, binds both listeners and serves until
/// `shutdown` resolves.
pub async fn run(config: AppConfig, shutdown: impl Future<Output = ()> + Send + 'static) -> ServerResult<()> {
    let store = persistence::load_store(&config.data_path).await?;
    let app_state = AppState::with_store(config.data_path.clone(), store);
    let dev_server = DevServer::new(&config.dev, &config.static_dir, &PluginRegistry::with_builtin())?;

    let api_listener = bind_listener(config.api_addr).await?;
    let dev_listener = bind_listener(config.dev_addr()?).await?;

    serve_stack(app_state, dev_server, api_listener, dev_listener, shutdown).await
}

/// Serves both routers on already bound listeners. Saves the store once
/// both have drained.
pub async fn serve_stack(
    app_state: AppState,
    dev_server: DevServer,
    api_listener: TcpListener,
    dev_listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ServerResult<()> {
    let api_addr = local_addr(&api_listener)?;
    let dev_addr = local_addr(&dev_listener)?;
    info!("Backend: http://{}", api_addr);
    info!("Frontend: http://{}{}", dev_addr, dev_server.base());

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown.await;
        let _ = stop_tx.send(true);
    });

    let api = axum::serve(api_listener, backend::api_router(app_state.clone()))
        .with_graceful_shutdown(stopped(stop_rx.clone()));
    let dev = axum::serve(dev_listener, dev_server.router()).with_graceful_shutdown(stopped(stop_rx));

    let served = tokio::try_join!(
        async { api.await.map_err(|e| ServerError::Internal(format!("API server failed: {}", e))) },
        async { dev.await.map_err(|e| ServerError::Internal(format!("Dev server failed: {}", e))) },
    );

    info!("Saving template store before shutdown...");
    persistence::save_state(&app_state).await?;
    served.map(|_| info!("Servers stopped."))
}

fn local_addr(listener: &TcpListener) -> ServerResult<SocketAddr> {
    listener
        .local_addr()
        .map_err(|e| ServerError::Internal(format!("Listener has no local address: {}", e)))
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>(); // On non-Unix, just wait for Ctrl+C

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down development servers...");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down development servers...");
        },
    }
}
