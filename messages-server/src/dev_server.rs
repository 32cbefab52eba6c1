//! The development server: serves built assets under the public base path
//! and forwards proxied prefixes to their upstream.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use messages_core::DevServerConfig;
use tower::ServiceExt;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info};

use crate::error::ServerResult;
use crate::plugins::{DevPlugin, PluginRegistry};
use crate::proxy::Proxy;

/// Everything the dev server needs per request. Built once from the
/// validated configuration.
#[derive(Debug, Clone)]
pub struct DevServer {
    base: String,
    assets: ServeDir,
    proxy: Proxy,
    plugins: Vec<Arc<dyn DevPlugin>>,
}

impl DevServer {
    pub fn new(
        config: &DevServerConfig,
        static_dir: impl Into<PathBuf>,
        registry: &PluginRegistry,
    ) -> ServerResult<Self> {
        config.validate()?;
        let static_dir = static_dir.into();
        let proxy = Proxy::from_table(&config.server.proxy)?;
        let plugins = registry.resolve(&config.plugins)?;

        for route in proxy.routes() {
            info!(prefix = %route.prefix, target = %route.origin(), change_origin = route.change_origin, "Proxy rule");
        }
        info!(base = %config.base, static_dir = ?static_dir, "Serving application");

        Ok(DevServer {
            base: config.base.clone(),
            assets: ServeDir::new(&static_dir),
            proxy,
            plugins,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn router(self) -> Router {
        Router::new()
            .fallback(dispatch)
            .layer(TraceLayer::new_for_http()) // Log requests/responses
            .with_state(Arc::new(self))
    }

    /// `/MessagesAPI/` becomes `/MessagesAPI`; the root base becomes empty.
    fn base_trimmed(&self) -> &str {
        self.base.trim_end_matches('/')
    }

    async fn serve_asset(&self, req: Request, relative_path: &str) -> Response {
        let method = req.method().clone();
        let headers = req.headers().clone();
        let query = req.uri().query().map(str::to_string);

        let (mut parts, body) = req.into_parts();
        parts.uri = match relative_uri(relative_path, query.as_deref()) {
            Ok(uri) => uri,
            Err(response) => return response,
        };
        let response = self.serve_file(Request::from_parts(parts, body)).await;
        if response.status() != StatusCode::NOT_FOUND {
            return response;
        }

        for plugin in &self.plugins {
            let Some(asset) = plugin.fallback_asset(&method, relative_path) else {
                continue;
            };
            debug!(plugin = plugin.name(), path = %relative_path, asset = %asset, "Falling back to plugin asset");
            let uri = match relative_uri(&asset, None) {
                Ok(uri) => uri,
                Err(response) => return response,
            };
            let mut fallback = Request::new(Body::empty());
            *fallback.method_mut() = method.clone();
            *fallback.uri_mut() = uri;
            *fallback.headers_mut() = headers.clone();
            let fallback_response = self.serve_file(fallback).await;
            if fallback_response.status() != StatusCode::NOT_FOUND {
                return fallback_response;
            }
        }
        response
    }

    async fn serve_file(&self, req: Request) -> Response {
        let response = match self.assets.clone().oneshot(req).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        };
        self.rebase_redirect(response)
    }

    // Directory redirects from the file service point at the path without
    // the base; put it back.
    fn rebase_redirect(&self, mut response: Response) -> Response {
        if !response.status().is_redirection() {
            return response;
        }
        let rebased = response
            .headers()
            .get(header::LOCATION)
            .and_then(|location| location.to_str().ok())
            .filter(|location| location.starts_with('/'))
            .map(|location| format!("{}{}", self.base_trimmed(), location));
        if let Some(value) = rebased.and_then(|location| HeaderValue::from_str(&location).ok()) {
            response.headers_mut().insert(header::LOCATION, value);
        }
        response
    }
}

async fn dispatch(State(dev): State<Arc<DevServer>>, req: Request) -> Response {
    let path = req.uri().path().to_string();

    if let Some(route) = dev.proxy.match_path(&path) {
        return match dev.proxy.forward(route, req).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
    }

    let base_trimmed = dev.base_trimmed();
    if let Some(relative_path) = path.strip_prefix(base_trimmed).filter(|rest| rest.starts_with('/')) {
        return dev.serve_asset(req, relative_path).await;
    }

    // The server root and its index page lead to the application.
    if path == "/" || path == "/index.html" {
        let location = match req.uri().query() {
            Some(query) => format!("{}?{}", dev.base, query),
            None => dev.base.clone(),
        };
        debug!(path = %path, location = %location, "Redirecting to the public base path");
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    outside_base(&path, &dev.base)
}

fn outside_base(path: &str, base: &str) -> Response {
    debug!(path = %path, "Request outside the public base path");
    let suggestion = if format!("{}/", path) == base {
        base.to_string()
    } else {
        format!("{}{}", base.trim_end_matches('/'), path)
    };
    (
        StatusCode::NOT_FOUND,
        format!(
            "The server is configured with a public base URL of {} - did you mean to visit {} instead?",
            base, suggestion
        ),
    )
        .into_response()
}

fn relative_uri(path: &str, query: Option<&str>) -> Result<Uri, Response> {
    let raw = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };
    raw.parse::<Uri>()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid request path").into_response())
}
