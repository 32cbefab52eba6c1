//! Reverse proxy used by the dev server to forward prefix-matched requests
//! to an upstream origin.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, Uri, Version};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use messages_core::config::parse_origin;
use messages_core::{CoreError, ProxyRule, ProxyTable};
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};

pub type ProxyClient = Client<HttpConnector, Body>;

/// Headers that only make sense for a single connection and are never forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn build_client() -> ProxyClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// A validated proxy rule, ready to rewrite request URIs.
#[derive(Debug, Clone)]
pub struct ProxyRoute {
    pub prefix: String,
    pub change_origin: bool,
    origin: String,
    host: HeaderValue,
}

impl ProxyRoute {
    pub fn from_rule(rule: &ProxyRule) -> ServerResult<Self> {
        let url = parse_origin(&rule.target.target)?;
        let host = url.host_str().unwrap_or_default();
        // `Url` drops the port when it is the scheme default.
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let host_header = HeaderValue::from_str(&authority).map_err(|e| {
            CoreError::Configuration(format!("proxy target host '{}' is invalid: {}", authority, e))
        })?;
        Ok(ProxyRoute {
            prefix: rule.prefix.clone(),
            change_origin: rule.target.change_origin,
            origin: format!("{}://{}", url.scheme(), authority),
            host: host_header,
        })
    }

    /// `scheme://host[:port]` of the upstream.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Value written to `Host` when `change_origin` is set.
    pub fn host(&self) -> &HeaderValue {
        &self.host
    }

    /// Maps an incoming request URI onto the upstream, keeping path and query.
    pub fn upstream_uri(&self, uri: &Uri) -> ServerResult<Uri> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.origin, path_and_query)
            .parse::<Uri>()
            .map_err(|e| ServerError::BadRequest(format!("Cannot proxy '{}': {}", path_and_query, e)))
    }
}

/// Ordered set of proxy routes sharing one pooled HTTP client.
#[derive(Debug, Clone)]
pub struct Proxy {
    routes: Vec<ProxyRoute>,
    client: ProxyClient,
}

impl Proxy {
    pub fn from_table(table: &ProxyTable) -> ServerResult<Self> {
        let routes = table
            .rules()
            .iter()
            .map(ProxyRoute::from_rule)
            .collect::<ServerResult<Vec<_>>>()?;
        Ok(Proxy {
            routes,
            client: build_client(),
        })
    }

    pub fn routes(&self) -> &[ProxyRoute] {
        &self.routes
    }

    /// First route, in declaration order, whose prefix starts the path.
    pub fn match_path(&self, path: &str) -> Option<&ProxyRoute> {
        self.routes.iter().find(|route| path.starts_with(route.prefix.as_str()))
    }

    /// Sends the request upstream and streams the response back.
    pub async fn forward(&self, route: &ProxyRoute, req: Request<Body>) -> ServerResult<Response<Body>> {
        let (mut parts, body) = req.into_parts();
        let upstream = route.upstream_uri(&parts.uri)?;
        debug!(
            method = %parts.method,
            path = %parts.uri.path(),
            upstream = %upstream,
            prefix = %route.prefix,
            "Forwarding request"
        );

        parts.uri = upstream;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if route.change_origin {
            parts.headers.insert(header::HOST, route.host.clone());
        }

        let response: Response<Incoming> = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| {
                warn!(origin = %route.origin, error = %e, "Upstream request failed");
                ServerError::Upstream(format!("{}: {}", route.origin, e))
            })?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Removes hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();
    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}
