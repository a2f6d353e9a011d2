//! HTTP reverse proxy to the embedded server.
//!
//! Request method, query, body and end-to-end headers are forwarded;
//! hop-by-hop headers and the caller's gateway credentials are not. Upstream
//! redirects are returned to the caller as-is. Response bodies are streamed.

use crate::config::PathRewrite;
use crate::error::ProxyError;
use crate::{EMBEDDED_SERVER_BASE_URL, EMBEDDED_SERVER_HOSTNAME};

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::header::{
    AUTHORIZATION, CONNECTION, CONTENT_LENGTH, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION,
    TE, TRAILER, TRANSFER_ENCODING, UPGRADE, X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use axum::response::Response;
use log::{debug, warn};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const KEEP_ALIVE: &str = "keep-alive";

const HOP_BY_HOP: [HeaderName; 7] = [
    CONNECTION,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Headers that describe one connection and must not cross the proxy.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == KEEP_ALIVE
}

/// Client for the one fixed upstream.
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    client: reqwest::Client,
    http_base: String,
    ws_base: String,
    path_rewrite: PathRewrite,
    token_header: HeaderName,
}

impl UpstreamProxy {
    pub fn new(
        port: u16,
        path_rewrite: PathRewrite,
        token_header: HeaderName,
    ) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProxyError::request(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            http_base: format!("{EMBEDDED_SERVER_BASE_URL}:{port}"),
            ws_base: format!("ws://{EMBEDDED_SERVER_HOSTNAME}:{port}"),
            path_rewrite,
            token_header,
        })
    }

    pub fn http_base(&self) -> &str {
        &self.http_base
    }

    pub fn ws_base(&self) -> &str {
        &self.ws_base
    }

    /// Upstream path and query for an incoming URI, after the path rewrite.
    pub fn target(&self, uri: &Uri) -> String {
        let path = self.path_rewrite.apply(uri.path());
        match uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        }
    }

    pub fn http_url(&self, uri: &Uri) -> String {
        format!("{}{}", self.http_base, self.target(uri))
    }

    pub fn ws_url(&self, uri: &Uri) -> String {
        format!("{}{}", self.ws_base, self.target(uri))
    }

    /// Headers to send upstream for an incoming request.
    pub fn upstream_headers(&self, incoming: &HeaderMap, client_ip: Option<IpAddr>) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(incoming.len() + 3);

        for (name, value) in incoming {
            if is_hop_by_hop(name)
                || *name == HOST
                || *name == AUTHORIZATION
                || *name == self.token_header
            {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        if let Some(host) = incoming.get(HOST) {
            headers.insert(HeaderName::from_static(X_FORWARDED_HOST), host.clone());
        }

        headers.insert(
            HeaderName::from_static(X_FORWARDED_PROTO),
            HeaderValue::from_static("http"),
        );

        if let Some(ip) = client_ip {
            let forwarded_for = match incoming
                .get(X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
            {
                Some(existing) => format!("{existing}, {ip}"),
                None => ip.to_string(),
            };

            match HeaderValue::from_str(&forwarded_for) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
                }
                Err(e) => warn!("Dropping unrepresentable X-Forwarded-For: {e}"),
            }
        }

        headers
    }

    /// Forward one HTTP request and stream the response back.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::Unreachable`] if the embedded server refused the connection or timed out
    /// - [`ProxyError::Upstream`] for any other transport failure
    /// - [`ProxyError::Request`] if the response could not be rebuilt
    pub async fn forward(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();

        let url = self.http_url(&parts.uri);
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let headers = self.upstream_headers(&parts.headers, client_ip);
        let has_body = parts.headers.contains_key(CONTENT_LENGTH)
            || parts.headers.contains_key(TRANSFER_ENCODING);

        debug!("Proxying {} {} -> {}", parts.method, parts.uri.path(), url);

        let mut upstream_request = self.client.request(parts.method, &url).headers(headers);
        if has_body {
            upstream_request =
                upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream_response = upstream_request
            .send()
            .await
            .map_err(|e| ProxyError::from_reqwest(&self.http_base, &e))?;

        let mut builder = Response::builder().status(upstream_response.status());

        if let Some(response_headers) = builder.headers_mut() {
            for (name, value) in upstream_response.headers() {
                if is_hop_by_hop(name) || *name == X_FRAME_OPTIONS {
                    continue;
                }
                response_headers.append(name.clone(), value.clone());
            }
        }

        builder
            .body(Body::from_stream(upstream_response.bytes_stream()))
            .map_err(|e| ProxyError::request(format!("Failed to build proxied response: {e}")))
    }
}
