// crates/toolgate-gateway/src/proxy.rs
// ============================================================================
// Module: Remote Proxy
// Description: Request forwarding to remote servers with auth injection and
//              per-server deadlines.
// Purpose: Relay protocol requests to configured upstream endpoints.
// Dependencies: toolgate-core, axum, base64, bytes, reqwest, tokio
// ============================================================================

//! ## Overview
//! [`RemoteProxy`] forwards protocol requests to remote servers. Forwarded
//! requests keep the original method, body, and end-to-end headers (session
//! identifiers included) while connection-scoped headers are stripped.
//! Configured per-server headers are applied on top, and upstream credentials
//! become an `Authorization` header last so they cannot be overridden by
//! client input. The whole exchange runs under a deadline: the per-server
//! timeout when configured, the proxy default otherwise. Redirects are
//! rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::Client;
use reqwest::redirect::Policy;

use crate::registry::RemoteAuth;
use crate::registry::RemoteTarget;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connection-scoped headers never forwarded in either direction.
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

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Remote forwarding error.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The shared HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    Init(String),
    /// The upstream exchange exceeded its deadline.
    #[error("upstream timeout after {timeout_ms} ms")]
    Timeout {
        /// Deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },
    /// The upstream exchange failed below the protocol layer.
    #[error("upstream request failed: {0}")]
    Transport(String),
    /// The configured upstream endpoint is unusable.
    #[error("invalid upstream endpoint: {0}")]
    InvalidUpstream(String),
}

impl ProxyError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Init(_) => "init",
            Self::Timeout {
                ..
            } => "timeout",
            Self::Transport(_) => "transport",
            Self::InvalidUpstream(_) => "invalid_upstream",
        }
    }
}

// ============================================================================
// SECTION: Request And Response Shapes
// ============================================================================

/// Inbound request material to forward upstream.
pub struct ProxyRequest {
    /// Original request method.
    pub method: Method,
    /// Original request headers.
    pub headers: HeaderMap,
    /// Original request body.
    pub body: Bytes,
}

/// Upstream response material to relay back.
#[derive(Debug)]
pub struct ProxyResponse {
    /// Upstream response status.
    pub status: StatusCode,
    /// Upstream response headers with connection-scoped entries removed.
    pub headers: HeaderMap,
    /// Upstream response body.
    pub body: Bytes,
}

// ============================================================================
// SECTION: Proxy
// ============================================================================

/// Forwarder for remote server requests.
///
/// # Invariants
/// - Redirects are rejected.
/// - Upstream credentials are applied after all other headers.
pub struct RemoteProxy {
    /// Shared HTTP client for upstream requests.
    client: Client,
    /// Deadline applied when a target has no timeout of its own.
    default_timeout: Duration,
}

impl RemoteProxy {
    /// Builds a proxy with a fresh HTTP client.
    ///
    /// # Errors
    /// Returns [`ProxyError::Init`] when the client cannot be constructed.
    pub fn new(default_timeout: Duration, connect_timeout: Duration) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| ProxyError::Init(err.to_string()))?;
        Ok(Self {
            client,
            default_timeout,
        })
    }

    /// Builds a proxy around a preconfigured client.
    #[must_use]
    pub const fn with_client(client: Client, default_timeout: Duration) -> Self {
        Self {
            client,
            default_timeout,
        }
    }

    /// Returns the deadline that applies to the given target.
    #[must_use]
    pub fn effective_timeout(&self, target: &RemoteTarget) -> Duration {
        target.timeout.unwrap_or(self.default_timeout)
    }

    /// Forwards one request to the target and relays the upstream response.
    ///
    /// # Errors
    /// Returns [`ProxyError::Timeout`] when the deadline elapses,
    /// [`ProxyError::Transport`] when the exchange fails below the protocol
    /// layer, and [`ProxyError::InvalidUpstream`] when the target
    /// configuration cannot be applied.
    pub async fn forward(
        &self,
        target: &RemoteTarget,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, ProxyError> {
        match target.url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(ProxyError::InvalidUpstream(format!("unsupported scheme: {scheme}")));
            }
        }
        let timeout = self.effective_timeout(target);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let headers = build_upstream_headers(&request.headers, target)?;
        let outbound = self
            .client
            .request(request.method, target.url.clone())
            .headers(headers)
            .body(request.body);
        let exchange = async {
            let response =
                outbound.send().await.map_err(|err| ProxyError::Transport(err.to_string()))?;
            let status = response.status();
            let headers = filter_response_headers(response.headers());
            let body =
                response.bytes().await.map_err(|err| ProxyError::Transport(err.to_string()))?;
            Ok(ProxyResponse {
                status,
                headers,
                body,
            })
        };
        tokio::time::timeout(timeout, exchange).await.map_err(|_| ProxyError::Timeout {
            timeout_ms,
        })?
    }
}

// ============================================================================
// SECTION: Header Policy
// ============================================================================

/// Returns `true` for connection-scoped headers that must not be forwarded.
fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name)
}

/// Builds the header set for an upstream request.
///
/// Keeps end-to-end request headers, drops connection-scoped ones along with
/// `host` and `content-length`, applies configured per-server headers, and
/// finally the `Authorization` credential.
fn build_upstream_headers(
    incoming: &HeaderMap,
    target: &RemoteTarget,
) -> Result<HeaderMap, ProxyError> {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        if is_hop_by_hop(name.as_str())
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    for (name, value) in &target.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| ProxyError::InvalidUpstream(format!("invalid header name: {err}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| ProxyError::InvalidUpstream(format!("invalid header value: {err}")))?;
        headers.insert(name, value);
    }
    if let Some(auth) = &target.auth {
        let value = HeaderValue::from_str(&authorization_value(auth)).map_err(|err| {
            ProxyError::InvalidUpstream(format!("invalid authorization value: {err}"))
        })?;
        headers.insert(header::AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Strips connection-scoped and length-bearing headers from a response.
fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if is_hop_by_hop(name.as_str()) || *name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Renders the `Authorization` header value for upstream credentials.
fn authorization_value(auth: &RemoteAuth) -> String {
    match auth {
        RemoteAuth::Bearer {
            token,
        } => format!("Bearer {token}"),
        RemoteAuth::Basic {
            username,
            password,
        } => {
            let encoded = STANDARD.encode(format!("{username}:{password}"));
            format!("Basic {encoded}")
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
