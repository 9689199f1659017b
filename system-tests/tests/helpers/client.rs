// system-tests/tests/helpers/client.rs
// ============================================================================
// Module: Gateway HTTP Client
// Description: JSON-RPC client for a running Toolgate gateway.
// Purpose: Issue JSON-RPC and status requests with captured session headers.
// Dependencies: reqwest, serde_json, toolgate-gateway
// ============================================================================

//! ## Overview
//! Thin `reqwest` wrapper for driving a running gateway. Every exchange
//! captures the HTTP status, both session echo headers, and the decoded JSON
//! body so suites can assert on the full wire surface.

use reqwest::Client;
use reqwest::Response;
use reqwest::header::HeaderMap;
use serde_json::Value;
use toolgate_gateway::MCP_SESSION_HEADER;
use toolgate_gateway::X_SESSION_HEADER;

/// Outcome of one JSON-RPC exchange with the gateway.
#[derive(Debug)]
pub struct RpcExchange {
    /// HTTP status code of the response.
    pub status: u16,
    /// Value of the `mcp-session-id` response header, when present.
    pub session_id: Option<String>,
    /// Value of the `x-session-id` response header, when present.
    pub fallback_session_id: Option<String>,
    /// Every response header, for suites that assert on relayed metadata.
    pub headers: HeaderMap,
    /// Decoded JSON body.
    pub body: Value,
}

impl RpcExchange {
    /// Returns the `error.message` string when the body carries one.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.body.pointer("/error/message").and_then(Value::as_str)
    }

    /// Returns the `error.code` when the body carries one.
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.body.pointer("/error/code").and_then(Value::as_i64)
    }

    /// Reads a response header as a string, when present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// JSON-RPC client for one running gateway.
pub struct GatewayClient {
    /// Underlying HTTP client.
    http: Client,
    /// Gateway base URL without a trailing slash.
    base_url: String,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url`.
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Posts `body` to `path`, attaching `headers` to the request.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be sent or the body is not JSON.
    pub async fn post_rpc(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&str, &str)],
    ) -> Result<RpcExchange, String> {
        let mut request = self.http.post(format!("{}{path}", self.base_url)).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response =
            request.send().await.map_err(|err| format!("gateway request failed: {err}"))?;
        let status = response.status().as_u16();
        let session_id = header_string(&response, MCP_SESSION_HEADER);
        let fallback_session_id = header_string(&response, X_SESSION_HEADER);
        let headers = response.headers().clone();
        let body =
            response.json().await.map_err(|err| format!("gateway body decode failed: {err}"))?;
        Ok(RpcExchange {
            status,
            session_id,
            fallback_session_id,
            headers,
            body,
        })
    }

    /// Fetches the status endpoint, returning the HTTP status and decoded body.
    ///
    /// # Errors
    ///
    /// Fails when the request cannot be sent or the body is not JSON.
    pub async fn status(&self) -> Result<(u16, Value), String> {
        let response = self
            .http
            .get(format!("{}/mcp/status", self.base_url))
            .send()
            .await
            .map_err(|err| format!("status request failed: {err}"))?;
        let status = response.status().as_u16();
        let body =
            response.json().await.map_err(|err| format!("status body decode failed: {err}"))?;
        Ok((status, body))
    }

    /// Reads the active session count reported for `server` on the status page.
    ///
    /// # Errors
    ///
    /// Fails when the status page is unreachable or omits the server.
    pub async fn sessions_for(&self, server: &str) -> Result<u64, String> {
        let (_, body) = self.status().await?;
        body.pointer(&format!("/servers/{server}/sessions"))
            .and_then(Value::as_u64)
            .ok_or_else(|| format!("status page has no session count for {server}"))
    }
}

/// Reads a response header as an owned string.
fn header_string(response: &Response, name: &str) -> Option<String> {
    response.headers().get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}
