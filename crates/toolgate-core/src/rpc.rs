// crates/toolgate-core/src/rpc.rs
// ============================================================================
// Module: JSON-RPC Envelopes
// Description: Request/response envelope types, reserved codes, and parsing.
// Purpose: Validate protocol payloads at the boundary and build error shapes.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The gateway speaks a JSON-RPC 2.0 dialect. This module owns the closed set
//! of envelope types used on the wire, the reserved error codes, and the
//! boundary helpers: strict request parsing and best-effort extraction of the
//! request `id` so failure envelopes stay correlated even when the body never
//! parsed as a request.
//!
//! Error code classes: `-32001` covers session/auth failures, `-32000` covers
//! transport/proxy failures; the remaining codes follow JSON-RPC convention.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::catalog::ToolDescriptor;
use crate::identifiers::ToolName;

// ============================================================================
// SECTION: Reserved Codes
// ============================================================================

/// Protocol version accepted and emitted by the gateway.
pub const JSONRPC_VERSION: &str = "2.0";

/// Body was not parseable JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Envelope was malformed (wrong version, empty method, oversized body).
pub const INVALID_REQUEST: i64 = -32600;
/// Method or tool name is not known.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Params payload did not match the method contract.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal failure while producing a result.
pub const INTERNAL_ERROR: i64 = -32603;
/// Transport/proxy class failures (upstream timeout or transport error).
pub const TRANSPORT_ERROR: i64 = -32000;
/// Session/auth class failures (session not found, missing identity, denial).
pub const SESSION_AUTH_ERROR: i64 = -32001;

// ============================================================================
// SECTION: Envelope Types
// ============================================================================

/// Incoming JSON-RPC request payload.
///
/// # Invariants
/// - `id` defaults to `null` when absent so notifications still parse and
///   failure envelopes can echo a `null` correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Builds a request envelope for the given method.
    #[must_use]
    pub fn new(id: Value, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response envelope.
///
/// # Invariants
/// - Exactly one of `result`/`error` is populated by the builders.
/// - `id` echoes the request id, or `null` when the request had none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier.
    pub id: Value,
    /// Successful result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success envelope.
    #[must_use]
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error envelope.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// SECTION: Method Payloads
// ============================================================================

/// Tool call parameters for `tools/call` requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Tool name.
    pub name: ToolName,
    /// Raw JSON arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// Tool list response payload for `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    /// Tool descriptors visible to the caller.
    pub tools: Vec<ToolDescriptor>,
}

/// Tool call response payload for `tools/call`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Tool output content blocks.
    pub content: Vec<ToolContent>,
}

impl ToolCallResult {
    /// Wraps an executor result in a single text content block.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let text = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        Self {
            content: vec![ToolContent::Text {
                text,
            }],
        }
    }
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text tool output carrying a serialized result.
    Text {
        /// Serialized payload.
        text: String,
    },
}

// ============================================================================
// SECTION: Boundary Helpers
// ============================================================================

/// Boundary validation failure for inbound payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Body was not parseable JSON or not a request envelope.
    #[error("parse error: {0}")]
    Parse(String),
    /// Envelope parsed but violated the protocol contract.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RpcError {
    /// Returns the reserved JSON-RPC code for this failure.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
        }
    }
}

/// Parses and validates an inbound request body.
///
/// # Errors
///
/// Returns [`RpcError::Parse`] when the body is not a JSON-RPC envelope and
/// [`RpcError::InvalidRequest`] when the version or method is unacceptable.
pub fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, RpcError> {
    let request: JsonRpcRequest =
        serde_json::from_slice(body).map_err(|err| RpcError::Parse(err.to_string()))?;
    if request.jsonrpc != JSONRPC_VERSION {
        return Err(RpcError::InvalidRequest("invalid json-rpc version".to_string()));
    }
    if request.method.trim().is_empty() {
        return Err(RpcError::InvalidRequest("method must be non-empty".to_string()));
    }
    Ok(request)
}

/// Best-effort extraction of the request `id` from a raw body.
///
/// Used to correlate failure envelopes for bodies that never parsed as a
/// request; returns `null` when no id can be recovered.
#[must_use]
pub fn extract_request_id(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .unwrap_or(Value::Null)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
