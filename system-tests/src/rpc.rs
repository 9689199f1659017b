// system-tests/src/rpc.rs
// ============================================================================
// Module: JSON-RPC Payload Builders
// Description: Builders for the JSON-RPC 2.0 bodies the suites post at the gateway.
// Purpose: Keep request construction consistent across system-test suites.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Builders for the JSON-RPC 2.0 request bodies the system-test suites post
//! at a running gateway. Each builder returns a [`Value`] so suites can tweak
//! individual fields before serialization when a test needs a malformed or
//! unusual payload.

use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a parameterless JSON-RPC request.
#[must_use]
pub fn request(id: u64, method: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
    })
}

/// Builds a JSON-RPC request carrying `params`.
#[must_use]
pub fn request_with_params(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Builds an MCP `initialize` request with minimal client info.
#[must_use]
pub fn initialize(id: u64) -> Value {
    request_with_params(
        id,
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "system-tests", "version": "0.1.0" },
        }),
    )
}

/// Builds a `tools/list` request.
#[must_use]
pub fn tools_list(id: u64) -> Value {
    request(id, "tools/list")
}

/// Builds a `tools/call` request for `name` with the given arguments.
#[must_use]
pub fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    request_with_params(
        id,
        "tools/call",
        json!({
            "name": name,
            "arguments": arguments,
        }),
    )
}

/// Builds a `ping` request.
#[must_use]
pub fn ping(id: u64) -> Value {
    request(id, "ping")
}
