// crates/toolgate-gateway/src/core_server.rs
// ============================================================================
// Module: Core Server
// Description: In-process protocol server backed by the tool dispatcher.
// Purpose: Answer protocol methods for sessions hosted inside the gateway.
// Dependencies: toolgate-core, async-trait, axum, serde_json
// ============================================================================

//! ## Overview
//! The core server is the gateway's own local server: a factory that mints
//! one handler per session and answers the protocol method surface in
//! process. `tools/list` and `tools/call` route through the permission-gated
//! [`ToolDispatcher`]; `initialize` announces the protocol revision and
//! capabilities; the resource and prompt surfaces are present but empty
//! because the core hosts tools only. The factory tracks its live session
//! count through the transport half, which exists solely to decrement that
//! count when the session ends.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;
use toolgate_core::CallerIdentity;
use toolgate_core::JsonRpcRequest;
use toolgate_core::JsonRpcResponse;
use toolgate_core::SessionId;
use toolgate_core::ToolCallParams;
use toolgate_core::ToolsListResult;
use toolgate_core::rpc;

use crate::dispatch::DispatchError;
use crate::dispatch::ToolDispatcher;
use crate::session::LocalServerFactory;
use crate::session::RequestScope;
use crate::session::SessionError;
use crate::session::SessionHandler;
use crate::session::SessionPair;
use crate::session::SessionSeed;
use crate::session::SessionTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Protocol revision announced during initialization.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name announced during initialization.
const SERVER_NAME: &str = "toolgate-core";

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Factory minting in-process sessions for the core server.
///
/// # Invariants
/// - The active count equals created sessions minus closed transports; the
///   count never underflows even if a transport is closed twice.
pub struct CoreServerFactory {
    /// Dispatcher shared by every session the factory mints.
    dispatcher: Arc<ToolDispatcher>,
    /// Live session count maintained through transport closes.
    active: Arc<AtomicUsize>,
}

impl CoreServerFactory {
    /// Creates a factory around the shared dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl LocalServerFactory for CoreServerFactory {
    async fn create_session(&self, seed: &SessionSeed) -> Result<SessionPair, SessionError> {
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(SessionPair {
            handler: Arc::new(CoreSessionHandler {
                dispatcher: Arc::clone(&self.dispatcher),
                session_id: seed.session_id.clone(),
            }),
            transport: Arc::new(CoreSessionTransport {
                active: Arc::clone(&self.active),
            }),
        })
    }

    fn active_session_count(&self) -> Option<usize> {
        Some(self.active.load(Ordering::SeqCst))
    }
}

// ============================================================================
// SECTION: Session Handler
// ============================================================================

/// Request handler for one core session.
struct CoreSessionHandler {
    /// Dispatcher answering the tool surface.
    dispatcher: Arc<ToolDispatcher>,
    /// Session this handler is bound to.
    session_id: SessionId,
}

impl CoreSessionHandler {
    /// Builds the caller identity for a request, when the scope names a user.
    ///
    /// No user hint means no identity context: listing degrades to an empty
    /// catalog and invocation is rejected, never defaulted.
    fn caller_for(&self, scope: &RequestScope) -> Option<CallerIdentity> {
        scope.user_id.as_ref().map(|user_id| {
            CallerIdentity::for_session(self.session_id.clone()).with_user(user_id.clone())
        })
    }

    /// Answers `tools/list` through the permission gate.
    async fn tools_list(&self, scope: &RequestScope, id: Value) -> (StatusCode, JsonRpcResponse) {
        let caller = self.caller_for(scope);
        match self.dispatcher.list_tools(caller.as_ref()).await {
            Ok(tools) => serialized_result(id, &ToolsListResult {
                tools,
            }),
            Err(err) => dispatch_failure(id, &err),
        }
    }

    /// Answers `tools/call` through the permission gate.
    async fn tools_call(
        &self,
        scope: &RequestScope,
        id: Value,
        params: Option<Value>,
    ) -> (StatusCode, JsonRpcResponse) {
        let Ok(call) = serde_json::from_value::<ToolCallParams>(params.unwrap_or(Value::Null))
        else {
            return (
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(id, rpc::INVALID_PARAMS, "invalid tool params"),
            );
        };
        let caller = self.caller_for(scope);
        let correlation = scope.client_correlation_id.clone();
        match self.dispatcher.call_tool(caller.as_ref(), &call, correlation).await {
            Ok(result) => serialized_result(id, &result),
            Err(err) => dispatch_failure(id, &err),
        }
    }
}

#[async_trait]
impl SessionHandler for CoreSessionHandler {
    async fn handle(
        &self,
        scope: &RequestScope,
        request: JsonRpcRequest,
    ) -> (StatusCode, JsonRpcResponse) {
        match request.method.as_str() {
            "initialize" => {
                (StatusCode::OK, JsonRpcResponse::result(request.id, initialize_result()))
            }
            "notifications/initialized" | "ping" => {
                (StatusCode::OK, JsonRpcResponse::result(request.id, json!({})))
            }
            "tools/list" => self.tools_list(scope, request.id).await,
            "tools/call" => self.tools_call(scope, request.id, request.params).await,
            "resources/list" => (
                StatusCode::OK,
                JsonRpcResponse::result(request.id, json!({ "resources": [] })),
            ),
            "prompts/list" => {
                (StatusCode::OK, JsonRpcResponse::result(request.id, json!({ "prompts": [] })))
            }
            "prompts/get" => (
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(request.id, rpc::INVALID_PARAMS, "unknown prompt"),
            ),
            _ => (
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(request.id, rpc::METHOD_NOT_FOUND, "method not found"),
            ),
        }
    }
}

/// Transport half for core sessions.
///
/// The core replies in-band over HTTP, so the transport's only duty is
/// releasing the factory's session count at end of life.
struct CoreSessionTransport {
    /// Live session count shared with the factory.
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionTransport for CoreSessionTransport {
    async fn close(&self) -> Result<(), SessionError> {
        let _ = self.active.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
            count.checked_sub(1)
        });
        Ok(())
    }
}

// ============================================================================
// SECTION: Response Builders
// ============================================================================

/// Builds the `initialize` result payload.
fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {},
            "resources": {},
            "prompts": {},
        },
    })
}

/// Serializes a result payload into a success envelope.
fn serialized_result<T: serde::Serialize>(id: Value, payload: &T) -> (StatusCode, JsonRpcResponse) {
    match serde_json::to_value(payload) {
        Ok(value) => (StatusCode::OK, JsonRpcResponse::result(id, value)),
        Err(_) => (
            StatusCode::OK,
            JsonRpcResponse::error(id, rpc::INTERNAL_ERROR, "serialization failed"),
        ),
    }
}

/// Maps a dispatch failure onto an HTTP status and error envelope.
fn dispatch_failure(id: Value, err: &DispatchError) -> (StatusCode, JsonRpcResponse) {
    let status = match err {
        DispatchError::MissingIdentity | DispatchError::Identity(_) => StatusCode::UNAUTHORIZED,
        DispatchError::PermissionDenied {
            ..
        } => StatusCode::FORBIDDEN,
        DispatchError::UnknownTool(_) => StatusCode::BAD_REQUEST,
        DispatchError::Catalog(_) | DispatchError::Execution(_) => StatusCode::OK,
    };
    (status, JsonRpcResponse::error(id, err.code(), err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
