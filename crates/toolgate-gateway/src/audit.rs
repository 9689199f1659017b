// crates/toolgate-gateway/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for sessions, tool calls, proxying,
//              and server registration.
// Purpose: Emit JSON-line audit records without hard pipeline dependencies.
// Dependencies: toolgate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for gateway activity.
//! Every dispatched tool call is recorded with its server-issued correlation
//! identifier and elapsed wall time; session lifecycle transitions and remote
//! proxy attempts are recorded alongside. Sinks are intentionally lightweight
//! so deployments can route events to their preferred logging pipeline
//! without redesign.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use toolgate_core::CorrelationId;
use toolgate_core::Role;
use toolgate_core::SessionId;
use toolgate_core::ToolName;

use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tool call audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Server-issued correlation identifier for this call.
    pub correlation_id: CorrelationId,
    /// Sanitized client correlation identifier when provided.
    pub client_correlation_id: Option<CorrelationId>,
    /// Session that issued the call, when a caller identity was supplied.
    pub session_id: Option<SessionId>,
    /// Resolved user identifier when identity resolution succeeded.
    pub user_id: Option<String>,
    /// Resolved role when identity resolution succeeded.
    pub role: Option<Role>,
    /// Requested tool name.
    pub tool: Option<ToolName>,
    /// Call outcome.
    pub outcome: GatewayOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Elapsed wall time for the call in milliseconds.
    pub elapsed_ms: u128,
}

/// Inputs required to construct a tool call audit event.
pub struct ToolCallAuditEventParams {
    /// Server-issued correlation identifier for this call.
    pub correlation_id: CorrelationId,
    /// Sanitized client correlation identifier when provided.
    pub client_correlation_id: Option<CorrelationId>,
    /// Session that issued the call, when a caller identity was supplied.
    pub session_id: Option<SessionId>,
    /// Resolved user identifier when identity resolution succeeded.
    pub user_id: Option<String>,
    /// Resolved role when identity resolution succeeded.
    pub role: Option<Role>,
    /// Requested tool name.
    pub tool: Option<ToolName>,
    /// Call outcome.
    pub outcome: GatewayOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Elapsed wall time for the call in milliseconds.
    pub elapsed_ms: u128,
}

impl ToolCallAuditEvent {
    /// Creates a new tool call audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: ToolCallAuditEventParams) -> Self {
        Self {
            event: "tool_call",
            timestamp_ms: timestamp_ms(),
            correlation_id: params.correlation_id,
            client_correlation_id: params.client_correlation_id,
            session_id: params.session_id,
            user_id: params.user_id,
            role: params.role,
            tool: params.tool,
            outcome: params.outcome,
            error_kind: params.error_kind,
            elapsed_ms: params.elapsed_ms,
        }
    }
}

/// Session lifecycle audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SessionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Session the event concerns.
    pub session_id: SessionId,
    /// Server the session is bound to.
    pub server_id: String,
    /// Idle time at reap in milliseconds, for reap events.
    pub idle_ms: Option<u128>,
    /// Failure detail, for close-failure events.
    pub detail: Option<String>,
}

impl SessionAuditEvent {
    /// Creates an event recording a freshly created session.
    #[must_use]
    pub fn created(session_id: SessionId, server_id: String) -> Self {
        Self {
            event: "session_created",
            timestamp_ms: timestamp_ms(),
            session_id,
            server_id,
            idle_ms: None,
            detail: None,
        }
    }

    /// Creates an event recording a session reaped for idleness.
    #[must_use]
    pub fn reaped(session_id: SessionId, server_id: String, idle_ms: u128) -> Self {
        Self {
            event: "session_reaped",
            timestamp_ms: timestamp_ms(),
            session_id,
            server_id,
            idle_ms: Some(idle_ms),
            detail: None,
        }
    }

    /// Creates an event recording a failed handler or transport close.
    #[must_use]
    pub fn close_failed(session_id: SessionId, server_id: String, detail: String) -> Self {
        Self {
            event: "session_close_failed",
            timestamp_ms: timestamp_ms(),
            session_id,
            server_id,
            idle_ms: None,
            detail: Some(detail),
        }
    }
}

/// Remote proxy audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Remote server the request was forwarded to.
    pub server_id: String,
    /// Upstream HTTP status when a response was received.
    pub upstream_status: Option<u16>,
    /// Forwarding outcome.
    pub outcome: GatewayOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Elapsed wall time for the forwarded request in milliseconds.
    pub elapsed_ms: u128,
}

impl ProxyAuditEvent {
    /// Creates a new proxy audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        server_id: String,
        upstream_status: Option<u16>,
        outcome: GatewayOutcome,
        error_kind: Option<&'static str>,
        elapsed_ms: u128,
    ) -> Self {
        Self {
            event: "remote_proxy",
            timestamp_ms: timestamp_ms(),
            server_id,
            upstream_status,
            outcome,
            error_kind,
            elapsed_ms,
        }
    }
}

/// Server registry audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct ServerAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Server the event concerns.
    pub server_id: String,
    /// Backend kind label.
    pub kind: &'static str,
    /// Failure detail, for shutdown-failure events.
    pub detail: Option<String>,
}

impl ServerAuditEvent {
    /// Creates an event recording a server registration.
    #[must_use]
    pub fn registered(server_id: String, kind: &'static str) -> Self {
        Self {
            event: "server_registered",
            timestamp_ms: timestamp_ms(),
            server_id,
            kind,
            detail: None,
        }
    }

    /// Creates an event recording a failed server shutdown.
    #[must_use]
    pub fn shutdown_failed(server_id: String, kind: &'static str, detail: String) -> Self {
        Self {
            event: "server_shutdown_failed",
            timestamp_ms: timestamp_ms(),
            server_id,
            kind,
            detail: Some(detail),
        }
    }
}

/// Returns the current wall clock in milliseconds since the epoch.
pub(crate) fn timestamp_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for gateway events.
pub trait GatewayAuditSink: Send + Sync {
    /// Record a tool call audit event.
    fn record_tool_call(&self, event: &ToolCallAuditEvent);

    /// Record a session lifecycle audit event.
    fn record_session(&self, _event: &SessionAuditEvent) {}

    /// Record a remote proxy audit event.
    fn record_proxy(&self, _event: &ProxyAuditEvent) {}

    /// Record a server registry audit event.
    fn record_server(&self, _event: &ServerAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GatewayAuditSink for StderrAuditSink {
    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_proxy(&self, event: &ProxyAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_server(&self, event: &ServerAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Serializes and appends one event line.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl GatewayAuditSink for FileAuditSink {
    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        self.append(event);
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        self.append(event);
    }

    fn record_proxy(&self, event: &ProxyAuditEvent) {
        self.append(event);
    }

    fn record_server(&self, event: &ServerAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GatewayAuditSink for NoopAuditSink {
    fn record_tool_call(&self, _event: &ToolCallAuditEvent) {}

    fn record_session(&self, _event: &SessionAuditEvent) {}

    fn record_proxy(&self, _event: &ProxyAuditEvent) {}

    fn record_server(&self, _event: &ServerAuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
