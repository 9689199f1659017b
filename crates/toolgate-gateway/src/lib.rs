// crates/toolgate-gateway/src/lib.rs
// ============================================================================
// Module: Toolgate Gateway
// Description: Session lifecycle, server registry, remote proxy, and
//              permission-gated tool dispatch behind one HTTP surface.
// Purpose: Route protocol requests to local handlers and remote servers.
// Dependencies: toolgate-core, toolgate-config, axum, tokio, reqwest
// ============================================================================

//! ## Overview
//! The Toolgate gateway fronts a set of protocol servers behind a single HTTP
//! surface. Local servers are backed by in-process session handlers produced
//! by a factory; remote servers are reached by forwarding requests to a
//! configured URL under a cancellable deadline. Sessions are created lazily,
//! refreshed on every touch, and reaped when idle past a configured timeout.
//! Tool calls pass through a permission gate that resolves the caller's
//! role and permission set before any executor runs.
//!
//! Security posture: session ids, correlation headers, and request bodies are
//! untrusted input; permission checks fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core_server;
pub mod correlation;
pub mod dispatch;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod session;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::GatewayAuditSink;
pub use audit::NoopAuditSink;
pub use audit::ProxyAuditEvent;
pub use audit::ServerAuditEvent;
pub use audit::SessionAuditEvent;
pub use audit::StderrAuditSink;
pub use audit::ToolCallAuditEvent;
pub use audit::ToolCallAuditEventParams;
pub use core_server::CoreServerFactory;
pub use core_server::PROTOCOL_VERSION;
pub use correlation::CLIENT_CORRELATION_HEADER;
pub use correlation::CorrelationIdGenerator;
pub use correlation::CorrelationIdRejection;
pub use correlation::MAX_CLIENT_CORRELATION_ID_LENGTH;
pub use correlation::SessionIdGenerator;
pub use correlation::sanitize_client_correlation_id;
pub use dispatch::DispatchError;
pub use dispatch::ToolDispatcher;
pub use proxy::ProxyError;
pub use proxy::ProxyRequest;
pub use proxy::ProxyResponse;
pub use proxy::RemoteProxy;
pub use registry::RegisteredServer;
pub use registry::RegistryError;
pub use registry::RemoteAuth;
pub use registry::RemoteTarget;
pub use registry::ServerBackend;
pub use registry::ServerKind;
pub use registry::ServerRegistry;
pub use registry::ServerStatus;
pub use registry::StatusSnapshot;
pub use server::GatewayCollaborators;
pub use server::GatewayError;
pub use server::GatewayServer;
pub use server::MCP_SESSION_HEADER;
pub use server::USER_ID_HEADER;
pub use server::X_SESSION_HEADER;
pub use session::LocalServerFactory;
pub use session::RequestScope;
pub use session::SessionError;
pub use session::SessionHandler;
pub use session::SessionManager;
pub use session::SessionPair;
pub use session::SessionSeed;
pub use session::SessionStats;
pub use session::SessionTransport;
pub use telemetry::GATEWAY_LATENCY_BUCKETS_MS;
pub use telemetry::GatewayMetrics;
pub use telemetry::GatewayMethod;
pub use telemetry::GatewayOutcome;
pub use telemetry::MetricEvent;
pub use telemetry::NoopMetrics;
