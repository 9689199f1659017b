// crates/toolgate-gateway/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: HTTP surface routing protocol requests to registered servers.
// Purpose: Bind the listener, resolve sessions, and relay or dispatch bodies.
// Dependencies: toolgate-core, toolgate-config, axum, tokio, serde_json
// ============================================================================

//! ## Overview
//! One axum router serves the whole gateway: `POST`-style protocol traffic on
//! `/mcp/{server_id}`, the bare `/mcp` alias for the built-in core server,
//! and the `GET /mcp/status` overview. Local servers resolve a session before
//! any handler runs: a presented session id must match a live session, an
//! absent id mints a fresh one, and both session headers are echoed on the
//! response. Remote servers are passthrough: the body is forwarded verbatim
//! and the upstream response is relayed, so only transport-level failures
//! produce a gateway-authored error envelope. Every envelope the gateway
//! authors carries the original request id when one can be recovered from
//! the body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::any;
use axum::routing::get;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use toolgate_config::GatewayConfig;
use toolgate_config::RESERVED_SERVER_ID;
use toolgate_core::JsonRpcResponse;
use toolgate_core::ServerId;
use toolgate_core::SessionId;
use toolgate_core::rpc;

use crate::audit::GatewayAuditSink;
use crate::audit::ProxyAuditEvent;
use crate::audit::ServerAuditEvent;
use crate::correlation::CLIENT_CORRELATION_HEADER;
use crate::correlation::CorrelationIdRejection;
use crate::correlation::sanitize_client_correlation_id;
use crate::proxy::ProxyError;
use crate::proxy::ProxyRequest;
use crate::proxy::RemoteProxy;
use crate::registry::RegisteredServer;
use crate::registry::RemoteTarget;
use crate::registry::ServerBackend;
use crate::registry::ServerRegistry;
use crate::session::LocalServerFactory;
use crate::session::RequestScope;
use crate::session::SessionError;
use crate::session::SessionHandler;
use crate::session::SessionManager;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::GatewayMethod;
use crate::telemetry::GatewayOutcome;
use crate::telemetry::MetricEvent;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Primary session header, read first and echoed on local responses.
pub const MCP_SESSION_HEADER: &str = "mcp-session-id";

/// Fallback session header, honored on read and echoed on local responses.
pub const X_SESSION_HEADER: &str = "x-session-id";

/// Header naming the user a request runs on behalf of.
pub const USER_ID_HEADER: &str = "x-user-id";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway construction and serving error.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration was rejected at build time.
    #[error("configuration error: {0}")]
    Config(String),
    /// The listener could not be bound.
    #[error("bind error: {0}")]
    Bind(String),
    /// The HTTP server stopped with an error.
    #[error("serve error: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Gateway Server
// ============================================================================

/// Externally supplied collaborators wired into the gateway at build time.
///
/// Identity, catalog, and executor choices live behind the core factory so
/// deployments swap them without touching the HTTP surface.
pub struct GatewayCollaborators {
    /// Factory minting sessions for the built-in core server.
    pub core_factory: Arc<dyn LocalServerFactory>,
    /// Sink receiving lifecycle and tool call records.
    pub audit: Arc<dyn GatewayAuditSink>,
    /// Sink receiving request latencies.
    pub metrics: Arc<dyn GatewayMetrics>,
}

/// Shared state handed to every request handler.
#[derive(Clone)]
struct GatewayState {
    /// Registered servers keyed by path identifier.
    registry: Arc<ServerRegistry>,
    /// Session table shared by every local server.
    sessions: Arc<SessionManager>,
    /// Forwarder for remote servers.
    proxy: Arc<RemoteProxy>,
    /// Sink receiving lifecycle records.
    audit: Arc<dyn GatewayAuditSink>,
    /// Sink receiving request latencies.
    metrics: Arc<dyn GatewayMetrics>,
    /// Maximum accepted request body size in bytes.
    max_body_bytes: usize,
}

/// The gateway HTTP server.
///
/// # Invariants
/// - The core server is always registered under [`RESERVED_SERVER_ID`].
/// - Configured remotes are registered before the first request is served.
pub struct GatewayServer {
    /// Validated gateway configuration.
    config: GatewayConfig,
    /// Shared request-handling state.
    state: GatewayState,
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer").field("config", &self.config).finish_non_exhaustive()
    }
}

impl GatewayServer {
    /// Builds a gateway from validated configuration and collaborators.
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] when the configuration fails
    /// validation, a remote entry cannot be registered, or the HTTP client
    /// cannot be constructed.
    pub fn from_config(
        config: GatewayConfig,
        collaborators: GatewayCollaborators,
    ) -> Result<Self, GatewayError> {
        config.validate().map_err(|err| GatewayError::Config(err.to_string()))?;
        let sessions = Arc::new(SessionManager::new(
            config.sessions.idle_timeout(),
            Arc::clone(&collaborators.audit),
        ));
        let registry = Arc::new(ServerRegistry::new());
        let core = RegisteredServer::local(
            ServerId::new(RESERVED_SERVER_ID),
            "Toolgate Core",
            env!("CARGO_PKG_VERSION"),
            Some("Built-in tool server hosted by the gateway.".to_string()),
            Arc::clone(&collaborators.core_factory),
        );
        register(&registry, core, collaborators.audit.as_ref())?;
        for remote in &config.remotes {
            let server = RegisteredServer::from_remote_config(remote)
                .map_err(|err| GatewayError::Config(err.to_string()))?;
            register(&registry, server, collaborators.audit.as_ref())?;
        }
        let proxy = RemoteProxy::new(config.proxy.default_timeout(), config.proxy.connect_timeout())
            .map_err(|err| GatewayError::Config(err.to_string()))?;
        Ok(Self {
            state: GatewayState {
                registry,
                sessions,
                proxy: Arc::new(proxy),
                audit: collaborators.audit,
                metrics: collaborators.metrics,
                max_body_bytes: config.server.max_body_bytes,
            },
            config,
        })
    }

    /// Returns the router serving the gateway surface.
    #[must_use]
    pub fn router(&self) -> Router {
        gateway_router(self.state.clone())
    }

    /// Binds the configured address and serves until the server stops.
    ///
    /// # Errors
    /// Returns [`GatewayError::Config`] when the bind address does not parse,
    /// [`GatewayError::Bind`] when the listener cannot be bound, and
    /// [`GatewayError::Serve`] when the HTTP server stops with an error.
    pub async fn serve(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = self.config.server.bind_addr.parse().map_err(|_| {
            GatewayError::Config(format!("invalid bind address: {}", self.config.server.bind_addr))
        })?;
        let listener =
            TcpListener::bind(addr).await.map_err(|err| GatewayError::Bind(err.to_string()))?;
        self.serve_on(listener).await
    }

    /// Serves the gateway on an already bound listener.
    ///
    /// The idle-session reaper runs alongside the server and stops when
    /// serving stops.
    ///
    /// # Errors
    /// Returns [`GatewayError::Serve`] when the HTTP server stops with an
    /// error.
    pub async fn serve_on(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let reaper = spawn_reaper(
            Arc::clone(&self.state.sessions),
            self.config.sessions.reap_interval(),
        );
        let app = gateway_router(self.state.clone());
        let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| GatewayError::Serve(err.to_string()));
        reaper.abort();
        served
    }

    /// Closes every live session, then shuts down every registered server.
    ///
    /// Close failures are recorded and swallowed so one stuck session cannot
    /// block the rest of shutdown.
    pub async fn shutdown(&self) {
        self.state.sessions.close_all().await;
        self.state.registry.shutdown_all(self.state.audit.as_ref()).await;
    }
}

/// Registers one server and records the registration.
fn register(
    registry: &ServerRegistry,
    server: RegisteredServer,
    audit: &dyn GatewayAuditSink,
) -> Result<(), GatewayError> {
    let id = server.id.to_string();
    let kind = server.kind().as_str();
    registry.register(server).map_err(|err| GatewayError::Config(err.to_string()))?;
    audit.record_server(&ServerAuditEvent::registered(id, kind));
    Ok(())
}

/// Spawns the periodic idle-session reaper.
fn spawn_reaper(sessions: Arc<SessionManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a freshly started
        // gateway does not reap before one full period has passed.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sessions.reap_idle().await;
        }
    })
}

// ============================================================================
// SECTION: Routing
// ============================================================================

/// Builds the gateway router over the shared state.
fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/mcp", any(handle_core))
        .route("/mcp/status", get(handle_status))
        .route("/mcp/{server_id}", any(handle_server))
        .with_state(state)
}

/// Serves the bare `/mcp` alias for the core server.
async fn handle_core(
    State(state): State<GatewayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, peer, method, &headers, &ServerId::new(RESERVED_SERVER_ID), body).await
}

/// Serves `/mcp/{server_id}` for every registered server.
async fn handle_server(
    State(state): State<GatewayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(server_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, peer, method, &headers, &ServerId::new(server_id), body).await
}

/// Serves the `GET /mcp/status` overview of every registered server.
async fn handle_status(State(state): State<GatewayState>) -> Response {
    let started = Instant::now();
    let snapshot = state.registry.status_snapshot(&state.sessions).await;
    state.metrics.record(&MetricEvent {
        method: GatewayMethod::Status,
        outcome: GatewayOutcome::Ok,
        elapsed_ms: started.elapsed().as_millis(),
    });
    (StatusCode::OK, Json(snapshot)).into_response()
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Routes one request and records its latency.
async fn dispatch(
    state: &GatewayState,
    peer: SocketAddr,
    method: Method,
    headers: &HeaderMap,
    server_id: &ServerId,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let (gateway_method, outcome, response) =
        route(state, peer, method, headers, server_id, body).await;
    state.metrics.record(&MetricEvent {
        method: gateway_method,
        outcome,
        elapsed_ms: started.elapsed().as_millis(),
    });
    response
}

/// Resolves the registered server and hands the request to its backend.
async fn route(
    state: &GatewayState,
    peer: SocketAddr,
    method: Method,
    headers: &HeaderMap,
    server_id: &ServerId,
    body: Bytes,
) -> (GatewayMethod, GatewayOutcome, Response) {
    if body.len() > state.max_body_bytes {
        let response = error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            Value::Null,
            rpc::INVALID_REQUEST,
            "request body too large",
        );
        return (GatewayMethod::Invalid, GatewayOutcome::Error, response);
    }
    let Some(server) = state.registry.get(server_id) else {
        let response = error_response(
            StatusCode::NOT_FOUND,
            rpc::extract_request_id(&body),
            rpc::TRANSPORT_ERROR,
            format!("server not found: {server_id}"),
        );
        return (GatewayMethod::Invalid, GatewayOutcome::Error, response);
    };
    match &server.backend {
        ServerBackend::Local(factory) => {
            dispatch_local(state, peer, headers, server_id, factory, &body).await
        }
        ServerBackend::Remote(target) => {
            dispatch_remote(state, method, headers, server_id, target, body).await
        }
    }
}

/// Parses the body, resolves the session, and runs the local handler.
async fn dispatch_local(
    state: &GatewayState,
    peer: SocketAddr,
    headers: &HeaderMap,
    server_id: &ServerId,
    factory: &Arc<dyn LocalServerFactory>,
    body: &[u8],
) -> (GatewayMethod, GatewayOutcome, Response) {
    let request = match rpc::parse_request(body) {
        Ok(request) => request,
        Err(err) => {
            let response = error_response(
                StatusCode::BAD_REQUEST,
                rpc::extract_request_id(body),
                err.code(),
                err.to_string(),
            );
            return (GatewayMethod::Invalid, GatewayOutcome::Error, response);
        }
    };
    let scope = match request_scope(peer, headers) {
        Ok(scope) => scope,
        Err(rejection) => {
            let response = error_response(
                StatusCode::BAD_REQUEST,
                request.id,
                rpc::INVALID_REQUEST,
                format!("invalid correlation header: {rejection}"),
            );
            return (GatewayMethod::Invalid, GatewayOutcome::Error, response);
        }
    };
    let resolved = resolve_session(state, headers, server_id, factory, scope.user_id.clone()).await;
    let (session_id, handler) = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            let (status, code) = session_failure(&err);
            let response = error_response(status, request.id, code, err.to_string());
            return (GatewayMethod::LocalDispatch, GatewayOutcome::Error, response);
        }
    };
    let (status, payload) = handler.handle(&scope, request).await;
    let outcome = if payload.error.is_none() {
        GatewayOutcome::Ok
    } else {
        GatewayOutcome::Error
    };
    (GatewayMethod::LocalDispatch, outcome, session_response(status, &session_id, &payload))
}

/// Forwards one request to a remote server and relays the upstream response.
async fn dispatch_remote(
    state: &GatewayState,
    method: Method,
    headers: &HeaderMap,
    server_id: &ServerId,
    target: &RemoteTarget,
    body: Bytes,
) -> (GatewayMethod, GatewayOutcome, Response) {
    let started = Instant::now();
    let request_id = rpc::extract_request_id(&body);
    let outbound = ProxyRequest {
        method,
        headers: headers.clone(),
        body,
    };
    match state.proxy.forward(target, outbound).await {
        Ok(upstream) => {
            state.audit.record_proxy(&ProxyAuditEvent::new(
                server_id.to_string(),
                Some(upstream.status.as_u16()),
                GatewayOutcome::Ok,
                None,
                started.elapsed().as_millis(),
            ));
            let mut response = (upstream.status, upstream.body).into_response();
            *response.headers_mut() = upstream.headers;
            (GatewayMethod::RemoteProxy, GatewayOutcome::Ok, response)
        }
        Err(err) => {
            state.audit.record_proxy(&ProxyAuditEvent::new(
                server_id.to_string(),
                None,
                GatewayOutcome::Error,
                Some(err.kind()),
                started.elapsed().as_millis(),
            ));
            let status = match err {
                ProxyError::Timeout {
                    ..
                } => StatusCode::GATEWAY_TIMEOUT,
                ProxyError::Init(_) | ProxyError::Transport(_) | ProxyError::InvalidUpstream(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            let response =
                error_response(status, request_id, rpc::TRANSPORT_ERROR, err.to_string());
            (GatewayMethod::RemoteProxy, GatewayOutcome::Error, response)
        }
    }
}

// ============================================================================
// SECTION: Request Helpers
// ============================================================================

/// Builds the per-request scope from the peer address and headers.
///
/// # Errors
/// Returns the rejection reason when the client correlation header is
/// present but unusable.
fn request_scope(
    peer: SocketAddr,
    headers: &HeaderMap,
) -> Result<RequestScope, CorrelationIdRejection> {
    let client_correlation_id =
        sanitize_client_correlation_id(header_value(headers, CLIENT_CORRELATION_HEADER))?;
    Ok(RequestScope {
        peer: Some(peer.ip()),
        user_id: header_value(headers, USER_ID_HEADER).map(str::to_string),
        client_correlation_id,
    })
}

/// Returns a header's value as a string, when present and valid UTF-8.
fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Resolves the session for a local request.
///
/// A presented identifier must match a live session bound to the same
/// server; an unknown identifier is never silently replaced. An absent or
/// empty identifier mints a fresh session.
///
/// # Errors
/// Returns [`SessionError::NotFound`] for an unknown presented identifier
/// and [`SessionError::Factory`] when minting fails.
async fn resolve_session(
    state: &GatewayState,
    headers: &HeaderMap,
    server_id: &ServerId,
    factory: &Arc<dyn LocalServerFactory>,
    user_id: Option<String>,
) -> Result<(SessionId, Arc<dyn SessionHandler>), SessionError> {
    let presented = header_value(headers, MCP_SESSION_HEADER)
        .or_else(|| header_value(headers, X_SESSION_HEADER))
        .map(SessionId::new);
    match presented {
        Some(session_id) if !session_id.is_empty() => {
            let handler = state.sessions.lookup(server_id, &session_id).await?;
            Ok((session_id, handler))
        }
        _ => state.sessions.create(server_id, factory, user_id).await,
    }
}

/// Maps a session error onto an HTTP status and protocol code.
fn session_failure(err: &SessionError) -> (StatusCode, i64) {
    match err {
        SessionError::NotFound => (StatusCode::NOT_FOUND, rpc::SESSION_AUTH_ERROR),
        SessionError::Factory(_) | SessionError::Closed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, rpc::INTERNAL_ERROR)
        }
    }
}

// ============================================================================
// SECTION: Response Helpers
// ============================================================================

/// Builds a local dispatch response with both session headers echoed.
fn session_response(
    status: StatusCode,
    session_id: &SessionId,
    payload: &JsonRpcResponse,
) -> Response {
    let mut response = (status, Json(payload)).into_response();
    if let Ok(value) = HeaderValue::from_str(session_id.as_str()) {
        response.headers_mut().insert(MCP_SESSION_HEADER, value.clone());
        response.headers_mut().insert(X_SESSION_HEADER, value);
    }
    response
}

/// Builds a protocol error envelope with the given HTTP status.
fn error_response(
    status: StatusCode,
    id: Value,
    code: i64,
    message: impl Into<String>,
) -> Response {
    (status, Json(JsonRpcResponse::error(id, code, message))).into_response()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
