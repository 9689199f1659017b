// crates/toolgate-gateway/src/session.rs
// ============================================================================
// Module: Session Lifecycle
// Description: Lazy session creation, access tracking, and idle reaping for
//              locally hosted protocol servers.
// Purpose: Own the session table and the close discipline for its entries.
// Dependencies: toolgate-core, async-trait, axum, serde, tokio
// ============================================================================

//! ## Overview
//! Sessions bind one client to one locally hosted server. The manager creates
//! a session lazily when a request arrives without a session identifier,
//! refreshes the access time on every touch, and reaps entries whose idle
//! time has reached the configured threshold. A reaped or unknown identifier
//! is never resurrected; callers receive [`SessionError::NotFound`] and must
//! start a new session. When an entry is removed its handler and transport
//! are both closed, in that order, and close failures are recorded to the
//! audit sink rather than propagated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::Serialize;
use tokio::sync::Mutex;
use toolgate_core::CorrelationId;
use toolgate_core::JsonRpcRequest;
use toolgate_core::JsonRpcResponse;
use toolgate_core::ServerId;
use toolgate_core::SessionId;

use crate::audit::GatewayAuditSink;
use crate::audit::SessionAuditEvent;
use crate::audit::timestamp_ms;
use crate::correlation::SessionIdGenerator;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Session lifecycle error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live session exists under the presented identifier.
    #[error("Session not found")]
    NotFound,
    /// The server factory failed to produce a session.
    #[error("session factory error: {0}")]
    Factory(String),
    /// A handler or transport failed to close cleanly.
    #[error("session close failed: {0}")]
    Closed(String),
}

// ============================================================================
// SECTION: Request Scope
// ============================================================================

/// Per-request context threaded from the HTTP surface to session handlers.
///
/// The scope carries request-level hints a handler cannot read itself once
/// the body has been parsed: the peer address, the user identity hint, and
/// the sanitized client correlation identifier.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    /// Peer address of the client connection, when known.
    pub peer: Option<IpAddr>,
    /// User hint forwarded from the request, when present.
    pub user_id: Option<String>,
    /// Sanitized client correlation identifier, when supplied.
    pub client_correlation_id: Option<CorrelationId>,
}

// ============================================================================
// SECTION: Collaborator Traits
// ============================================================================

/// Per-session request handler for a locally hosted server.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Handles one protocol request and returns the HTTP status to use along
    /// with the response envelope.
    async fn handle(
        &self,
        scope: &RequestScope,
        request: JsonRpcRequest,
    ) -> (StatusCode, JsonRpcResponse);

    /// Releases handler resources. Best-effort; called once at end of life.
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] when resources could not be released.
    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionHandler")
    }
}

/// Per-session transport paired with a handler.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Releases transport resources. Best-effort; called once at end of life.
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] when resources could not be released.
    async fn close(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Handler and transport produced together for one session.
///
/// # Invariants
/// - The pair shares one lifetime: both halves are closed when the session
///   ends, regardless of which close fails.
pub struct SessionPair {
    /// Request handler for the session.
    pub handler: Arc<dyn SessionHandler>,
    /// Transport paired with the handler.
    pub transport: Arc<dyn SessionTransport>,
}

/// Inputs handed to a factory when a session is created.
#[derive(Debug, Clone)]
pub struct SessionSeed {
    /// Gateway-issued identifier for the new session.
    pub session_id: SessionId,
    /// User hint forwarded from the request, when present.
    pub user_id: Option<String>,
}

/// Factory producing sessions for one locally hosted server.
#[async_trait]
pub trait LocalServerFactory: Send + Sync {
    /// Creates a fresh handler/transport pair for the seeded session.
    ///
    /// # Errors
    /// Returns [`SessionError::Factory`] when the session cannot be built.
    async fn create_session(&self, seed: &SessionSeed) -> Result<SessionPair, SessionError>;

    /// Reports the number of sessions the factory believes are live, when it
    /// tracks that itself.
    fn active_session_count(&self) -> Option<usize> {
        None
    }

    /// Releases factory-wide resources at gateway shutdown. Best-effort.
    ///
    /// # Errors
    /// Returns [`SessionError::Closed`] when resources could not be released.
    async fn shutdown(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Session Table
// ============================================================================

/// One live session and its bookkeeping.
///
/// Monotonic instants drive the reaping math; the wall-clock stamps exist
/// only for snapshots.
struct SessionEntry {
    /// Request handler for the session.
    handler: Arc<dyn SessionHandler>,
    /// Transport paired with the handler.
    transport: Arc<dyn SessionTransport>,
    /// Server the session is bound to.
    server_id: ServerId,
    /// When the session was created.
    created_at: Instant,
    /// Last time the session was created or touched.
    last_accessed: Instant,
    /// Wall clock at creation, in milliseconds since the epoch.
    created_at_ms: u128,
    /// Wall clock at the last touch, in milliseconds since the epoch.
    last_accessed_ms: u128,
}

/// Read-only view of one live session for operational visibility.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Session identifier.
    pub id: SessionId,
    /// Server the session is bound to.
    pub server_id: ServerId,
    /// Wall clock at creation, in milliseconds since the epoch.
    pub created_at_ms: u128,
    /// Wall clock at the last touch, in milliseconds since the epoch.
    pub last_accessed_ms: u128,
    /// Milliseconds since the session was created.
    pub age_ms: u128,
    /// Milliseconds since the session was last touched.
    pub idle_ms: u128,
}

/// Owner of the session table for all locally hosted servers.
///
/// # Invariants
/// - Session identifiers are unique for the process lifetime and never
///   reused after removal.
/// - The table lock is never held across a handler, transport, or factory
///   await point.
pub struct SessionManager {
    /// Live sessions keyed by identifier.
    sessions: Mutex<BTreeMap<SessionId, SessionEntry>>,
    /// Generator for new session identifiers.
    ids: SessionIdGenerator,
    /// Idle duration at which a session is considered expired.
    idle_timeout: Duration,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn GatewayAuditSink>,
}

impl SessionManager {
    /// Creates a manager with the given idle timeout and audit sink.
    #[must_use]
    pub fn new(idle_timeout: Duration, audit: Arc<dyn GatewayAuditSink>) -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            ids: SessionIdGenerator::new(),
            idle_timeout,
            audit,
        }
    }

    /// Creates a session for `server_id` using the server's factory.
    ///
    /// The factory runs outside the table lock; the entry becomes visible
    /// only after the factory succeeds.
    ///
    /// # Errors
    /// Returns [`SessionError::Factory`] when the factory fails.
    pub async fn create(
        &self,
        server_id: &ServerId,
        factory: &Arc<dyn LocalServerFactory>,
        user_id: Option<String>,
    ) -> Result<(SessionId, Arc<dyn SessionHandler>), SessionError> {
        let seed = SessionSeed {
            session_id: self.ids.issue(),
            user_id,
        };
        let pair = factory.create_session(&seed).await?;
        let handler = Arc::clone(&pair.handler);
        let now = Instant::now();
        let now_ms = timestamp_ms();
        let entry = SessionEntry {
            handler: pair.handler,
            transport: pair.transport,
            server_id: server_id.clone(),
            created_at: now,
            last_accessed: now,
            created_at_ms: now_ms,
            last_accessed_ms: now_ms,
        };
        {
            let mut sessions = self.sessions.lock().await;
            sessions.insert(seed.session_id.clone(), entry);
        }
        self.audit.record_session(&SessionAuditEvent::created(
            seed.session_id.clone(),
            server_id.to_string(),
        ));
        Ok((seed.session_id, handler))
    }

    /// Looks up a live session bound to `server_id` and refreshes its access
    /// time.
    ///
    /// A session created through one server is invisible through another;
    /// the mismatch reports the same [`SessionError::NotFound`] as an
    /// unknown identifier.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] when no live session matches.
    pub async fn lookup(
        &self,
        server_id: &ServerId,
        session_id: &SessionId,
    ) -> Result<Arc<dyn SessionHandler>, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(session_id) else {
            return Err(SessionError::NotFound);
        };
        if entry.server_id != *server_id {
            return Err(SessionError::NotFound);
        }
        entry.last_accessed = Instant::now();
        entry.last_accessed_ms = timestamp_ms();
        Ok(Arc::clone(&entry.handler))
    }

    /// Removes and closes every session idle for at least the configured
    /// timeout. Returns the number of sessions reaped.
    ///
    /// A session exactly at the threshold is expired. Closes run after the
    /// table lock is released so a slow close cannot stall lookups.
    pub async fn reap_idle(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(SessionId, SessionEntry)> = {
            let mut sessions = self.sessions.lock().await;
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, entry)| {
                    now.saturating_duration_since(entry.last_accessed) >= self.idle_timeout
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };
        let count = expired.len();
        for (session_id, entry) in expired {
            let idle_ms = now.saturating_duration_since(entry.last_accessed).as_millis();
            self.close_entry(&session_id, &entry).await;
            self.audit.record_session(&SessionAuditEvent::reaped(
                session_id,
                entry.server_id.to_string(),
                idle_ms,
            ));
        }
        count
    }

    /// Removes and closes every live session. Returns the number closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(SessionId, SessionEntry)> = {
            let mut sessions = self.sessions.lock().await;
            std::mem::take(&mut *sessions).into_iter().collect()
        };
        let count = drained.len();
        for (session_id, entry) in drained {
            self.close_entry(&session_id, &entry).await;
        }
        count
    }

    /// Returns the number of live sessions across all servers.
    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns the number of live sessions bound to `server_id`.
    pub async fn count_for(&self, server_id: &ServerId) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.values().filter(|entry| entry.server_id == *server_id).count()
    }

    /// Returns per-session age and idle observations for every live session.
    pub async fn stats_snapshot(&self) -> Vec<SessionStats> {
        let now = Instant::now();
        let sessions = self.sessions.lock().await;
        sessions
            .iter()
            .map(|(id, entry)| SessionStats {
                id: id.clone(),
                server_id: entry.server_id.clone(),
                created_at_ms: entry.created_at_ms,
                last_accessed_ms: entry.last_accessed_ms,
                age_ms: now.saturating_duration_since(entry.created_at).as_millis(),
                idle_ms: now.saturating_duration_since(entry.last_accessed).as_millis(),
            })
            .collect()
    }

    /// Closes both halves of an entry, recording failures to the audit sink.
    async fn close_entry(&self, session_id: &SessionId, entry: &SessionEntry) {
        if let Err(err) = entry.handler.close().await {
            self.audit.record_session(&SessionAuditEvent::close_failed(
                session_id.clone(),
                entry.server_id.to_string(),
                format!("handler: {err}"),
            ));
        }
        if let Err(err) = entry.transport.close().await {
            self.audit.record_session(&SessionAuditEvent::close_failed(
                session_id.clone(),
                entry.server_id.to_string(),
                format!("transport: {err}"),
            ));
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
