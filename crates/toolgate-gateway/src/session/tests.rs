// crates/toolgate-gateway/src/session/tests.rs
// ============================================================================
// Module: Session Lifecycle Tests
// Description: Unit tests for lazy creation, touch refresh, and idle reaping.
// Purpose: Validate the session table's expiry and close discipline.
// Dependencies: toolgate-gateway, tokio
// ============================================================================

//! ## Overview
//! Validates session creation, cross-server invisibility, exact-threshold
//! expiry, touch refresh, and the best-effort close discipline for removed
//! entries.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::Value;
use serde_json::json;
use toolgate_core::JsonRpcRequest;
use toolgate_core::JsonRpcResponse;
use toolgate_core::ServerId;
use toolgate_core::SessionId;

use super::LocalServerFactory;
use super::RequestScope;
use super::SessionError;
use super::SessionHandler;
use super::SessionManager;
use super::SessionPair;
use super::SessionSeed;
use super::SessionTransport;
use crate::audit::GatewayAuditSink;
use crate::audit::SessionAuditEvent;
use crate::audit::ToolCallAuditEvent;

// ============================================================================
// SECTION: Test Doubles
// ============================================================================

/// Audit sink that records session event labels in order.
#[derive(Default)]
struct RecordingSink {
    /// Event labels recorded so far.
    events: StdMutex<Vec<String>>,
}

impl RecordingSink {
    /// Returns the recorded event labels.
    fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl GatewayAuditSink for RecordingSink {
    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        self.events.lock().unwrap().push(event.event.to_string());
    }

    fn record_session(&self, event: &SessionAuditEvent) {
        self.events.lock().unwrap().push(event.event.to_string());
    }
}

/// Handler that answers every request with a fixed result.
struct StubHandler {
    /// Number of times `close` was invoked.
    close_calls: Arc<AtomicUsize>,
    /// Whether `close` should fail.
    fail_close: bool,
}

#[async_trait]
impl SessionHandler for StubHandler {
    async fn handle(
        &self,
        _scope: &RequestScope,
        request: JsonRpcRequest,
    ) -> (StatusCode, JsonRpcResponse) {
        (StatusCode::OK, JsonRpcResponse::result(request.id, json!("pong")))
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(SessionError::Closed("handler refused to close".to_string()));
        }
        Ok(())
    }
}

/// Transport that counts close invocations.
struct StubTransport {
    /// Number of times `close` was invoked.
    close_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionTransport for StubTransport {
    async fn close(&self) -> Result<(), SessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory producing stub sessions with shared close counters.
struct StubFactory {
    /// Handler close counter shared across produced sessions.
    handler_closes: Arc<AtomicUsize>,
    /// Transport close counter shared across produced sessions.
    transport_closes: Arc<AtomicUsize>,
    /// Whether produced handlers fail to close.
    fail_close: bool,
    /// Whether session creation itself fails.
    fail_create: bool,
}

impl StubFactory {
    /// Builds a well-behaved factory.
    fn new() -> Self {
        Self {
            handler_closes: Arc::new(AtomicUsize::new(0)),
            transport_closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
            fail_create: false,
        }
    }
}

#[async_trait]
impl LocalServerFactory for StubFactory {
    async fn create_session(&self, _seed: &SessionSeed) -> Result<SessionPair, SessionError> {
        if self.fail_create {
            return Err(SessionError::Factory("backend offline".to_string()));
        }
        Ok(SessionPair {
            handler: Arc::new(StubHandler {
                close_calls: Arc::clone(&self.handler_closes),
                fail_close: self.fail_close,
            }),
            transport: Arc::new(StubTransport {
                close_calls: Arc::clone(&self.transport_closes),
            }),
        })
    }
}

/// Builds a manager plus factory with the given idle timeout.
fn manager_with(
    idle_timeout: Duration,
) -> (SessionManager, Arc<dyn LocalServerFactory>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let manager = SessionManager::new(idle_timeout, sink.clone());
    let factory: Arc<dyn LocalServerFactory> = Arc::new(StubFactory::new());
    (manager, factory, sink)
}

// ============================================================================
// SECTION: Creation And Lookup Tests
// ============================================================================

#[tokio::test]
async fn create_issues_unique_ids_and_audits() {
    let (manager, factory, sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    let (first, _) = manager.create(&server, &factory, None).await.expect("first session");
    let (second, _) = manager.create(&server, &factory, None).await.expect("second session");
    assert_ne!(first, second);
    assert_eq!(manager.active_count().await, 2);
    assert_eq!(sink.labels(), vec!["session_created", "session_created"]);
}

#[tokio::test]
async fn lookup_returns_live_handler() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    let (id, _) = manager.create(&server, &factory, None).await.expect("create");
    let handler = manager.lookup(&server, &id).await.expect("lookup");
    let request = JsonRpcRequest::new(json!(1), "ping", None);
    let (status, response) = handler.handle(&RequestScope::default(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.result, Some(json!("pong")));
}

#[tokio::test]
async fn repeated_lookups_share_one_handler() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    let (id, created) = manager.create(&server, &factory, None).await.expect("create");
    let first = manager.lookup(&server, &id).await.expect("first lookup");
    let second = manager.lookup(&server, &id).await.expect("second lookup");
    assert!(Arc::ptr_eq(&created, &first));
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn lookup_unknown_id_is_not_found() {
    let (manager, _factory, _sink) = manager_with(Duration::from_secs(3600));
    let err = manager
        .lookup(&ServerId::new("core"), &SessionId::new("sess-unknown"))
        .await
        .expect_err("unknown session");
    assert_eq!(err.to_string(), "Session not found");
}

#[tokio::test]
async fn session_is_invisible_through_other_servers() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let (id, _) = manager.create(&ServerId::new("core"), &factory, None).await.expect("create");
    let err = manager
        .lookup(&ServerId::new("billing"), &id)
        .await
        .expect_err("cross-server lookup must fail");
    assert!(matches!(err, SessionError::NotFound));
}

#[tokio::test]
async fn factory_failure_leaves_table_untouched() {
    let sink = Arc::new(RecordingSink::default());
    let manager = SessionManager::new(Duration::from_secs(3600), sink.clone());
    let factory: Arc<dyn LocalServerFactory> = Arc::new(StubFactory {
        handler_closes: Arc::new(AtomicUsize::new(0)),
        transport_closes: Arc::new(AtomicUsize::new(0)),
        fail_close: false,
        fail_create: true,
    });
    let err = manager
        .create(&ServerId::new("core"), &factory, None)
        .await
        .expect_err("factory failure");
    assert_eq!(err.to_string(), "session factory error: backend offline");
    assert_eq!(manager.active_count().await, 0);
    assert!(sink.labels().is_empty());
}

// ============================================================================
// SECTION: Reaping Tests
// ============================================================================

#[tokio::test]
async fn zero_timeout_expires_sessions_at_threshold() {
    let (manager, factory, sink) = manager_with(Duration::ZERO);
    let server = ServerId::new("core");
    let (id, _) = manager.create(&server, &factory, None).await.expect("create");
    assert_eq!(manager.reap_idle().await, 1);
    let err = manager.lookup(&server, &id).await.expect_err("reaped session stays gone");
    assert!(matches!(err, SessionError::NotFound));
    assert_eq!(sink.labels(), vec!["session_created", "session_reaped"]);
}

#[tokio::test]
async fn reap_skips_sessions_inside_idle_window() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    let (id, _) = manager.create(&server, &factory, None).await.expect("create");
    assert_eq!(manager.reap_idle().await, 0);
    assert!(manager.lookup(&server, &id).await.is_ok());
}

#[tokio::test]
async fn touch_resets_the_idle_clock() {
    let (manager, factory, _sink) = manager_with(Duration::from_millis(80));
    let server = ServerId::new("core");
    let (id, _) = manager.create(&server, &factory, None).await.expect("create");
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.lookup(&server, &id).await.expect("touch refreshes access time");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.reap_idle().await, 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.reap_idle().await, 1);
}

#[tokio::test]
async fn reap_closes_handler_and_transport() {
    let sink = Arc::new(RecordingSink::default());
    let manager = SessionManager::new(Duration::ZERO, sink.clone());
    let stub = StubFactory::new();
    let handler_closes = Arc::clone(&stub.handler_closes);
    let transport_closes = Arc::clone(&stub.transport_closes);
    let factory: Arc<dyn LocalServerFactory> = Arc::new(stub);
    manager.create(&ServerId::new("core"), &factory, None).await.expect("create");
    assert_eq!(manager.reap_idle().await, 1);
    assert_eq!(handler_closes.load(Ordering::SeqCst), 1);
    assert_eq!(transport_closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn close_failure_is_audited_and_still_reaps() {
    let sink = Arc::new(RecordingSink::default());
    let manager = SessionManager::new(Duration::ZERO, sink.clone());
    let stub = StubFactory {
        handler_closes: Arc::new(AtomicUsize::new(0)),
        transport_closes: Arc::new(AtomicUsize::new(0)),
        fail_close: true,
        fail_create: false,
    };
    let transport_closes = Arc::clone(&stub.transport_closes);
    let factory: Arc<dyn LocalServerFactory> = Arc::new(stub);
    manager.create(&ServerId::new("core"), &factory, None).await.expect("create");
    assert_eq!(manager.reap_idle().await, 1);
    // Transport close still runs after the handler close fails.
    assert_eq!(transport_closes.load(Ordering::SeqCst), 1);
    let labels = sink.labels();
    assert!(labels.contains(&"session_close_failed".to_string()));
    assert!(labels.contains(&"session_reaped".to_string()));
}

// ============================================================================
// SECTION: Shutdown And Count Tests
// ============================================================================

#[tokio::test]
async fn close_all_drains_every_session() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    manager.create(&server, &factory, None).await.expect("first");
    manager.create(&server, &factory, None).await.expect("second");
    assert_eq!(manager.close_all().await, 2);
    assert_eq!(manager.active_count().await, 0);
}

#[tokio::test]
async fn count_for_filters_by_server() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    manager.create(&ServerId::new("core"), &factory, None).await.expect("core session");
    manager.create(&ServerId::new("core"), &factory, None).await.expect("core session");
    manager.create(&ServerId::new("notes"), &factory, None).await.expect("notes session");
    assert_eq!(manager.count_for(&ServerId::new("core")).await, 2);
    assert_eq!(manager.count_for(&ServerId::new("notes")).await, 1);
    assert_eq!(manager.count_for(&ServerId::new("billing")).await, 0);
}

#[tokio::test]
async fn stats_snapshot_tracks_age_and_idle_separately() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    let (id, _) = manager.create(&server, &factory, None).await.expect("create");
    tokio::time::sleep(Duration::from_millis(30)).await;
    manager.lookup(&server, &id).await.expect("touch");

    let stats = manager.stats_snapshot().await;
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].id, id);
    assert_eq!(stats[0].server_id, server);
    // Age keeps growing after a touch; only the idle clock resets.
    assert!(stats[0].age_ms >= 30);
    assert!(stats[0].idle_ms < stats[0].age_ms);
    assert!(stats[0].created_at_ms > 0);
    assert!(stats[0].last_accessed_ms >= stats[0].created_at_ms);
}

#[tokio::test]
async fn create_threads_user_hint_into_seed() {
    /// Factory that captures the seed it was handed.
    struct CapturingFactory {
        /// Seed observed during creation.
        seen: StdMutex<Option<SessionSeed>>,
    }

    #[async_trait]
    impl LocalServerFactory for CapturingFactory {
        async fn create_session(&self, seed: &SessionSeed) -> Result<SessionPair, SessionError> {
            *self.seen.lock().unwrap() = Some(seed.clone());
            Ok(SessionPair {
                handler: Arc::new(StubHandler {
                    close_calls: Arc::new(AtomicUsize::new(0)),
                    fail_close: false,
                }),
                transport: Arc::new(StubTransport {
                    close_calls: Arc::new(AtomicUsize::new(0)),
                }),
            })
        }
    }

    let sink = Arc::new(RecordingSink::default());
    let manager = SessionManager::new(Duration::from_secs(3600), sink.clone());
    let capturing = Arc::new(CapturingFactory {
        seen: StdMutex::new(None),
    });
    let factory: Arc<dyn LocalServerFactory> = capturing.clone();
    let (id, _) = manager
        .create(&ServerId::new("core"), &factory, Some("alice".to_string()))
        .await
        .expect("create");
    let seed = capturing.seen.lock().unwrap().clone().expect("seed captured");
    assert_eq!(seed.session_id, id);
    assert_eq!(seed.user_id.as_deref(), Some("alice"));
}

#[tokio::test]
async fn handler_echoes_request_id() {
    let (manager, factory, _sink) = manager_with(Duration::from_secs(3600));
    let server = ServerId::new("core");
    let (id, handler) = manager.create(&server, &factory, None).await.expect("create");
    assert!(!id.is_empty());
    let request = JsonRpcRequest::new(Value::String("req-9".to_string()), "ping", None);
    let (_, response) = handler.handle(&RequestScope::default(), request).await;
    assert_eq!(response.id, json!("req-9"));
}
