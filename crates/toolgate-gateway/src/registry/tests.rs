// crates/toolgate-gateway/src/registry/tests.rs
// ============================================================================
// Module: Server Registry Tests
// Description: Unit tests for registration, lookup, and status assembly.
// Purpose: Validate duplicate rejection and backend classification.
// Dependencies: toolgate-gateway, tokio
// ============================================================================

//! ## Overview
//! Validates duplicate registration rejection, remote target construction
//! from configuration, status snapshot assembly, and shutdown auditing.

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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use toolgate_config::RemoteAuthConfig;
use toolgate_config::RemoteServerConfig;
use toolgate_core::ServerId;

use super::RegisteredServer;
use super::RegistryError;
use super::RemoteAuth;
use super::ServerBackend;
use super::ServerKind;
use super::ServerRegistry;
use crate::audit::GatewayAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::ServerAuditEvent;
use crate::audit::ToolCallAuditEvent;
use crate::session::LocalServerFactory;
use crate::session::SessionError;
use crate::session::SessionManager;
use crate::session::SessionPair;
use crate::session::SessionSeed;

// ============================================================================
// SECTION: Test Doubles
// ============================================================================

/// Factory stub with a fixed self-reported session count.
struct CountingFactory {
    /// Count reported through `active_session_count`.
    count: Option<usize>,
    /// Whether shutdown should fail.
    fail_shutdown: bool,
}

#[async_trait]
impl LocalServerFactory for CountingFactory {
    async fn create_session(&self, _seed: &SessionSeed) -> Result<SessionPair, SessionError> {
        Err(SessionError::Factory("not used in registry tests".to_string()))
    }

    fn active_session_count(&self) -> Option<usize> {
        self.count
    }

    async fn shutdown(&self) -> Result<(), SessionError> {
        if self.fail_shutdown {
            return Err(SessionError::Closed("factory stuck".to_string()));
        }
        Ok(())
    }
}

/// Audit sink capturing server event labels.
#[derive(Default)]
struct ServerEventSink {
    /// Event labels recorded so far.
    events: StdMutex<Vec<String>>,
}

impl GatewayAuditSink for ServerEventSink {
    fn record_tool_call(&self, event: &ToolCallAuditEvent) {
        self.events.lock().unwrap().push(event.event.to_string());
    }

    fn record_server(&self, event: &ServerAuditEvent) {
        self.events.lock().unwrap().push(event.event.to_string());
    }
}

/// Builds a local server record with a counting factory.
fn local_server(id: &str, count: Option<usize>) -> RegisteredServer {
    RegisteredServer::local(
        ServerId::new(id),
        format!("{id} server"),
        "1.0.0",
        None,
        Arc::new(CountingFactory {
            count,
            fail_shutdown: false,
        }),
    )
}

/// Builds a remote server configuration pointing at the given URL.
fn remote_config(id: &str, url: &str) -> RemoteServerConfig {
    RemoteServerConfig {
        id: id.to_string(),
        name: format!("{id} upstream"),
        version: "2.1.0".to_string(),
        description: Some("remote backend".to_string()),
        url: url.to_string(),
        headers: BTreeMap::new(),
        auth: None,
        timeout_ms: Some(250),
        allow_insecure_http: false,
    }
}

// ============================================================================
// SECTION: Registration Tests
// ============================================================================

#[test]
fn register_rejects_duplicate_ids() {
    let registry = ServerRegistry::new();
    registry.register(local_server("core", None)).expect("first registration");
    let err = registry.register(local_server("core", None)).expect_err("duplicate id");
    assert_eq!(err.to_string(), "server already registered: core");
    assert_eq!(registry.len(), 1);
}

#[test]
fn get_returns_registered_server() {
    let registry = ServerRegistry::new();
    registry.register(local_server("core", None)).expect("register");
    let server = registry.get(&ServerId::new("core")).expect("lookup");
    assert_eq!(server.name, "core server");
    assert_eq!(server.kind(), ServerKind::Local);
    assert!(registry.get(&ServerId::new("missing")).is_none());
}

#[test]
fn empty_registry_reports_empty() {
    let registry = ServerRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}

// ============================================================================
// SECTION: Remote Target Tests
// ============================================================================

#[test]
fn remote_config_builds_target() {
    let config = remote_config("billing", "https://billing.internal/mcp");
    let server = RegisteredServer::from_remote_config(&config).expect("valid remote");
    assert_eq!(server.id, ServerId::new("billing"));
    assert_eq!(server.kind(), ServerKind::Remote);
    let ServerBackend::Remote(target) = &server.backend else {
        panic!("expected remote backend");
    };
    assert_eq!(target.url.as_str(), "https://billing.internal/mcp");
    assert_eq!(target.timeout, Some(Duration::from_millis(250)));
    assert!(target.auth.is_none());
}

#[test]
fn remote_config_carries_auth() {
    let mut config = remote_config("billing", "https://billing.internal/mcp");
    config.auth = Some(RemoteAuthConfig::Bearer {
        token: "secret-token".to_string(),
    });
    let server = RegisteredServer::from_remote_config(&config).expect("valid remote");
    let ServerBackend::Remote(target) = &server.backend else {
        panic!("expected remote backend");
    };
    match target.auth.as_ref().expect("auth configured") {
        RemoteAuth::Bearer {
            token,
        } => assert_eq!(token, "secret-token"),
        RemoteAuth::Basic {
            ..
        } => panic!("expected bearer auth"),
    }
}

#[test]
fn remote_config_with_unparseable_url_fails() {
    let config = remote_config("billing", "not a url");
    let err = RegisteredServer::from_remote_config(&config).expect_err("invalid url");
    assert!(matches!(err, RegistryError::InvalidTarget(_)));
    assert!(err.to_string().contains("not a valid url"));
}

// ============================================================================
// SECTION: Status And Shutdown Tests
// ============================================================================

#[tokio::test]
async fn status_snapshot_merges_factory_and_table_counts() {
    let registry = ServerRegistry::new();
    registry.register(local_server("alpha", Some(3))).expect("alpha");
    registry.register(local_server("beta", None)).expect("beta");
    let remote =
        RegisteredServer::from_remote_config(&remote_config("gamma", "https://gamma.internal/mcp"))
            .expect("gamma");
    registry.register(remote).expect("register gamma");

    let sessions = SessionManager::new(Duration::from_secs(3600), Arc::new(NoopAuditSink));
    let snapshot = registry.status_snapshot(&sessions).await;
    assert_eq!(snapshot.servers.len(), 3);

    let alpha = &snapshot.servers[&ServerId::new("alpha")];
    assert_eq!(alpha.sessions, 3);
    assert_eq!(alpha.status, "running");
    assert_eq!(alpha.transport, "http");
    assert_eq!(alpha.url, None);

    let beta = &snapshot.servers[&ServerId::new("beta")];
    assert_eq!(beta.sessions, 0);

    let gamma = &snapshot.servers[&ServerId::new("gamma")];
    assert_eq!(gamma.kind, ServerKind::Remote);
    assert_eq!(gamma.sessions, 0);
    assert_eq!(gamma.url.as_deref(), Some("https://gamma.internal/mcp"));
}

#[tokio::test]
async fn status_snapshot_serializes_kind_under_type_key() {
    let registry = ServerRegistry::new();
    registry.register(local_server("core", Some(1))).expect("core");

    let sessions = SessionManager::new(Duration::from_secs(3600), Arc::new(NoopAuditSink));
    let snapshot = registry.status_snapshot(&sessions).await;
    let value = serde_json::to_value(&snapshot).expect("serialize snapshot");
    assert_eq!(value["servers"]["core"]["type"], "local");
    assert_eq!(value["servers"]["core"]["status"], "running");
    assert_eq!(value["servers"]["core"]["sessions"], 1);
    assert!(value["servers"]["core"].get("url").is_none());
}

#[tokio::test]
async fn shutdown_all_audits_stuck_factories_and_clears_the_table() {
    let registry = ServerRegistry::new();
    registry.register(local_server("calm", None)).expect("calm");
    registry
        .register(RegisteredServer::local(
            ServerId::new("stuck"),
            "stuck server",
            "1.0.0",
            None,
            Arc::new(CountingFactory {
                count: None,
                fail_shutdown: true,
            }),
        ))
        .expect("stuck");

    let sink = ServerEventSink::default();
    registry.shutdown_all(&sink).await;
    let labels = sink.events.lock().unwrap().clone();
    assert_eq!(labels, vec!["server_shutdown_failed"]);
    assert!(registry.is_empty());
}
