// system-tests/tests/helpers/harness.rs
// ============================================================================
// Module: Gateway Harness
// Description: Spawns a real gateway on an ephemeral loopback port.
// Purpose: Give suites a running gateway plus a handle for clean teardown.
// Dependencies: tokio, toolgate-core, toolgate-config, toolgate-gateway
// ============================================================================

use std::sync::Arc;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use toolgate_config::GatewayConfig;
use toolgate_core::EchoToolExecutor;
use toolgate_core::InMemoryToolCatalog;
use toolgate_core::PermissionContext;
use toolgate_core::Role;
use toolgate_core::StaticIdentityResolver;
use toolgate_core::ToolDescriptor;
use toolgate_core::ToolMetadata;
use toolgate_core::object_schema;
use toolgate_core::string_property;
use toolgate_gateway::CoreServerFactory;
use toolgate_gateway::GatewayCollaborators;
use toolgate_gateway::GatewayError;
use toolgate_gateway::GatewayServer;
use toolgate_gateway::NoopAuditSink;
use toolgate_gateway::NoopMetrics;
use toolgate_gateway::ToolDispatcher;

use super::client::GatewayClient;

/// Caller id the harness identity resolver maps to the admin role.
pub const ADMIN_USER: &str = "admin-1";

/// Caller id the harness identity resolver maps to the basic role.
pub const BASIC_USER: &str = "basic-1";

/// Handle to a gateway serving on an ephemeral loopback port.
pub struct GatewayHandle {
    /// Base URL of the running gateway, without a trailing slash.
    base_url: String,
    /// Server backing the spawned task; kept for explicit shutdown.
    server: Arc<GatewayServer>,
    /// Task driving the accept loop.
    join: JoinHandle<Result<(), GatewayError>>,
}

// Intentionally no Drop impl: teardown is explicit so it stays on the runtime.
impl GatewayHandle {
    /// Returns the base URL of the running gateway.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns a client pointed at the running gateway.
    #[must_use]
    pub fn client(&self) -> GatewayClient {
        GatewayClient::new(self.base_url.clone())
    }

    /// Closes sessions and remote registrations, then stops the accept loop.
    pub async fn shutdown(self) {
        self.server.shutdown().await;
        self.join.abort();
        let _ = self.join.await;
    }
}

/// Spawns a gateway for `config` on an ephemeral loopback port.
///
/// The listener is bound before the server task starts, so the returned base
/// URL is connectable even while startup is still in flight.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the config is rejected.
pub async fn spawn_gateway(config: GatewayConfig) -> Result<GatewayHandle, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("failed to bind loopback listener: {err}"))?;
    let addr =
        listener.local_addr().map_err(|err| format!("failed to read listener address: {err}"))?;
    let server = GatewayServer::from_config(config, collaborators()?)
        .map_err(|err| format!("failed to build gateway: {err}"))?;
    let server = Arc::new(server);
    let join = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.serve_on(listener).await })
    };
    Ok(GatewayHandle {
        base_url: format!("http://{addr}"),
        server,
        join,
    })
}

/// Builds the collaborator set backing the built-in core server.
///
/// The resolver knows two callers: [`ADMIN_USER`] with the admin role and
/// [`BASIC_USER`] with the basic role. The catalog pairs an unrestricted
/// `echo` tool with an admin-gated `purge_cache` tool so suites can probe
/// both sides of the permission boundary.
///
/// # Errors
///
/// Returns an error when the fixture catalog rejects a descriptor.
fn collaborators() -> Result<GatewayCollaborators, String> {
    let resolver = StaticIdentityResolver::new()
        .with_identity(PermissionContext::for_role(ADMIN_USER, "admin@example.com", Role::Admin))
        .with_identity(PermissionContext::for_role(BASIC_USER, "basic@example.com", Role::Basic));
    let catalog = InMemoryToolCatalog::from_tools([
        ToolDescriptor::new(
            "echo",
            "Echoes the provided message back to the caller.",
            object_schema(
                &json!({ "message": string_property("Message to echo back.") }),
                &["message"],
            ),
        ),
        ToolDescriptor::new(
            "purge_cache",
            "Drops every cached entry held by the gateway.",
            object_schema(&json!({}), &[]),
        )
        .with_metadata(ToolMetadata::for_role(Role::Admin)),
    ])
    .map_err(|err| format!("failed to build tool catalog: {err}"))?;
    let dispatcher = ToolDispatcher::new(
        Arc::new(resolver),
        Arc::new(catalog),
        Arc::new(EchoToolExecutor),
        Arc::new(NoopAuditSink),
    );
    Ok(GatewayCollaborators {
        core_factory: Arc::new(CoreServerFactory::new(Arc::new(dispatcher))),
        audit: Arc::new(NoopAuditSink),
        metrics: Arc::new(NoopMetrics),
    })
}
