// crates/toolgate-gateway/src/registry.rs
// ============================================================================
// Module: Server Registry
// Description: Registration and lookup for local and remote protocol servers.
// Purpose: Own the closed set of servers the gateway routes to.
// Dependencies: toolgate-core, toolgate-config, serde, url
// ============================================================================

//! ## Overview
//! The registry maps server identifiers to backends. A local server is backed
//! by a [`LocalServerFactory`] that mints in-process sessions; a remote server
//! is a URL plus forwarding policy (extra headers, upstream credentials, and
//! an optional per-server timeout). Duplicate identifiers are rejected at
//! registration so routing stays unambiguous. The table sits behind a reader
//! lock: lookups on the request path are cheap clones, while registration and
//! shutdown are the only writers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;
use toolgate_config::RemoteAuthConfig;
use toolgate_config::RemoteServerConfig;
use toolgate_core::ServerId;
use url::Url;

use crate::audit::GatewayAuditSink;
use crate::audit::ServerAuditEvent;
use crate::session::LocalServerFactory;
use crate::session::SessionManager;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Status label reported for every registered server.
const STATUS_RUNNING: &str = "running";

/// Transport label reported for every registered server.
const TRANSPORT_HTTP: &str = "http";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server registration error.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A server with the same identifier is already registered.
    #[error("server already registered: {0}")]
    DuplicateServer(ServerId),
    /// A remote target could not be built from its configuration.
    #[error("invalid remote target: {0}")]
    InvalidTarget(String),
}

// ============================================================================
// SECTION: Server Records
// ============================================================================

/// Backend classification for a registered server.
///
/// # Invariants
/// - Variants are stable for status reporting and audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    /// Sessions are hosted in-process by a factory.
    Local,
    /// Requests are forwarded to a configured URL.
    Remote,
}

impl ServerKind {
    /// Returns a stable label for the backend kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Upstream credentials attached to forwarded requests.
#[derive(Clone)]
pub enum RemoteAuth {
    /// `Authorization: Bearer <token>`.
    Bearer {
        /// Token forwarded verbatim.
        token: String,
    },
    /// `Authorization: Basic <base64(username:password)>`.
    Basic {
        /// Username half of the credential pair.
        username: String,
        /// Password half of the credential pair.
        password: String,
    },
}

impl RemoteAuth {
    /// Builds upstream credentials from validated configuration.
    #[must_use]
    pub fn from_config(config: &RemoteAuthConfig) -> Self {
        match config {
            RemoteAuthConfig::Bearer {
                token,
            } => Self::Bearer {
                token: token.clone(),
            },
            RemoteAuthConfig::Basic {
                username,
                password,
            } => Self::Basic {
                username: username.clone(),
                password: password.clone(),
            },
        }
    }
}

/// Forwarding policy for one remote server.
///
/// # Invariants
/// - `url` carries an `http` or `https` scheme; configuration validation
///   enforces the scheme before a target is built.
#[derive(Clone)]
pub struct RemoteTarget {
    /// Upstream endpoint requests are forwarded to.
    pub url: Url,
    /// Extra headers attached to every forwarded request.
    pub headers: BTreeMap<String, String>,
    /// Upstream credentials, when configured.
    pub auth: Option<RemoteAuth>,
    /// Per-server timeout overriding the proxy default, when configured.
    pub timeout: Option<Duration>,
}

/// Backend behind a registered server.
#[derive(Clone)]
pub enum ServerBackend {
    /// In-process sessions minted by a factory.
    Local(Arc<dyn LocalServerFactory>),
    /// Requests forwarded to a remote target.
    Remote(RemoteTarget),
}

/// One registered server and its routing metadata.
#[derive(Clone)]
pub struct RegisteredServer {
    /// Identifier used in request paths.
    pub id: ServerId,
    /// Human-readable server name.
    pub name: String,
    /// Server version string.
    pub version: String,
    /// Optional server description.
    pub description: Option<String>,
    /// Backend requests are routed to.
    pub backend: ServerBackend,
}

impl std::fmt::Debug for RegisteredServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredServer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("description", &self.description)
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

impl RegisteredServer {
    /// Builds a locally hosted server record.
    #[must_use]
    pub fn local(
        id: ServerId,
        name: impl Into<String>,
        version: impl Into<String>,
        description: Option<String>,
        factory: Arc<dyn LocalServerFactory>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            description,
            backend: ServerBackend::Local(factory),
        }
    }

    /// Builds a remote server record from validated configuration.
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidTarget`] when the configured URL does
    /// not parse.
    pub fn from_remote_config(config: &RemoteServerConfig) -> Result<Self, RegistryError> {
        let url = Url::parse(&config.url).map_err(|err| {
            RegistryError::InvalidTarget(format!("remote url is not a valid url: {err}"))
        })?;
        let target = RemoteTarget {
            url,
            headers: config.headers.clone(),
            auth: config.auth.as_ref().map(RemoteAuth::from_config),
            timeout: config.timeout_ms.map(Duration::from_millis),
        };
        Ok(Self {
            id: ServerId::new(config.id.clone()),
            name: config.name.clone(),
            version: config.version.clone(),
            description: config.description.clone(),
            backend: ServerBackend::Remote(target),
        })
    }

    /// Returns the backend classification for this server.
    #[must_use]
    pub const fn kind(&self) -> ServerKind {
        match self.backend {
            ServerBackend::Local(_) => ServerKind::Local,
            ServerBackend::Remote(_) => ServerKind::Remote,
        }
    }

    /// Returns the upstream URL for remote servers.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        match &self.backend {
            ServerBackend::Local(_) => None,
            ServerBackend::Remote(target) => Some(target.url.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Closed set of servers the gateway routes to.
///
/// # Invariants
/// - Identifiers are unique; duplicate registration fails and leaves the
///   table unchanged.
/// - Lookups and registration may race; the table lock serializes writers
///   while readers proceed concurrently.
#[derive(Default)]
pub struct ServerRegistry {
    /// Registered servers keyed by identifier.
    servers: RwLock<BTreeMap<ServerId, RegisteredServer>>,
}

impl ServerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a server under its identifier.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateServer`] when the identifier is
    /// already taken.
    pub fn register(&self, server: RegisteredServer) -> Result<(), RegistryError> {
        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        if servers.contains_key(&server.id) {
            return Err(RegistryError::DuplicateServer(server.id));
        }
        servers.insert(server.id.clone(), server);
        Ok(())
    }

    /// Returns the server registered under `id`, if any.
    #[must_use]
    pub fn get(&self, id: &ServerId) -> Option<RegisteredServer> {
        self.servers.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    /// Returns the number of registered servers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.servers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when no servers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.read().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// Builds the status payload for every registered server.
    ///
    /// Local session counts come from the factory when it tracks them, or
    /// from the session table otherwise. Remote servers manage their own
    /// sessions, so their count is reported as zero.
    pub async fn status_snapshot(&self, sessions: &SessionManager) -> StatusSnapshot {
        let snapshot: Vec<RegisteredServer> = {
            let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
            servers.values().cloned().collect()
        };
        let mut entries = BTreeMap::new();
        for server in snapshot {
            let session_count = match &server.backend {
                ServerBackend::Local(factory) => match factory.active_session_count() {
                    Some(count) => count,
                    None => sessions.count_for(&server.id).await,
                },
                ServerBackend::Remote(_) => 0,
            };
            entries.insert(
                server.id.clone(),
                ServerStatus {
                    id: server.id.clone(),
                    name: server.name.clone(),
                    status: STATUS_RUNNING,
                    version: server.version.clone(),
                    kind: server.kind(),
                    transport: TRANSPORT_HTTP,
                    sessions: session_count,
                    url: server.url(),
                },
            );
        }
        StatusSnapshot {
            servers: entries,
        }
    }

    /// Shuts down every local factory, then clears the registry.
    ///
    /// Shutdown failures are recorded to the audit sink and do not stop the
    /// remaining factories from being closed. The table is cleared only after
    /// every factory has been given its shutdown call.
    pub async fn shutdown_all(&self, audit: &dyn GatewayAuditSink) {
        let snapshot: Vec<RegisteredServer> = {
            let servers = self.servers.read().unwrap_or_else(PoisonError::into_inner);
            servers.values().cloned().collect()
        };
        for server in snapshot {
            if let ServerBackend::Local(factory) = &server.backend
                && let Err(err) = factory.shutdown().await
            {
                audit.record_server(&ServerAuditEvent::shutdown_failed(
                    server.id.to_string(),
                    server.kind().as_str(),
                    err.to_string(),
                ));
            }
        }
        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        servers.clear();
    }
}

// ============================================================================
// SECTION: Status Payloads
// ============================================================================

/// Status entry for one registered server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    /// Identifier used in request paths.
    pub id: ServerId,
    /// Human-readable server name.
    pub name: String,
    /// Run-state label; always `running` for a registered server.
    pub status: &'static str,
    /// Server version string.
    pub version: String,
    /// Backend classification.
    #[serde(rename = "type")]
    pub kind: ServerKind,
    /// Transport label; the gateway only serves HTTP.
    pub transport: &'static str,
    /// Live sessions attributed to this server; zero for remote servers.
    pub sessions: usize,
    /// Upstream URL for remote servers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Status payload for the registry endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Status entries keyed by server identifier.
    pub servers: BTreeMap<ServerId, ServerStatus>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
