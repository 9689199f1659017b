// crates/toolgate-core/src/collab.rs
// ============================================================================
// Module: Collaborator Interfaces
// Description: Identity, catalog, and executor traits consumed by the gateway.
// Purpose: Define the narrow seams to externally owned subsystems.
// Dependencies: async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The gateway never mints identities, stores catalogs, or runs tools itself;
//! it consumes those capabilities through the traits defined here. Production
//! wiring supplies implementations backed by the real auth and execution
//! systems. The in-memory implementations in this module exist for wiring
//! defaults and tests and deliberately resolve nothing by fallback: a missing
//! identity is an error, never a synthesized user.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::catalog::ToolDescriptor;
use crate::identifiers::CorrelationId;
use crate::identifiers::SessionId;
use crate::identifiers::ToolName;
use crate::identity::PermissionContext;

// ============================================================================
// SECTION: Request Identity
// ============================================================================

/// Caller identity hints captured at the transport boundary.
///
/// # Invariants
/// - `session_id` is required for invocation paths; listing paths treat a
///   missing [`CallerIdentity`] as an empty-catalog signal instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Session the request arrived on.
    pub session_id: SessionId,
    /// Optional user hint forwarded from the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl CallerIdentity {
    /// Creates an identity bound to a session with no user hint.
    #[must_use]
    pub const fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id,
            user_id: None,
        }
    }

    /// Attaches a user hint.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Execution context handed to the tool executor for every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionContext {
    /// Resolved user identifier.
    pub user_id: String,
    /// Resolved user email.
    pub user_email: String,
    /// Session the call arrived on.
    pub session_id: SessionId,
    /// Correlation id generated at call start.
    pub request_id: CorrelationId,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identity resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Session id was missing or empty.
    #[error("session id is missing or empty")]
    MissingSession,
    /// No identity is known for the supplied hints.
    #[error("identity not recognized: {0}")]
    UnknownIdentity(String),
    /// The backing identity system failed.
    #[error("identity resolution failed: {0}")]
    Resolution(String),
}

/// Tool catalog failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// A tool with the same name is already registered.
    #[error("tool already registered: {0}")]
    Duplicate(ToolName),
    /// The backing catalog could not be consulted.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Tool execution failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The tool ran and reported a failure.
    #[error("tool execution failed: {0}")]
    Failed(String),
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Resolves a permission context for the identity behind a request.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolves the caller's permission context.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::MissingSession`] for an empty session id and
    /// [`IdentityError::UnknownIdentity`] when no identity matches the hints.
    async fn resolve(
        &self,
        session_id: &SessionId,
        user_id: Option<&str>,
    ) -> Result<PermissionContext, IdentityError>;
}

/// Supplies the enabled tool catalog.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Lists every enabled tool, ungated.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] when the catalog cannot be read.
    async fn list_enabled(&self) -> Result<Vec<ToolDescriptor>, CatalogError>;

    /// Fetches a single tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unavailable`] when the catalog cannot be read.
    async fn get(&self, name: &ToolName) -> Result<Option<ToolDescriptor>, CatalogError>;
}

/// Executes a named tool on behalf of a resolved user.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs the tool and returns its raw JSON result.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Failed`] when the tool reports a failure.
    async fn execute(
        &self,
        name: &ToolName,
        arguments: Value,
        context: &ToolExecutionContext,
    ) -> Result<Value, ExecutorError>;
}

// ============================================================================
// SECTION: In-Memory Implementations
// ============================================================================

/// Identity resolver backed by a fixed user table.
///
/// # Invariants
/// - Resolution requires a non-empty session id and a known user hint; there
///   is no fallback identity.
#[derive(Debug, Default)]
pub struct StaticIdentityResolver {
    /// Known identities keyed by user id.
    identities: BTreeMap<String, PermissionContext>,
}

impl StaticIdentityResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identity keyed by its user id.
    #[must_use]
    pub fn with_identity(mut self, context: PermissionContext) -> Self {
        self.identities.insert(context.user_id.clone(), context);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(
        &self,
        session_id: &SessionId,
        user_id: Option<&str>,
    ) -> Result<PermissionContext, IdentityError> {
        if session_id.is_empty() {
            return Err(IdentityError::MissingSession);
        }
        let user = user_id
            .ok_or_else(|| IdentityError::UnknownIdentity("no user hint supplied".to_string()))?;
        self.identities
            .get(user)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownIdentity(user.to_string()))
    }
}

/// Tool catalog backed by an in-memory map.
#[derive(Debug, Default)]
pub struct InMemoryToolCatalog {
    /// Registered descriptors keyed by tool name.
    tools: BTreeMap<ToolName, ToolDescriptor>,
}

impl InMemoryToolCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Duplicate`] when the name is already taken.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), CatalogError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(CatalogError::Duplicate(descriptor.name));
        }
        self.tools.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    /// Builds a catalog from descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Duplicate`] when two descriptors share a name.
    pub fn from_tools(
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog.register(descriptor)?;
        }
        Ok(catalog)
    }
}

#[async_trait]
impl ToolCatalog for InMemoryToolCatalog {
    async fn list_enabled(&self) -> Result<Vec<ToolDescriptor>, CatalogError> {
        Ok(self.tools.values().cloned().collect())
    }

    async fn get(&self, name: &ToolName) -> Result<Option<ToolDescriptor>, CatalogError> {
        Ok(self.tools.get(name).cloned())
    }
}

/// Executor that echoes the call back as its result.
///
/// Useful for wiring demos and tests that only care about dispatch behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoToolExecutor;

#[async_trait]
impl ToolExecutor for EchoToolExecutor {
    async fn execute(
        &self,
        name: &ToolName,
        arguments: Value,
        context: &ToolExecutionContext,
    ) -> Result<Value, ExecutorError> {
        Ok(json!({
            "tool": name,
            "arguments": arguments,
            "user_id": context.user_id,
        }))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
