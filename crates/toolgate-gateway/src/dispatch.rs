// crates/toolgate-gateway/src/dispatch.rs
// ============================================================================
// Module: Tool Dispatch
// Description: Permission-gated tool listing and invocation.
// Purpose: Enforce identity and permission checks in front of tool execution.
// Dependencies: toolgate-core
// ============================================================================

//! ## Overview
//! The dispatcher sits between session handlers and the tool collaborators.
//! Listing and invocation are gated through the same descriptor check, but
//! their missing-identity behavior deliberately differs: a listing without a
//! caller identity returns an empty catalog so clients can probe
//! capabilities, while an invocation without one is a hard error. The
//! permission check runs on every invocation even when a prior listing
//! already filtered the tool out, because listing and calling are independent
//! requests. Every invocation is audited with a correlation identifier issued
//! at call start and the elapsed wall time, whatever the outcome.
//!
//! Security posture: authorization fails closed; the executor is never
//! consulted for unknown or denied tools.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use toolgate_core::CallerIdentity;
use toolgate_core::CorrelationId;
use toolgate_core::IdentityError;
use toolgate_core::IdentityResolver;
use toolgate_core::PermissionContext;
use toolgate_core::Role;
use toolgate_core::ToolCallParams;
use toolgate_core::ToolCallResult;
use toolgate_core::ToolCatalog;
use toolgate_core::ToolDescriptor;
use toolgate_core::ToolExecutionContext;
use toolgate_core::ToolExecutor;
use toolgate_core::ToolName;
use toolgate_core::rpc;

use crate::audit::GatewayAuditSink;
use crate::audit::ToolCallAuditEvent;
use crate::audit::ToolCallAuditEventParams;
use crate::correlation::CorrelationIdGenerator;
use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool dispatch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Invocation arrived without a caller identity.
    #[error("Missing identity: tool calls require a resolved caller")]
    MissingIdentity,
    /// The identity collaborator failed to resolve the caller.
    #[error("{0}")]
    Identity(String),
    /// The named tool is not in the catalog.
    #[error("Unknown tool: {0}")]
    UnknownTool(ToolName),
    /// The caller's role and permissions do not cover the tool.
    #[error("Permission denied: role {role} may not call tool {tool}")]
    PermissionDenied {
        /// Role the caller resolved to.
        role: Role,
        /// Tool the caller asked for.
        tool: ToolName,
    },
    /// The catalog collaborator could not be consulted.
    #[error("{0}")]
    Catalog(String),
    /// The tool ran and reported a failure.
    #[error("{0}")]
    Execution(String),
}

impl DispatchError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "missing_identity",
            Self::Identity(_) => "identity",
            Self::UnknownTool(_) => "unknown_tool",
            Self::PermissionDenied {
                ..
            } => "permission_denied",
            Self::Catalog(_) => "catalog",
            Self::Execution(_) => "execution",
        }
    }

    /// Returns the reserved JSON-RPC code for this failure.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::MissingIdentity
            | Self::Identity(_)
            | Self::PermissionDenied {
                ..
            } => rpc::SESSION_AUTH_ERROR,
            Self::UnknownTool(_) => rpc::METHOD_NOT_FOUND,
            Self::Catalog(_) | Self::Execution(_) => rpc::INTERNAL_ERROR,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Permission gate in front of the tool collaborators.
///
/// # Invariants
/// - The executor runs only after the catalog lookup and permission check
///   both pass.
/// - Every invocation is audited, including failed ones.
pub struct ToolDispatcher {
    /// Identity collaborator resolving callers to permission contexts.
    identity: Arc<dyn IdentityResolver>,
    /// Catalog collaborator supplying tool descriptors.
    catalog: Arc<dyn ToolCatalog>,
    /// Execution collaborator running permitted tools.
    executor: Arc<dyn ToolExecutor>,
    /// Audit sink for invocation records.
    audit: Arc<dyn GatewayAuditSink>,
    /// Generator for per-call correlation identifiers.
    correlations: CorrelationIdGenerator,
}

impl ToolDispatcher {
    /// Wires a dispatcher from its collaborators.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        catalog: Arc<dyn ToolCatalog>,
        executor: Arc<dyn ToolExecutor>,
        audit: Arc<dyn GatewayAuditSink>,
    ) -> Self {
        Self {
            identity,
            catalog,
            executor,
            audit,
            correlations: CorrelationIdGenerator::new(),
        }
    }

    /// Lists the tools visible to the caller.
    ///
    /// Without a caller identity the listing is empty; no default identity is
    /// ever assumed.
    ///
    /// # Errors
    /// Returns [`DispatchError::Identity`] when the identity collaborator
    /// fails and [`DispatchError::Catalog`] when the catalog cannot be read.
    pub async fn list_tools(
        &self,
        caller: Option<&CallerIdentity>,
    ) -> Result<Vec<ToolDescriptor>, DispatchError> {
        let Some(caller) = caller else {
            return Ok(Vec::new());
        };
        let context = self.resolve_context(caller).await?;
        let descriptors = self
            .catalog
            .list_enabled()
            .await
            .map_err(|err| DispatchError::Catalog(err.to_string()))?;
        Ok(descriptors
            .into_iter()
            .filter(|descriptor| descriptor.permitted_for(&context))
            .collect())
    }

    /// Invokes a tool for the caller after identity and permission checks.
    ///
    /// The audit record carries a correlation identifier issued when the call
    /// starts and the elapsed wall time, for success and failure alike.
    ///
    /// # Errors
    /// Returns [`DispatchError::MissingIdentity`] when no caller identity is
    /// supplied, [`DispatchError::UnknownTool`] for names absent from the
    /// catalog, and [`DispatchError::PermissionDenied`] when the caller's
    /// role and permissions do not cover the tool.
    pub async fn call_tool(
        &self,
        caller: Option<&CallerIdentity>,
        params: &ToolCallParams,
        client_correlation_id: Option<CorrelationId>,
    ) -> Result<ToolCallResult, DispatchError> {
        let correlation_id = self.correlations.issue();
        let started = Instant::now();
        let (context, result) = self.invoke(caller, params, &correlation_id).await;
        let (outcome, error_kind) = match &result {
            Ok(_) => (GatewayOutcome::Ok, None),
            Err(err) => (GatewayOutcome::Error, Some(err.kind())),
        };
        self.audit.record_tool_call(&ToolCallAuditEvent::new(ToolCallAuditEventParams {
            correlation_id,
            client_correlation_id,
            session_id: caller.map(|identity| identity.session_id.clone()),
            user_id: context.as_ref().map(|ctx| ctx.user_id.clone()),
            role: context.as_ref().map(|ctx| ctx.role),
            tool: Some(params.name.clone()),
            outcome,
            error_kind,
            elapsed_ms: started.elapsed().as_millis(),
        }));
        result
    }

    /// Resolves the caller's permission context through the collaborator.
    async fn resolve_context(
        &self,
        caller: &CallerIdentity,
    ) -> Result<PermissionContext, DispatchError> {
        self.identity
            .resolve(&caller.session_id, caller.user_id.as_deref())
            .await
            .map_err(|err| match err {
                IdentityError::MissingSession => DispatchError::MissingIdentity,
                other => DispatchError::Identity(other.to_string()),
            })
    }

    /// Runs the gated invocation path and pairs the outcome with the
    /// resolved context for auditing.
    async fn invoke(
        &self,
        caller: Option<&CallerIdentity>,
        params: &ToolCallParams,
        request_id: &CorrelationId,
    ) -> (Option<PermissionContext>, Result<ToolCallResult, DispatchError>) {
        let Some(caller) = caller else {
            return (None, Err(DispatchError::MissingIdentity));
        };
        let context = match self.resolve_context(caller).await {
            Ok(context) => context,
            Err(err) => return (None, Err(err)),
        };
        let result = self.run_gated(caller, &context, params, request_id).await;
        (Some(context), result)
    }

    /// Looks up the tool, re-checks permission, and executes.
    async fn run_gated(
        &self,
        caller: &CallerIdentity,
        context: &PermissionContext,
        params: &ToolCallParams,
        request_id: &CorrelationId,
    ) -> Result<ToolCallResult, DispatchError> {
        let descriptor = self
            .catalog
            .get(&params.name)
            .await
            .map_err(|err| DispatchError::Catalog(err.to_string()))?
            .ok_or_else(|| DispatchError::UnknownTool(params.name.clone()))?;
        if !descriptor.permitted_for(context) {
            return Err(DispatchError::PermissionDenied {
                role: context.role,
                tool: params.name.clone(),
            });
        }
        let execution = ToolExecutionContext {
            user_id: context.user_id.clone(),
            user_email: context.email.clone(),
            session_id: caller.session_id.clone(),
            request_id: request_id.clone(),
        };
        let value = self
            .executor
            .execute(&params.name, params.arguments.clone(), &execution)
            .await
            .map_err(|err| DispatchError::Execution(err.to_string()))?;
        Ok(ToolCallResult::from_value(&value))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
