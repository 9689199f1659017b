// crates/toolgate-core/src/lib.rs
// ============================================================================
// Module: Toolgate Core
// Description: Identifiers, permission model, tool catalog types, and
//              collaborator traits for the Toolgate gateway.
// Purpose: Provide the shared vocabulary the gateway runtime is built on.
// Dependencies: serde, serde_json, thiserror, async-trait
// ============================================================================

//! ## Overview
//! Toolgate Core defines the leaf types of the gateway: opaque identifiers,
//! the role/permission model with wildcard matching, tool catalog
//! descriptors, the JSON-RPC envelope types validated at the HTTP boundary,
//! and the collaborator traits (identity resolution, tool catalog, tool
//! execution) the gateway consumes but does not implement. In-memory
//! collaborator implementations are provided for wiring and tests.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod collab;
pub mod identifiers;
pub mod identity;
pub mod rpc;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::ToolDescriptor;
pub use catalog::ToolMetadata;
pub use catalog::object_schema;
pub use catalog::string_property;
pub use collab::CallerIdentity;
pub use collab::CatalogError;
pub use collab::EchoToolExecutor;
pub use collab::ExecutorError;
pub use collab::IdentityError;
pub use collab::IdentityResolver;
pub use collab::InMemoryToolCatalog;
pub use collab::StaticIdentityResolver;
pub use collab::ToolCatalog;
pub use collab::ToolExecutionContext;
pub use collab::ToolExecutor;
pub use identifiers::CorrelationId;
pub use identifiers::ServerId;
pub use identifiers::SessionId;
pub use identifiers::ToolName;
pub use identity::Permission;
pub use identity::PermissionContext;
pub use identity::Role;
pub use identity::RoleParseError;
pub use rpc::JsonRpcError;
pub use rpc::JsonRpcRequest;
pub use rpc::JsonRpcResponse;
pub use rpc::RpcError;
pub use rpc::ToolCallParams;
pub use rpc::ToolCallResult;
pub use rpc::ToolContent;
pub use rpc::ToolsListResult;
pub use rpc::extract_request_id;
pub use rpc::parse_request;
