// crates/toolgate-core/src/catalog.rs
// ============================================================================
// Module: Tool Catalog Types
// Description: Tool descriptors, gating metadata, and JSON schema helpers.
// Purpose: Describe catalog entries and decide whether a context may use them.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Catalog entries are [`ToolDescriptor`] values: a name, a human description,
//! a JSON Schema for the tool input, and optional [`ToolMetadata`] carrying
//! the role and permissions required to see or call the tool. Absent metadata
//! means the tool is unrestricted. The satisfaction check lives on the
//! metadata so listing and invocation gate through the same code path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::identifiers::ToolName;
use crate::identity::Permission;
use crate::identity::PermissionContext;
use crate::identity::Role;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Access requirements attached to a tool descriptor.
///
/// # Invariants
/// - Both gates must pass: the context role must satisfy `required_role`
///   (when present) and every entry of `required_permissions` must be
///   granted (wildcard-aware).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Minimum role required to see or call the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_role: Option<Role>,
    /// Permissions required to see or call the tool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_permissions: Vec<Permission>,
}

impl ToolMetadata {
    /// Creates metadata requiring only a minimum role.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        Self {
            required_role: Some(role),
            required_permissions: Vec::new(),
        }
    }

    /// Creates metadata requiring a set of permissions.
    #[must_use]
    pub fn for_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            required_role: None,
            required_permissions: permissions.into_iter().collect(),
        }
    }

    /// Adds a minimum role requirement.
    #[must_use]
    pub const fn with_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    /// Returns `true` when `context` satisfies every requirement.
    #[must_use]
    pub fn permits(&self, context: &PermissionContext) -> bool {
        if let Some(required) = self.required_role
            && !context.satisfies_role(required)
        {
            return false;
        }
        self.required_permissions.iter().all(|required| context.has_permission(required))
    }
}

/// Tool descriptor exposed through the protocol catalog.
///
/// # Invariants
/// - `name` is a stable protocol tool identifier.
/// - `input_schema` is a JSON Schema payload for the tool input shape.
/// - Absent `metadata` means the tool is unrestricted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Protocol tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    pub input_schema: Value,
    /// Optional access requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ToolMetadata>,
}

impl ToolDescriptor {
    /// Creates an unrestricted tool descriptor.
    #[must_use]
    pub fn new(
        name: impl Into<ToolName>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            metadata: None,
        }
    }

    /// Attaches access requirements to the descriptor.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ToolMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns `true` when `context` may see and call this tool.
    #[must_use]
    pub fn permitted_for(&self, context: &PermissionContext) -> bool {
        self.metadata.as_ref().is_none_or(|metadata| metadata.permits(context))
    }
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Builds a strict object schema from properties and required keys.
#[must_use]
pub fn object_schema(properties: &Value, required: &[&str]) -> Value {
    let required_values: Vec<Value> =
        required.iter().map(|value| Value::String((*value).to_string())).collect();
    json!({
        "type": "object",
        "required": required_values,
        "properties": properties,
        "additionalProperties": false
    })
}

/// Returns a JSON schema fragment for a described string property.
#[must_use]
pub fn string_property(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
