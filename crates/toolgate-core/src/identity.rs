// crates/toolgate-core/src/identity.rs
// ============================================================================
// Module: Permission Model
// Description: Roles, permission strings, and per-request permission contexts.
// Purpose: Provide pure role/permission satisfaction checks with wildcard support.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The permission model is a pure function library: a closed set of roles,
//! `resource:action` permission strings with `resource:*` and `*:*`
//! wildcards, and a per-request [`PermissionContext`] combining role-default
//! permissions with optional custom additions. Nothing here performs I/O or
//! consults external state; the gateway derives a context per request via its
//! identity collaborator and evaluates it with these checks.
//!
//! Security posture: permission checks fail closed. An absent grant is a
//! denial; there is no fallback identity or implicit role.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// User role recognized by the gateway.
///
/// # Invariants
/// - Closed set; unknown role strings fail to parse rather than defaulting.
/// - Variant order defines privilege rank: `Basic` < `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standard user with role-default read permissions.
    Basic,
    /// Administrative user granted the global wildcard.
    Admin,
}

impl Role {
    /// Returns the stable wire label for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Admin => "admin",
        }
    }

    /// Returns `true` when this role satisfies the required role.
    ///
    /// Rank-based: an admin satisfies a `basic` requirement, never the
    /// reverse.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }

    /// Returns the role-default permission set.
    #[must_use]
    pub fn default_permissions(self) -> BTreeSet<Permission> {
        let grants: &[&str] = match self {
            Self::Admin => &["*:*"],
            Self::Basic => {
                &["tools:list", "tools:read", "resources:list", "resources:read", "prompts:read"]
            }
        };
        grants.iter().map(|grant| Permission::new(*grant)).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct RoleParseError(String);

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "basic" => Ok(Self::Basic),
            "admin" => Ok(Self::Admin),
            other => Err(RoleParseError(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Permissions
// ============================================================================

/// Permission string in `resource:action` form.
///
/// # Invariants
/// - Opaque UTF-8 string; `resource:*` and `*:*` are the only recognized
///   wildcard forms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Creates a new permission string.
    #[must_use]
    pub fn new(permission: impl Into<String>) -> Self {
        Self(permission.into())
    }

    /// Returns the permission as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` when this granted permission covers `required`.
    ///
    /// Covers exact matches, `resource:*` for any action on the resource,
    /// and the global `*:*` wildcard.
    #[must_use]
    pub fn grants(&self, required: &Self) -> bool {
        if self.0 == "*:*" || self.0 == required.0 {
            return true;
        }
        if let Some(resource) = self.0.strip_suffix(":*")
            && let Some((required_resource, _)) = required.0.split_once(':')
        {
            return resource == required_resource;
        }
        false
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Permission Context
// ============================================================================

/// Resolved role and permission set behind a single request.
///
/// # Invariants
/// - Derived per request by the identity collaborator; never persisted.
/// - `permissions` carries the role defaults; `custom_permissions` carries
///   per-user additions. Both are consulted by [`Self::has_permission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionContext {
    /// Stable user identifier.
    pub user_id: String,
    /// User email for audit labeling.
    pub email: String,
    /// Resolved role.
    pub role: Role,
    /// Role-default permissions.
    pub permissions: BTreeSet<Permission>,
    /// Optional per-user permission additions.
    #[serde(default)]
    pub custom_permissions: BTreeSet<Permission>,
}

impl PermissionContext {
    /// Creates a context carrying the role-default permission set.
    #[must_use]
    pub fn for_role(user_id: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role,
            permissions: role.default_permissions(),
            custom_permissions: BTreeSet::new(),
        }
    }

    /// Adds custom permissions on top of the role defaults.
    #[must_use]
    pub fn with_custom_permissions(
        mut self,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        self.custom_permissions.extend(permissions);
        self
    }

    /// Returns `true` when any granted permission covers `required`.
    #[must_use]
    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions
            .iter()
            .chain(self.custom_permissions.iter())
            .any(|granted| granted.grants(required))
    }

    /// Returns `true` when the context role satisfies `required`.
    #[must_use]
    pub fn satisfies_role(&self, required: Role) -> bool {
        self.role.satisfies(required)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
