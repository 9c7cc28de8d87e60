//! Role model - named permission bundles assigned to users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Permission;

/// The unrestricted system role. Bypasses every permission and scope check.
pub const ROLE_SUPER_ADMIN: &str = "SUPER_ADMIN";
/// Factory-level administrator, scoped to their factory memberships.
pub const ROLE_FACTORY_ADMIN: &str = "FACTORY_ADMIN";
/// Field inspector; sees factory equipment, owns their inspection records.
pub const ROLE_INSPECTOR: &str = "INSPECTOR";
/// Maintenance staff; works the issue queue within their factories.
pub const ROLE_MAINTAINER: &str = "MAINTAINER";
/// Read-only factory member.
pub const ROLE_VIEWER: &str = "VIEWER";
/// Compliance auditor with cross-factory read visibility.
pub const ROLE_AUDITOR: &str = "AUDITOR";

/// Role entity. The code is the stable identity; the permission bundle
/// attached to it can change over time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub role_id: Uuid,
    pub role_code: String,
    pub role_label: String,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new role.
    pub fn new(role_code: String, role_label: String) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            role_code,
            role_label,
            created_utc: Utc::now(),
        }
    }
}

/// Role→permission grant edge. Exists for the lifetime of the
/// administrative decision that created it.
#[derive(Debug, Clone, FromRow)]
pub struct RoleGrant {
    pub role_id: Uuid,
    pub perm_id: Uuid,
}

/// Role with its full permission bundle, as loaded for resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl RoleWithPermissions {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            permissions: Vec::new(),
        }
    }
}
