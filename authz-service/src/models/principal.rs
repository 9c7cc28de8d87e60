//! Principal model - the authenticated actor and its loaded associations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{PermissionOverride, RoleWithPermissions};
use crate::models::role::ROLE_SUPER_ADMIN;

/// User entity row. Users are deactivated, never deleted, so historic
/// records keep a valid reference.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub display_name: String,
    pub active: bool,
    pub primary_factory_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

/// Fully loaded principal: the user record plus everything permission
/// resolution and data scoping need. Built once per request by the
/// identity loader; treated as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user: UserRecord,
    /// Additional factory memberships beyond the primary factory.
    pub factory_ids: Vec<Uuid>,
    pub roles: Vec<RoleWithPermissions>,
    pub overrides: Vec<PermissionOverride>,
}

impl Principal {
    pub fn user_id(&self) -> Uuid {
        self.user.user_id
    }

    /// Union of the primary factory and all additional memberships,
    /// deduplicated. This set is the visibility boundary for
    /// factory-scoped data.
    pub fn visible_factory_ids(&self) -> BTreeSet<Uuid> {
        let mut ids: BTreeSet<Uuid> = self.factory_ids.iter().copied().collect();
        ids.insert(self.user.primary_factory_id);
        ids
    }

    pub fn role_codes(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.role.role_code.clone()).collect()
    }

    pub fn has_role(&self, role_code: &str) -> bool {
        self.roles.iter().any(|r| r.role.role_code == role_code)
    }

    /// Whether any assigned role is the unrestricted system role.
    pub fn is_unrestricted(&self) -> bool {
        self.has_role(ROLE_SUPER_ADMIN)
    }
}
