//! Identity loading.
//!
//! The identity store is the single point of truth for "does this user
//! still exist and is it usable". It is consulted on every request with no
//! caching, so a deactivated account is locked out immediately rather than
//! after a cache expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{Permission, PermissionOverride, Principal, RoleWithPermissions};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Load the principal with roles (and their bundles), active
    /// overrides, and factory memberships. Returns `None` for unknown or
    /// deactivated users - callers must treat both identically.
    async fn find_active_principal(&self, user_id: Uuid) -> Result<Option<Principal>, AppError>;

    /// Insert or replace the override for (user, code).
    async fn upsert_override(&self, override_: &PermissionOverride) -> Result<(), AppError>;

    /// Delete the override for (user, code). Returns whether one existed.
    async fn remove_override(&self, user_id: Uuid, perm_code: &str) -> Result<bool, AppError>;

    async fn assign_role(&self, user_id: Uuid, role_code: &str) -> Result<(), AppError>;

    /// Returns whether the assignment existed.
    async fn revoke_role(&self, user_id: Uuid, role_code: &str) -> Result<bool, AppError>;

    /// Add a permission to a role's bundle.
    async fn grant_role_permission(&self, role_code: &str, perm_code: &str)
        -> Result<(), AppError>;

    /// Remove a permission from a role's bundle. Returns whether the
    /// grant existed.
    async fn revoke_role_permission(
        &self,
        role_code: &str,
        perm_code: &str,
    ) -> Result<bool, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// In-memory identity store for tests.
///
/// Holds fully built principals plus a role registry so role-bundle edits
/// propagate to every principal holding the role, the way the relational
/// store behaves.
#[derive(Default)]
pub struct MockIdentityStore {
    principals: Mutex<HashMap<Uuid, Principal>>,
    roles: Mutex<HashMap<String, RoleWithPermissions>>,
    load_calls: AtomicUsize,
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mutex poisoned: {}", e)))
}

impl MockIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_principal(&self, principal: Principal) {
        self.principals
            .lock()
            .expect("mock principals mutex poisoned")
            .insert(principal.user_id(), principal);
    }

    pub fn define_role(&self, role: RoleWithPermissions) {
        self.roles
            .lock()
            .expect("mock roles mutex poisoned")
            .insert(role.role.role_code.clone(), role);
    }

    /// How many times `find_active_principal` has been called.
    pub fn loads(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn deactivate(&self, user_id: Uuid) {
        if let Some(p) = self
            .principals
            .lock()
            .expect("mock principals mutex poisoned")
            .get_mut(&user_id)
        {
            p.user.active = false;
        }
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn find_active_principal(&self, user_id: Uuid) -> Result<Option<Principal>, AppError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let principals = locked(&self.principals)?;
        Ok(principals.get(&user_id).filter(|p| p.user.active).cloned())
    }

    async fn upsert_override(&self, override_: &PermissionOverride) -> Result<(), AppError> {
        let mut principals = locked(&self.principals)?;
        let principal = principals
            .get_mut(&override_.user_id)
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("unknown user")))?;
        principal
            .overrides
            .retain(|o| o.perm_code != override_.perm_code);
        principal.overrides.push(override_.clone());
        Ok(())
    }

    async fn remove_override(&self, user_id: Uuid, perm_code: &str) -> Result<bool, AppError> {
        let mut principals = locked(&self.principals)?;
        let principal = principals
            .get_mut(&user_id)
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("unknown user")))?;
        let before = principal.overrides.len();
        principal.overrides.retain(|o| o.perm_code != perm_code);
        Ok(principal.overrides.len() < before)
    }

    async fn assign_role(&self, user_id: Uuid, role_code: &str) -> Result<(), AppError> {
        let role = locked(&self.roles)?
            .get(role_code)
            .cloned()
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("unknown role {role_code}")))?;
        let mut principals = locked(&self.principals)?;
        let principal = principals
            .get_mut(&user_id)
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("unknown user")))?;
        if !principal.has_role(role_code) {
            principal.roles.push(role);
        }
        Ok(())
    }

    async fn revoke_role(&self, user_id: Uuid, role_code: &str) -> Result<bool, AppError> {
        let mut principals = locked(&self.principals)?;
        let principal = principals
            .get_mut(&user_id)
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("unknown user")))?;
        let before = principal.roles.len();
        principal.roles.retain(|r| r.role.role_code != role_code);
        Ok(principal.roles.len() < before)
    }

    async fn grant_role_permission(
        &self,
        role_code: &str,
        perm_code: &str,
    ) -> Result<(), AppError> {
        {
            let mut roles = locked(&self.roles)?;
            let template = roles.get_mut(role_code).ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!("unknown role {role_code}"))
            })?;
            if !template.permissions.iter().any(|p| p.perm_code == perm_code) {
                template
                    .permissions
                    .push(Permission::new(perm_code.to_string()));
            }
        }

        let mut principals = locked(&self.principals)?;
        for principal in principals.values_mut() {
            for role in &mut principal.roles {
                if role.role.role_code == role_code
                    && !role.permissions.iter().any(|p| p.perm_code == perm_code)
                {
                    role.permissions.push(Permission::new(perm_code.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn revoke_role_permission(
        &self,
        role_code: &str,
        perm_code: &str,
    ) -> Result<bool, AppError> {
        let mut existed = false;
        {
            let mut roles = locked(&self.roles)?;
            if let Some(template) = roles.get_mut(role_code) {
                let before = template.permissions.len();
                template.permissions.retain(|p| p.perm_code != perm_code);
                existed = template.permissions.len() < before;
            }
        }

        let mut principals = locked(&self.principals)?;
        for principal in principals.values_mut() {
            for role in &mut principal.roles {
                if role.role.role_code == role_code {
                    role.permissions.retain(|p| p.perm_code != perm_code);
                }
            }
        }
        Ok(existed)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
