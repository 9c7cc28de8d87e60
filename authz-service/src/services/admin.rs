//! Administrative mutations over grants, overrides, and role bundles.
//!
//! Every mutation invalidates the resolution cache before it returns, so
//! the next request for an affected principal recomputes from the store.
//! Targeted invalidation when the principal is known; full clear when a
//! role bundle changed and the affected set is not.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{OverridePolarity, PermissionOverride};
use crate::services::audit::{record_detached, AuditEvent, AuditSink};
use crate::services::identity::IdentityStore;
use crate::services::resolver::PermissionResolver;

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn IdentityStore>,
    resolver: PermissionResolver,
    audit: Arc<dyn AuditSink>,
}

impl AdminService {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        resolver: PermissionResolver,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            resolver,
            audit,
        }
    }

    /// Grant or revoke a permission for one user, optionally time-bounded.
    /// Replaces any existing override for the same code.
    pub async fn set_override(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        perm_code: &str,
        polarity: OverridePolarity,
        expires_utc: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let override_ = PermissionOverride {
            user_id,
            perm_code: perm_code.to_string(),
            polarity,
            expires_utc,
            granted_utc: Utc::now(),
        };
        self.store.upsert_override(&override_).await?;
        self.resolver.invalidate(user_id).await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new(
                "override_set",
                Some(user_id),
                actor_id,
                serde_json::json!({
                    "perm_code": perm_code,
                    "polarity": polarity,
                    "expires_utc": expires_utc,
                }),
            ),
        );
        Ok(())
    }

    /// Remove a user's override entirely, restoring role-derived behavior.
    pub async fn remove_override(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        perm_code: &str,
    ) -> Result<bool, AppError> {
        let removed = self.store.remove_override(user_id, perm_code).await?;
        self.resolver.invalidate(user_id).await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new(
                "override_removed",
                Some(user_id),
                actor_id,
                serde_json::json!({ "perm_code": perm_code, "removed": removed }),
            ),
        );
        Ok(removed)
    }

    pub async fn assign_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        role_code: &str,
    ) -> Result<(), AppError> {
        self.store.assign_role(user_id, role_code).await?;
        self.resolver.invalidate(user_id).await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new(
                "role_assigned",
                Some(user_id),
                actor_id,
                serde_json::json!({ "role_code": role_code }),
            ),
        );
        Ok(())
    }

    pub async fn revoke_role(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
        role_code: &str,
    ) -> Result<bool, AppError> {
        let removed = self.store.revoke_role(user_id, role_code).await?;
        self.resolver.invalidate(user_id).await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new(
                "role_revoked",
                Some(user_id),
                actor_id,
                serde_json::json!({ "role_code": role_code, "removed": removed }),
            ),
        );
        Ok(removed)
    }

    /// Add a permission to a role's bundle. Every holder of the role is
    /// affected, so the whole cache is cleared.
    pub async fn grant_role_permission(
        &self,
        actor_id: Uuid,
        role_code: &str,
        perm_code: &str,
    ) -> Result<(), AppError> {
        self.store.grant_role_permission(role_code, perm_code).await?;
        self.resolver.clear().await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new(
                "role_permission_granted",
                None,
                actor_id,
                serde_json::json!({ "role_code": role_code, "perm_code": perm_code }),
            ),
        );
        Ok(())
    }

    pub async fn revoke_role_permission(
        &self,
        actor_id: Uuid,
        role_code: &str,
        perm_code: &str,
    ) -> Result<bool, AppError> {
        let removed = self.store.revoke_role_permission(role_code, perm_code).await?;
        self.resolver.clear().await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new(
                "role_permission_revoked",
                None,
                actor_id,
                serde_json::json!({ "role_code": role_code, "perm_code": perm_code, "removed": removed }),
            ),
        );
        Ok(removed)
    }

    /// Drop every cached resolution. The blunt instrument for operators.
    pub async fn clear_cache(&self, actor_id: Uuid) -> Result<(), AppError> {
        self.resolver.clear().await?;

        record_detached(
            self.audit.clone(),
            AuditEvent::new("cache_cleared", None, actor_id, serde_json::json!({})),
        );
        Ok(())
    }
}
