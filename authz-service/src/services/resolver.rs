//! Permission resolution.
//!
//! Merges role-derived grants with per-user overrides into one effective
//! set, in a fixed order: every role bundle first, then overrides, with
//! revocations removing codes no matter which role granted them. The
//! result is cached per principal with a TTL; administrative mutations
//! invalidate explicitly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::{OverridePolarity, PermissionProvenance, Principal, ResolvedPermissionSet};
use crate::services::cache::PermissionCache;

/// One step of the merge, in application order. Materializing the steps
/// keeps the precedence rules in one place instead of being implicit in
/// map insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeOp {
    RoleGrant {
        perm_code: String,
        role_code: String,
    },
    OverrideGrant {
        perm_code: String,
        expires_utc: Option<chrono::DateTime<chrono::Utc>>,
    },
    OverrideRevoke {
        perm_code: String,
    },
}

/// Flatten a principal's roles and overrides into ordered merge steps.
///
/// Role grants come first (only active permissions), then overrides.
/// Expired overrides are skipped entirely, as if absent.
fn merge_ops(principal: &Principal) -> Vec<MergeOp> {
    let mut ops = Vec::new();

    for role in &principal.roles {
        for permission in &role.permissions {
            if !permission.active {
                continue;
            }
            ops.push(MergeOp::RoleGrant {
                perm_code: permission.perm_code.clone(),
                role_code: role.role.role_code.clone(),
            });
        }
    }

    for override_ in &principal.overrides {
        if override_.is_expired() {
            continue;
        }
        match override_.polarity {
            OverridePolarity::Granted => ops.push(MergeOp::OverrideGrant {
                perm_code: override_.perm_code.clone(),
                expires_utc: override_.expires_utc,
            }),
            OverridePolarity::Revoked => ops.push(MergeOp::OverrideRevoke {
                perm_code: override_.perm_code.clone(),
            }),
        }
    }

    ops
}

fn apply(set: &mut ResolvedPermissionSet, op: MergeOp) {
    match op {
        MergeOp::RoleGrant {
            perm_code,
            role_code,
        } => {
            // Later roles overwrite earlier ones harmlessly; role-sourced
            // entries are path-independent.
            set.insert(perm_code, PermissionProvenance::Role { role_code });
        }
        MergeOp::OverrideGrant {
            perm_code,
            expires_utc,
        } => {
            // Supersedes any role-derived entry for the same code.
            set.insert(perm_code, PermissionProvenance::Override { expires_utc });
        }
        MergeOp::OverrideRevoke { perm_code } => {
            // Removes the code unconditionally, even if a role grants it.
            set.remove(&perm_code);
        }
    }
}

/// Pure resolution, ignoring the cache. Idempotent for a given principal.
pub fn resolve_uncached(principal: &Principal) -> ResolvedPermissionSet {
    let mut set = ResolvedPermissionSet::default();
    for op in merge_ops(principal) {
        apply(&mut set, op);
    }
    set
}

/// Resolver with its cache. Cheap to clone; shared across requests.
#[derive(Clone)]
pub struct PermissionResolver {
    cache: Arc<dyn PermissionCache>,
    ttl_seconds: u64,
}

impl PermissionResolver {
    pub fn new(cache: Arc<dyn PermissionCache>, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    /// Resolve the principal's effective permissions, consulting the cache
    /// first. Concurrent misses for the same principal may both recompute;
    /// last write wins and both values are equivalent, so no lock is held.
    pub async fn resolve(&self, principal: &Principal) -> Result<ResolvedPermissionSet, AppError> {
        let user_id = principal.user_id();

        if let Some(hit) = self.cache.get(user_id).await? {
            tracing::debug!(user_id = %user_id, "Permission cache hit");
            return Ok(hit);
        }

        let set = resolve_uncached(principal);
        tracing::debug!(
            user_id = %user_id,
            permissions = set.len(),
            "Resolved permissions from store state"
        );

        // Resolution already succeeded; a failed cache write only costs
        // the next request a recompute.
        if let Err(e) = self.cache.set(user_id, &set, self.ttl_seconds).await {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to cache resolved permissions");
        }

        Ok(set)
    }

    /// Drop the cached set for one principal. Must run before the
    /// triggering administrative action is acknowledged.
    pub async fn invalidate(&self, user_id: Uuid) -> Result<(), AppError> {
        self.cache.invalidate(user_id).await
    }

    /// Drop every cached set. Used when the affected principal set is
    /// unknown (e.g. a role's bundle changed).
    pub async fn clear(&self) -> Result<(), AppError> {
        self.cache.clear().await
    }
}
