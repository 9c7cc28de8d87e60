//! Authentication middleware.
//!
//! Runs the full chain: bearer extraction, credential validation,
//! revocation check, identity load, permission resolution. On success an
//! immutable `AuthContext` is attached to request extensions for the gate
//! and handlers downstream. Each step strictly precedes the next; the
//! first failure terminates the request.

use std::collections::{BTreeSet, HashSet};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use service_core::error::AppError;

use crate::models::role::ROLE_SUPER_ADMIN;
use crate::services::matcher::{self, RequireOp};
use crate::services::scope::{self, DataScopeFilter, ResourceKind};
use crate::AppState;

/// Per-request identity context. Built once after authentication and
/// never mutated; handlers receive a clone.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub display_name: String,
    pub role_codes: Vec<String>,
    /// Effective permission codes after role/override resolution.
    pub permission_codes: HashSet<String>,
    pub primary_factory_id: Uuid,
    /// Visible factory ids: primary plus additional memberships.
    pub factory_ids: BTreeSet<Uuid>,
    pub credential_id: String,
}

impl AuthContext {
    /// Whether the unrestricted system role is assigned. Checked before
    /// the matcher everywhere; a super admin passes every gate check.
    pub fn is_unrestricted(&self) -> bool {
        self.role_codes.iter().any(|r| r == ROLE_SUPER_ADMIN)
    }

    pub fn require_permission<S: AsRef<str>>(
        &self,
        required: &[S],
        op: RequireOp,
    ) -> Result<(), AppError> {
        if self.is_unrestricted() {
            return Ok(());
        }
        if matcher::satisfies(&self.permission_codes, required, op) {
            return Ok(());
        }

        let required: Vec<&str> = required.iter().map(|s| s.as_ref()).collect();
        tracing::warn!(
            user_id = %self.user_id,
            required = ?required,
            "Permission denied: missing permission"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Missing required permission: {}",
            required.join(", ")
        )))
    }

    /// Check the assigned role codes against an allow-list.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), AppError> {
        if self.is_unrestricted() {
            return Ok(());
        }
        if self.role_codes.iter().any(|r| allowed.contains(&r.as_str())) {
            return Ok(());
        }

        tracing::warn!(
            user_id = %self.user_id,
            roles = ?self.role_codes,
            allowed = ?allowed,
            "Permission denied: role not allowed"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Role not permitted for this operation"
        )))
    }

    /// Compare a record's owner field against the principal.
    pub fn require_ownership(&self, owner_id: Uuid) -> Result<(), AppError> {
        if self.is_unrestricted() {
            return Ok(());
        }
        if owner_id == self.user_id {
            return Ok(());
        }

        tracing::warn!(
            user_id = %self.user_id,
            owner_id = %owner_id,
            "Permission denied: not the owner"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Operation restricted to the record owner"
        )))
    }

    /// Check a caller-supplied factory id against the visible set.
    pub fn require_same_factory(&self, factory_id: Uuid) -> Result<(), AppError> {
        if self.is_unrestricted() {
            return Ok(());
        }
        if self.factory_ids.contains(&factory_id) {
            return Ok(());
        }

        tracing::warn!(
            user_id = %self.user_id,
            factory_id = %factory_id,
            memberships = ?self.factory_ids,
            "Permission denied: factory not visible"
        );
        Err(AppError::Forbidden(anyhow::anyhow!(
            "Operation restricted to the principal's factories"
        )))
    }

    /// Build the data-scope filter for a resource type. Recomputed per
    /// call; scoping must reflect the freshest membership set.
    pub fn data_scope(&self, resource: ResourceKind) -> DataScopeFilter {
        scope::build_filter_from_parts(
            self.user_id,
            &self.role_codes,
            &self.factory_ids,
            resource,
        )
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// The authentication chain shared by the required and optional variants.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, AppError> {
    let token = bearer_token(headers).ok_or(AppError::MissingCredential)?;

    let claims = state.jwt.authenticate(token)?;

    if state.revocation.is_revoked(&claims.jti).await? {
        tracing::warn!(jti = %claims.jti, "Rejected blacklisted credential");
        return Err(AppError::TokenRevoked);
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::TokenInvalid(anyhow::anyhow!("Subject is not a valid user id")))?;

    // Unknown and deactivated accounts are deliberately indistinguishable.
    let principal = state
        .identity
        .find_active_principal(user_id)
        .await?
        .ok_or(AppError::PrincipalInvalid)?;

    let resolved = state.resolver.resolve(&principal).await?;

    Ok(AuthContext {
        user_id: principal.user_id(),
        display_name: principal.user.display_name.clone(),
        role_codes: principal.role_codes(),
        permission_codes: resolved.codes(),
        primary_factory_id: principal.user.primary_factory_id,
        factory_ids: principal.visible_factory_ids(),
        credential_id: claims.jti,
    })
}

/// Middleware requiring an authenticated principal.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Middleware that attempts authentication but proceeds anonymously when
/// the credential is missing, invalid, expired, revoked, or belongs to a
/// deactivated account. Used by endpoints with graded visibility.
/// Infrastructure failures still surface - a store outage is not
/// anonymity.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match authenticate(&state, req.headers()).await {
        Ok(context) => {
            req.extensions_mut().insert(context);
        }
        Err(e) if e.is_credential_error() => {
            tracing::debug!(error = %e, "Optional auth failed, proceeding anonymously");
        }
        Err(e) => return Err(e),
    }
    Ok(next.run(req).await)
}

/// Extractor for handlers behind `auth_middleware`.
pub struct CurrentUser(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts.extensions.get::<AuthContext>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth context missing from request extensions"
            ))
        })?;
        Ok(CurrentUser(context.clone()))
    }
}

/// Extractor for handlers behind `optional_auth_middleware`.
pub struct MaybeUser(pub Option<AuthContext>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<AuthContext>().cloned()))
    }
}
