//! Permission gate middleware.
//!
//! Declares what a route needs - a permission requirement, a data-scope
//! attachment, or both - and enforces it against the `AuthContext` left by
//! the authentication middleware. Applied inside (after) `auth_middleware`
//! so an absent context means the route was reached unauthenticated.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use service_core::error::AppError;

use crate::middleware::auth::AuthContext;
use crate::services::matcher::RequireOp;
use crate::services::scope::{DataScopeFilter, ResourceKind};

/// Declarative gate configuration carried as middleware state.
#[derive(Clone)]
pub struct PermissionGate {
    required: Vec<String>,
    op: RequireOp,
    resource: Option<ResourceKind>,
}

impl PermissionGate {
    /// Require a single permission code.
    pub fn require(perm_code: &str) -> Self {
        Self {
            required: vec![perm_code.to_string()],
            op: RequireOp::And,
            resource: None,
        }
    }

    /// Require every listed code.
    pub fn require_all(perm_codes: &[&str]) -> Self {
        Self {
            required: perm_codes.iter().map(|c| c.to_string()).collect(),
            op: RequireOp::And,
            resource: None,
        }
    }

    /// Require at least one listed code.
    pub fn require_any(perm_codes: &[&str]) -> Self {
        Self {
            required: perm_codes.iter().map(|c| c.to_string()).collect(),
            op: RequireOp::Or,
            resource: None,
        }
    }

    /// Attach no permission requirement; only build the scope filter.
    pub fn scope_only(resource: ResourceKind) -> Self {
        Self {
            required: Vec::new(),
            op: RequireOp::And,
            resource: Some(resource),
        }
    }

    /// Also attach the data-scope filter for a resource type on success.
    pub fn with_scope(mut self, resource: ResourceKind) -> Self {
        self.resource = Some(resource);
        self
    }
}

/// Gate middleware body. Rejection order: no identity → 401, permission
/// check → 403; only then is the scope filter attached and control handed
/// downstream.
pub async fn permission_gate(
    State(gate): State<PermissionGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let context = req
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or(AppError::MissingCredential)?;

    if !gate.required.is_empty() {
        context.require_permission(&gate.required, gate.op)?;
    }

    if let Some(resource) = gate.resource {
        let filter = context.data_scope(resource);
        req.extensions_mut().insert(filter);
    }

    Ok(next.run(req).await)
}

/// Extractor for the scope filter attached by the gate.
pub struct ScopeFilter(pub DataScopeFilter);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ScopeFilter
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let filter = parts.extensions.get::<DataScopeFilter>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Data-scope filter missing from request extensions"
            ))
        })?;
        Ok(ScopeFilter(filter.clone()))
    }
}
