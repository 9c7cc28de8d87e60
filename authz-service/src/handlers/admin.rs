//! Administrative permission-management endpoints.
//!
//! All routes sit behind the gate with the `system:admin` requirement;
//! the engine guards its own mutation surface.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use service_core::error::AppError;

use crate::middleware::CurrentUser;
use crate::models::OverridePolarity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SetOverrideRequest {
    pub perm_code: String,
    pub polarity: OverridePolarity,
    pub expires_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_code: String,
}

#[derive(Debug, Deserialize)]
pub struct RolePermissionRequest {
    pub perm_code: String,
}

/// POST /authz/admin/users/:user_id/overrides
pub async fn set_override(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<SetOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .admin
        .set_override(
            actor.user_id,
            user_id,
            &body.perm_code,
            body.polarity,
            body.expires_utc,
        )
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// DELETE /authz/admin/users/:user_id/overrides/:perm_code
pub async fn remove_override(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((user_id, perm_code)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let removed = state
        .admin
        .remove_override(actor.user_id, user_id, &perm_code)
        .await?;
    Ok(Json(json!({ "status": "ok", "removed": removed })))
}

/// POST /authz/admin/users/:user_id/roles
pub async fn assign_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<AssignRoleRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .admin
        .assign_role(actor.user_id, user_id, &body.role_code)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// DELETE /authz/admin/users/:user_id/roles/:role_code
pub async fn revoke_role(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((user_id, role_code)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let removed = state
        .admin
        .revoke_role(actor.user_id, user_id, &role_code)
        .await?;
    Ok(Json(json!({ "status": "ok", "removed": removed })))
}

/// POST /authz/admin/roles/:role_code/permissions
pub async fn grant_role_permission(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(role_code): Path<String>,
    Json(body): Json<RolePermissionRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .admin
        .grant_role_permission(actor.user_id, &role_code, &body.perm_code)
        .await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// DELETE /authz/admin/roles/:role_code/permissions/:perm_code
pub async fn revoke_role_permission(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((role_code, perm_code)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let removed = state
        .admin
        .revoke_role_permission(actor.user_id, &role_code, &perm_code)
        .await?;
    Ok(Json(json!({ "status": "ok", "removed": removed })))
}

/// POST /authz/admin/cache/clear
pub async fn clear_cache(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> Result<Json<Value>, AppError> {
    state.admin.clear_cache(actor.user_id).await?;
    Ok(Json(json!({ "status": "ok" })))
}
