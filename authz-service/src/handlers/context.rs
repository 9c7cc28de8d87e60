//! Request-context endpoint for downstream consumers and debugging.

use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::CurrentUser;

/// The per-request identity context, in the shape consumers of the engine
/// receive it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    pub principal_id: Uuid,
    pub display_name: String,
    pub role_codes: Vec<String>,
    pub effective_permission_codes: Vec<String>,
    pub visible_factory_ids: Vec<Uuid>,
    pub primary_factory_id: Uuid,
    pub credential_id: String,
}

/// GET /auth/me
pub async fn get_me(CurrentUser(context): CurrentUser) -> Json<ContextResponse> {
    // Sorted for stable output
    let mut codes: Vec<String> = context.permission_codes.iter().cloned().collect();
    codes.sort();

    Json(ContextResponse {
        principal_id: context.user_id,
        display_name: context.display_name,
        role_codes: context.role_codes,
        effective_permission_codes: codes,
        visible_factory_ids: context.factory_ids.iter().copied().collect(),
        primary_factory_id: context.primary_factory_id,
        credential_id: context.credential_id,
    })
}
