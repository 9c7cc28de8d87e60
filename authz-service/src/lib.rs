pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};

use crate::config::AuthzConfig;
use crate::middleware::{auth_middleware, permission_gate, PermissionGate};
use crate::services::{
    AdminService, AuditSink, IdentityStore, JwtService, PermissionResolver, TokenRevocation,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    pub jwt: JwtService,
    pub identity: Arc<dyn IdentityStore>,
    pub revocation: Arc<dyn TokenRevocation>,
    pub resolver: PermissionResolver,
    pub admin: AdminService,
    pub audit: Arc<dyn AuditSink>,
}

pub fn build_router(state: AppState) -> Router {
    // Admin routes guard themselves through the engine
    let admin_gate = PermissionGate::require("system:admin");
    let admin_routes = Router::new()
        .route(
            "/authz/admin/users/:user_id/overrides",
            post(handlers::admin::set_override),
        )
        .route(
            "/authz/admin/users/:user_id/overrides/:perm_code",
            delete(handlers::admin::remove_override),
        )
        .route(
            "/authz/admin/users/:user_id/roles",
            post(handlers::admin::assign_role),
        )
        .route(
            "/authz/admin/users/:user_id/roles/:role_code",
            delete(handlers::admin::revoke_role),
        )
        .route(
            "/authz/admin/roles/:role_code/permissions",
            post(handlers::admin::grant_role_permission),
        )
        .route(
            "/authz/admin/roles/:role_code/permissions/:perm_code",
            delete(handlers::admin::revoke_role_permission),
        )
        .route("/authz/admin/cache/clear", post(handlers::admin::clear_cache))
        .layer(from_fn_with_state(admin_gate, permission_gate))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let me_route = Router::new()
        .route("/auth/me", get(handlers::context::get_me))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .merge(me_route)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PATCH,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        )
}

/// Service health check
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.identity.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Identity store health check failed");
        e
    })?;

    state.revocation.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation store health check failed");
        e
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "checks": {
            "identity_store": "up",
            "revocation_store": "up"
        }
    })))
}
