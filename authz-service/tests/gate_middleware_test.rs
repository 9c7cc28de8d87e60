//! Gate behavior end to end: credential-layer rejections, permission
//! checks, ownership/factory/role checks, scope filters, and the
//! optional-auth variant, all over mock collaborators.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use tower::util::ServiceExt;
use uuid::Uuid;

use authz_service::models::{OverridePolarity, PermissionOverride};
use authz_service::services::identity::IdentityStore;
use authz_service::services::{TokenRevocation, TOKEN_KIND_ACCESS};

use common::{
    body_json, factory, factory_admin_role, inspector_role, protected_router, super_admin_role,
    TestHarness,
};

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let harness = TestHarness::new().await;
    let app = protected_router(harness.state.clone());

    let response = app.oneshot(get("/equipment", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["errorCode"], "UNAUTHORIZED");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_garbage_credential_is_token_invalid() {
    let harness = TestHarness::new().await;
    let app = protected_router(harness.state.clone());

    let response = app
        .oneshot(get("/equipment", Some("not.a.token")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], "TOKEN_INVALID");
}

#[tokio::test]
async fn test_expired_credential_never_reaches_identity_loading() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let token = harness
        .jwt
        .issue_token(user_id, TOKEN_KIND_ACCESS, Duration::minutes(-5))
        .unwrap();

    let response = app.oneshot(get("/equipment", Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], "TOKEN_EXPIRED");
    assert_eq!(harness.identity.loads(), 0);
}

#[tokio::test]
async fn test_refresh_credential_cannot_authenticate() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let token = harness.jwt.issue_refresh_token(user_id).unwrap();

    let response = app.oneshot(get("/equipment", Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], "INVALID_TOKEN_TYPE");
}

#[tokio::test]
async fn test_blacklisted_credential_never_reaches_identity_loading() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let token = harness.token_for(user_id);
    let claims = harness.jwt.authenticate(&token).unwrap();
    harness
        .revocation
        .revoke(&claims.jti, 900)
        .await
        .unwrap();

    let response = app.oneshot(get("/equipment", Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], "TOKEN_BLACKLISTED");
    assert_eq!(harness.identity.loads(), 0);
}

#[tokio::test]
async fn test_deactivated_account_is_user_invalid() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    harness.identity.deactivate(user_id);
    let app = protected_router(harness.state.clone());

    let token = harness.token_for(user_id);
    let response = app.oneshot(get("/equipment", Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errorCode"], "USER_INVALID");
}

#[tokio::test]
async fn test_inspector_cannot_delete_equipment() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let token = harness.token_for(user_id);
    let response = app
        .oneshot(delete(&format!("/equipment/{}", Uuid::new_v4()), &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["errorCode"], "FORBIDDEN");
}

#[tokio::test]
async fn test_override_grants_what_the_role_lacks() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);

    harness
        .identity
        .upsert_override(&PermissionOverride::new(
            user_id,
            "equipment:delete".to_string(),
            OverridePolarity::Granted,
        ))
        .await
        .unwrap();

    let app = protected_router(harness.state.clone());
    let token = harness.token_for(user_id);

    let response = app
        .oneshot(delete(&format!("/equipment/{}", Uuid::new_v4()), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_revoking_override_beats_role_grant() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);

    harness
        .identity
        .upsert_override(&PermissionOverride::new(
            user_id,
            "equipment:read".to_string(),
            OverridePolarity::Revoked,
        ))
        .await
        .unwrap();

    let app = protected_router(harness.state.clone());
    let token = harness.token_for(user_id);

    let response = app.oneshot(get("/equipment", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_super_admin_bypasses_permission_checks() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![super_admin_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let token = harness.token_for(user_id);
    let response = app
        .clone()
        .oneshot(delete(&format!("/equipment/{}", Uuid::new_v4()), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Foreign factory, foreign record owner: still passes
    let response = app
        .oneshot(get(&format!("/factories/{}/issues", factory(7)), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_module_wildcard_satisfies_concrete_action() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![factory_admin_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let token = harness.token_for(user_id);
    let response = app
        .oneshot(delete(&format!("/equipment/{}", Uuid::new_v4()), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ownership_check() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());
    let token = harness.token_for(user_id);

    let own = app
        .clone()
        .oneshot(get(&format!("/inspections/{}", user_id), Some(&token)))
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::OK);

    let foreign = app
        .oneshot(get(&format!("/inspections/{}", Uuid::new_v4()), Some(&token)))
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_same_factory_check_rejects_foreign_factory() {
    let harness = TestHarness::new().await;
    // Memberships {5}; factory 9 is foreign
    let user_id = harness.add_user(vec![factory_admin_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());
    let token = harness.token_for(user_id);

    let response = app
        .oneshot(get(&format!("/factories/{}/issues", factory(9)), Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["errorCode"], "FORBIDDEN");
}

#[tokio::test]
async fn test_same_factory_check_accepts_any_membership() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![factory_admin_role()], factory(5), &[factory(9)]);
    let app = protected_router(harness.state.clone());
    let token = harness.token_for(user_id);

    for id in [factory(5), factory(9)] {
        let response = app
            .clone()
            .oneshot(get(&format!("/factories/{}/issues", id), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_role_allow_list_route() {
    let harness = TestHarness::new().await;
    let inspector = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let admin = harness.add_user(vec![factory_admin_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let response = app
        .clone()
        .oneshot(get("/users", Some(&harness.token_for(inspector))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get("/users", Some(&harness.token_for(admin))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_scope_filter_reflects_memberships() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![factory_admin_role()], factory(5), &[factory(9)]);
    let app = protected_router(harness.state.clone());

    let response = app
        .oneshot(get("/equipment", Some(&harness.token_for(user_id))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let filter = &body["filter"];
    assert_eq!(filter["kind"], "factory_set");
    let ids: Vec<String> = filter["factory_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&factory(5).to_string()));
    assert!(ids.contains(&factory(9).to_string()));
    assert!(!ids.contains(&factory(7).to_string()));
    // Two memberships: no singular convenience field
    assert!(filter.get("factory_id").is_none());
}

#[tokio::test]
async fn test_scope_filter_singular_for_single_membership() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![factory_admin_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    let response = app
        .oneshot(get("/equipment", Some(&harness.token_for(user_id))))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["filter"]["factory_id"], factory(5).to_string());
}

#[tokio::test]
async fn test_optional_auth_proceeds_anonymously_on_bad_credentials() {
    let harness = TestHarness::new().await;
    let user_id = harness.add_user(vec![inspector_role()], factory(5), &[]);
    let app = protected_router(harness.state.clone());

    // No credential at all
    let response = app
        .clone()
        .oneshot(get("/public/bulletins", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["authenticated"], false);

    // Expired credential: swallowed, not rejected
    let expired = harness
        .jwt
        .issue_token(user_id, TOKEN_KIND_ACCESS, Duration::minutes(-5))
        .unwrap();
    let response = app
        .clone()
        .oneshot(get("/public/bulletins", Some(&expired)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["authenticated"], false);

    // Valid credential: identity attached
    let response = app
        .oneshot(get("/public/bulletins", Some(&harness.token_for(user_id))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["authenticated"], true);
}
