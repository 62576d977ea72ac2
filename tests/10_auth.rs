mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{post_json, send, test_app, token_for, StubRoster, StubService};

#[tokio::test]
async fn health_is_public() {
    let app = test_app(Arc::new(StubService::default()), StubRoster::default());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "not configured");
}

#[tokio::test]
async fn provisioning_requires_a_token() {
    let app = test_app(Arc::new(StubService::default()), StubRoster::default());

    let request = post_json("/api/provision/preview", None, json!({ "emails": "a@x.com" }));
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn provisioning_rejects_tokens_signed_with_another_secret() {
    let app = test_app(Arc::new(StubService::default()), StubRoster::default());
    let claims = portal_provisioning::auth::Claims::new(
        uuid::Uuid::new_v4(),
        "a@x.com".into(),
        "admin".into(),
    );
    let forged = portal_provisioning::auth::generate_jwt(&claims, "some-other-secret").unwrap();

    let body = json!({ "emails": "a@x.com" });
    let request = post_json("/api/provision/preview", Some(&forged), body);
    let (status, _) = send(app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn provisioning_requires_an_admin_role() {
    let service = Arc::new(StubService::default());
    let app = test_app(service.clone(), StubRoster::default());
    let token = token_for("individual");

    let (status, body) = send(
        app,
        post_json(
            "/api/provision/memberships",
            Some(&token),
            json!({ "emails": "a@x.com", "membership_type": "basic" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(service.record_count(), 0);
}

#[tokio::test]
async fn super_admin_is_accepted() {
    let app = test_app(Arc::new(StubService::default()), StubRoster::default());
    let token = token_for("super_admin");

    let request = post_json("/api/provision/preview", Some(&token), json!({ "emails": "a@x.com" }));
    let (status, _) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
}
