// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login route tests.
//!
//! These tests verify that:
//! 1. A code exchange yields a credential bound to a linked user
//! 2. Repeated logins for the same Zalo ID reuse one user
//! 3. Missing codes are rejected before Zalo is called

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;
use zalo_bridge::config::Config;
use zalo_bridge::db::IdentityDirectory;
use zalo_bridge::middleware::auth::verify_session_token;

mod common;
use common::{body_json, create_test_app, create_test_app_with, FakeProvider};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_login_links_new_user() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/login?code=valid-code"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(set_cookie.starts_with("zalo_bridge_token="));
    assert!(set_cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap();
    let session = verify_session_token(token, &Config::test_default().jwt_signing_key).unwrap();

    let user = app
        .directory
        .get_user(&session.uid)
        .await
        .unwrap()
        .expect("user created");
    assert_eq!(user.zalo_uid.as_deref(), Some("4213458921"));
    assert_eq!(user.display_name, "Nguyen Van A");
}

#[tokio::test]
async fn test_repeated_login_reuses_user() {
    let app = create_test_app();
    let key = Config::test_default().jwt_signing_key;

    let mut uids = Vec::new();
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(get("/login?code=valid-code"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        uids.push(
            verify_session_token(body["token"].as_str().unwrap(), &key)
                .unwrap()
                .uid,
        );
    }

    assert_eq!(uids[0], uids[1]);
    assert_eq!(app.directory.user_count(), 1);
}

#[tokio::test]
async fn test_login_without_code_is_bad_request() {
    let app = create_test_app();

    for uri in ["/login", "/login?code=", "/login/v4"] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

        let body = body_json(response).await;
        assert_eq!(body["code"], "bad_request");
        assert!(body["error"].is_string());
    }

    assert_eq!(app.provider.call_count(), 0);
    assert_eq!(app.directory.user_count(), 0);
}

#[tokio::test]
async fn test_v4_login_uses_access_token() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/login/v4?code=user-access-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.provider.call_count(), 1);
    assert_eq!(app.directory.user_count(), 1);
}

#[tokio::test]
async fn test_unknown_login_version_rejected() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/login/v9?code=abc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.call_count(), 0);
}

#[tokio::test]
async fn test_rejected_code_is_unauthorized() {
    let provider = FakeProvider::with_profile("1", "A");
    *provider.fail_with_auth_error.lock().unwrap() = true;
    let app = create_test_app_with(provider);

    let response = app
        .router
        .clone()
        .oneshot(get("/login?code=expired"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "provider_auth");
    assert_eq!(app.directory.user_count(), 0);
}

#[tokio::test]
async fn test_public_routes_no_auth_required() {
    let app = create_test_app();

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/error")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"message":"TypeError: x is undefined"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/opt_out")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
