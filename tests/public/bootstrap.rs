//! Tests for the session probe, health, and the dev whoami endpoint.

use axum::http::StatusCode;
use tower::ServiceExt;

#[path = "../common/mod.rs"]
mod common;
use common::*;

#[tokio::test]
async fn test_bootstrap_anonymous() {
    let state = create_test_app_state();

    let response = app(state).oneshot(get_request("/api/bootstrap", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers.get("cache-control").unwrap(),
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    assert_eq!(headers.get("pragma").unwrap(), "no-cache");
    assert_eq!(headers.get("vary").unwrap(), "Cookie");

    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["signedIn"], false);
    assert!(body["user"].is_null());
}

#[tokio::test]
async fn test_bootstrap_reads_session_cookie() {
    let state = create_test_app_state();
    let token = mint_token("user-1", "Person@Example.com");

    let (status, body) = send(&state, get_request("/api/bootstrap", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signedIn"], true);
    assert_eq!(body["user"]["id"], "user-1");
    assert_eq!(body["user"]["email"], "person@example.com");
}

#[tokio::test]
async fn test_bootstrap_ignores_forged_token() {
    let state = create_test_app_state();
    let forged = {
        use jwt_simple::prelude::*;
        let key = HS256Key::from_bytes(b"some-other-secret");
        let claims = Claims::with_custom_claims(
            SessionClaims {
                email: Some("x@example.com".into()),
            },
            Duration::from_hours(1),
        )
        .with_subject("intruder");
        key.authenticate(claims).unwrap()
    };

    let (status, body) = send(&state, get_request("/api/bootstrap", Some(&forged))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signedIn"], false);
}

#[tokio::test]
async fn test_health() {
    let state = create_test_app_state();

    let (status, body) = send(&state, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_whoami_only_in_dev_mode() {
    let mut state = create_test_app_state();
    let token = mint_token("user-1", "person@example.com");

    let response = app(state.clone())
        .oneshot(get_request("/api/debug/whoami", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("vary").unwrap(), "Cookie");
    let body = body_json(response).await;
    assert_eq!(body["sessionEnabled"], true);
    assert_eq!(body["user"]["id"], "user-1");
    assert!(body["profile"].is_null());

    state.dev_mode = false;
    let response = app(state)
        .oneshot(get_request("/api/debug/whoami", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
