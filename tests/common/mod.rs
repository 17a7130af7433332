//! Test utilities and fixtures for Hemp'in Fund integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use jwt_simple::prelude::{Claims, Duration, HS256Key, MACLike};
use rusqlite::Connection;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub use hempin_fund::config::PayPalConfig;
pub use hempin_fund::db::{AppState, create_memory_pool, init_db, queries};
pub use hempin_fund::models::*;
pub use hempin_fund::payments::PayPalClient;
pub use hempin_fund::session::{SessionClaims, SessionVerifier};

pub const TEST_SECRET: &str = "test-session-secret-do-not-use";
pub const SITE_URL: &str = "http://fund.test";
pub const LOGIN_URL: &str = "http://auth.test/login";
pub const LAUNCH_SLUG: &str = "hempin-launch";

/// PayPal settings pointing at nothing; calls fail before any network I/O.
pub fn offline_paypal() -> PayPalConfig {
    PayPalConfig {
        api_base: "http://127.0.0.1:9".to_string(),
        ..Default::default()
    }
}

/// PayPal settings for a wiremock server, with credentials and a webhook id.
pub fn mock_paypal(api_base: &str) -> PayPalConfig {
    PayPalConfig {
        api_base: api_base.to_string(),
        client_id: Some("client-id".to_string()),
        secret: Some("client-secret".to_string()),
        webhook_id: Some("WH-TEST".to_string()),
    }
}

/// AppState over a single-connection in-memory database.
///
/// Tests must drop any connection they hold before sending a request, or the
/// handler will wait on the pool.
pub fn create_test_app_state_with(paypal: PayPalConfig) -> AppState {
    let pool = create_memory_pool().expect("Failed to create in-memory pool");
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        site_url: SITE_URL.to_string(),
        auth_login_url: LOGIN_URL.to_string(),
        default_campaign_slug: LAUNCH_SLUG.to_string(),
        dev_mode: true,
        sessions: Arc::new(SessionVerifier::new(Some(TEST_SECRET))),
        paypal: Arc::new(PayPalClient::new(paypal)),
    }
}

/// Bare in-memory database with the schema applied.
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

pub fn create_test_app_state() -> AppState {
    create_test_app_state_with(offline_paypal())
}

pub fn app(state: AppState) -> Router {
    hempin_fund::app(state)
}

/// Session token as the identity provider would issue it.
pub fn mint_token(user_id: &str, email: &str) -> String {
    let key = HS256Key::from_bytes(TEST_SECRET.as_bytes());
    let claims = Claims::with_custom_claims(
        SessionClaims {
            email: Some(email.to_string()),
        },
        Duration::from_hours(1),
    )
    .with_subject(user_id);
    key.authenticate(claims).unwrap()
}

/// The launch campaign with its four tiers: Seed $20, Sprout $50, Bloom $100, Canopy $250.
pub fn create_launch_campaign(conn: &Connection) -> (Campaign, Vec<Tier>) {
    let campaign = queries::create_campaign(
        conn,
        &CreateCampaign {
            slug: LAUNCH_SLUG.to_string(),
            title: "Hemp'in Launch".to_string(),
            goal_cents: 1_000_000,
            starts_at: None,
            ends_at: None,
        },
    )
    .expect("Failed to create campaign");

    let tiers = [("Seed", 2000), ("Sprout", 5000), ("Bloom", 10000), ("Canopy", 25000)]
        .into_iter()
        .map(|(title, amount_cents)| {
            queries::create_tier(
                conn,
                &campaign.id,
                &CreateTier {
                    title: title.to_string(),
                    amount_cents,
                },
            )
            .expect("Failed to create tier")
        })
        .collect();

    (campaign, tiers)
}

/// An intent pledge owned by `user_id`, created directly in the store.
pub fn create_intent_pledge(
    conn: &Connection,
    campaign: &Campaign,
    user_id: &str,
    email: &str,
    amount_cents: i64,
) -> Pledge {
    let profile = queries::link_profile_identity(conn, user_id, email).unwrap();
    queries::create_pledge(
        conn,
        &CreatePledge {
            campaign_id: Some(campaign.id.clone()),
            tier_id: None,
            profile_id: Some(profile.id),
            user_id: Some(user_id.to_string()),
            email: Some(email.to_string()),
            amount_cents,
            currency: "USD".to_string(),
            status: PledgeStatus::Intent,
            paypal_order_id: None,
            paypal_capture_id: None,
            metadata: serde_json::json!({}),
        },
    )
    .expect("Failed to create pledge")
}

pub fn json_request(method: &str, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("cookie", format!("sb-access-token={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Send one request through a fresh router and decode the JSON answer.
pub async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Redirect target of a response, if any.
pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

pub fn count_webhook_events(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM webhook_events", [], |row| row.get(0))
        .unwrap()
}

// ============ PayPal mock server ============

pub const MOCK_ACCESS_TOKEN: &str = "A21-test-access-token";

pub async fn mount_paypal_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": MOCK_ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 32400
        })))
        .mount(server)
        .await;
}

pub async fn mount_create_order(server: &MockServer, order_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v2/checkout/orders"))
        .and(header("authorization", format!("Bearer {}", MOCK_ACCESS_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": order_id,
            "status": "CREATED",
            "links": [
                { "href": format!("https://api.sandbox.paypal.com/v2/checkout/orders/{}", order_id), "rel": "self", "method": "GET" },
                { "href": format!("https://www.sandbox.paypal.com/checkoutnow?token={}", order_id), "rel": "approve", "method": "GET" }
            ]
        })))
        .mount(server)
        .await;
}

pub async fn mount_capture(server: &MockServer, order_id: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/v2/checkout/orders/{}/capture", order_id)))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_verify_signature(server: &MockServer, verification_status: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/notifications/verify-webhook-signature"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "verification_status": verification_status
        })))
        .mount(server)
        .await;
}

/// Order body as PayPal returns it from a successful capture.
pub fn completed_order(
    order_id: &str,
    pledge_id: &str,
    capture_id: &str,
    value: &str,
    campaign_slug: &str,
) -> Value {
    serde_json::json!({
        "id": order_id,
        "status": "COMPLETED",
        "payer": { "email_address": "buyer@paypal.test" },
        "purchase_units": [{
            "reference_id": pledge_id,
            "custom_id": campaign_slug,
            "payments": { "captures": [{
                "id": capture_id,
                "status": "COMPLETED",
                "amount": { "currency_code": "USD", "value": value }
            }]}
        }]
    })
}

/// A `PAYMENT.CAPTURE.COMPLETED` delivery body.
pub fn capture_completed_event(capture_id: &str, order_id: &str, value: &str) -> Value {
    serde_json::json!({
        "id": format!("WH-{}", capture_id),
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": {
            "id": capture_id,
            "status": "COMPLETED",
            "amount": { "currency_code": "USD", "value": value },
            "custom_id": LAUNCH_SLUG,
            "supplementary_data": { "related_ids": { "order_id": order_id } }
        }
    })
}

/// Headers PayPal sends with every webhook delivery.
pub fn webhook_request(body: &Value) -> Request<Body> {
    webhook_request_raw(&body.to_string())
}

/// Delivery with a body sent exactly as given.
pub fn webhook_request_raw(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/paypal")
        .header("content-type", "application/json")
        .header("paypal-auth-algo", "SHA256withRSA")
        .header("paypal-cert-url", "https://api.sandbox.paypal.com/v1/notifications/certs/CERT")
        .header("paypal-transmission-id", "b2384410-f8d2-11ee-8d5a-1f32f6b3f2e0")
        .header("paypal-transmission-sig", "c2lnbmF0dXJl")
        .header("paypal-transmission-time", "2026-10-16T10:00:00Z")
        .body(Body::from(body.to_string()))
        .unwrap()
}
