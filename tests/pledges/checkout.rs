//! Tests for the server-side PayPal checkout: order creation, the return URL
//! capture, and cancellation.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::MockServer;

#[path = "../common/mod.rs"]
mod common;
use common::*;

const USER: &str = "p1-user";
const EMAIL: &str = "a@b.com";

async fn setup(server: &MockServer) -> (AppState, Pledge) {
    let state = create_test_app_state_with(mock_paypal(&server.uri()));
    let pledge = {
        let conn = state.db.get().unwrap();
        let (campaign, _) = create_launch_campaign(&conn);
        create_intent_pledge(&conn, &campaign, USER, EMAIL, 2000)
    };
    mount_paypal_token(server).await;
    (state, pledge)
}

fn attach_order(state: &AppState, pledge: &Pledge, order_id: &str) {
    let conn = state.db.get().unwrap();
    queries::set_pledge_order_id(&conn, &pledge.id, order_id).unwrap();
}

#[tokio::test]
async fn test_create_paypal_order_for_intent() {
    let server = MockServer::start().await;
    let (state, pledge) = setup(&server).await;
    mount_create_order(&server, "ORDER-1").await;
    let token = mint_token(USER, EMAIL);

    let body = json!({ "pledgeId": pledge.id });
    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/paypal", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["orderId"], "ORDER-1");
    assert_eq!(
        resp["approvalUrl"],
        "https://www.sandbox.paypal.com/checkoutnow?token=ORDER-1"
    );

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.paypal_order_id.as_deref(), Some("ORDER-1"));
    assert_eq!(stored.status, PledgeStatus::Intent);

    // What PayPal was asked to charge
    let requests = server.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.url.path() == "/v2/checkout/orders")
        .unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
    let unit = &sent["purchase_units"][0];
    assert_eq!(sent["intent"], "CAPTURE");
    assert_eq!(unit["reference_id"], pledge.id.as_str());
    assert_eq!(unit["custom_id"], LAUNCH_SLUG);
    assert_eq!(unit["amount"]["value"], "20.00");
    assert_eq!(unit["amount"]["currency_code"], "USD");
    assert_eq!(sent["application_context"]["brand_name"], "Hemp'in Fund");
    assert_eq!(
        sent["application_context"]["return_url"],
        "http://fund.test/api/paypal/capture"
    );
    assert_eq!(
        sent["application_context"]["cancel_url"],
        "http://fund.test/api/paypal/cancel"
    );
}

#[tokio::test]
async fn test_create_paypal_order_only_for_own_intent() {
    let server = MockServer::start().await;
    let (state, pledge) = setup(&server).await;
    mount_create_order(&server, "ORDER-1").await;

    let intruder = mint_token("someone-else", "x@example.com");
    let body = json!({ "pledgeId": pledge.id });
    let (status, _) =
        send(&state, json_request("POST", "/api/pledge/paypal", &body, Some(&intruder))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    {
        let conn = state.db.get().unwrap();
        let mut captured = pledge.clone();
        captured.status = PledgeStatus::Captured;
        queries::update_pledge(&conn, &captured).unwrap();
    }
    let token = mint_token(USER, EMAIL);
    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/paypal", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["ok"], false);
}

#[tokio::test]
async fn test_create_paypal_order_without_credentials() {
    let state = create_test_app_state();
    let pledge = {
        let conn = state.db.get().unwrap();
        let (campaign, _) = create_launch_campaign(&conn);
        create_intent_pledge(&conn, &campaign, USER, EMAIL, 2000)
    };
    let token = mint_token(USER, EMAIL);

    let body = json!({ "pledgeId": pledge.id });
    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/paypal", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp["ok"], false);

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert!(stored.paypal_order_id.is_none());
}

#[tokio::test]
async fn test_paypal_error_message_is_surfaced() {
    let server = MockServer::start().await;
    let (state, pledge) = setup(&server).await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/v2/checkout/orders"))
        .respond_with(wiremock::ResponseTemplate::new(400).set_body_json(json!({
            "name": "INVALID_REQUEST",
            "message": "Request is not well-formed",
            "details": [{ "issue": "INVALID_PARAMETER_VALUE" }]
        })))
        .mount(&server)
        .await;
    let token = mint_token(USER, EMAIL);

    let body = json!({ "pledgeId": pledge.id });
    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/paypal", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        resp["error"]
            .as_str()
            .unwrap()
            .contains("Request is not well-formed")
    );
}

#[tokio::test]
async fn test_return_without_session_redirects_to_login() {
    let state = create_test_app_state();

    let response = app(state)
        .oneshot(get_request("/api/paypal/capture?token=ORDER-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).unwrap(),
        "http://auth.test/login?next=http%3A%2F%2Ffund.test%2Fapi%2Fpaypal%2Fcapture%3Ftoken%3DORDER-1"
    );
}

#[tokio::test]
async fn test_return_captures_and_marks_paid() {
    let server = MockServer::start().await;
    let (state, pledge) = setup(&server).await;
    attach_order(&state, &pledge, "ORDER-1");
    mount_capture(
        &server,
        "ORDER-1",
        201,
        completed_order("ORDER-1", &pledge.id, "CAP-1", "19.99", LAUNCH_SLUG),
    )
    .await;
    let token = mint_token(USER, EMAIL);

    let response = app(state.clone())
        .oneshot(get_request("/api/paypal/capture?token=ORDER-1", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).unwrap(),
        format!("http://fund.test/campaigns/hempin-launch/thanks?pledge={}", pledge.id)
    );

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Paid);
    assert_eq!(stored.amount_cents, 1999);
    assert_eq!(stored.paypal_capture_id.as_deref(), Some("CAP-1"));
    assert_eq!(stored.metadata["via"], "redirect");
    assert_eq!(queries::count_pledges(&conn).unwrap(), 1);
}

#[tokio::test]
async fn test_return_with_declined_capture_redirects_with_code() {
    let server = MockServer::start().await;
    let (state, pledge) = setup(&server).await;
    attach_order(&state, &pledge, "ORDER-1");
    mount_capture(
        &server,
        "ORDER-1",
        422,
        json!({
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The instrument presented was either declined or expired",
            "details": [{ "issue": "INSTRUMENT_DECLINED" }]
        }),
    )
    .await;
    let token = mint_token(USER, EMAIL);

    let response = app(state.clone())
        .oneshot(get_request("/api/paypal/capture?token=ORDER-1", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).unwrap(),
        "http://fund.test/campaigns/hempin-launch?pay_error=declined"
    );

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Intent);
}

#[tokio::test]
async fn test_return_without_token_is_invalid() {
    let state = create_test_app_state();
    let token = mint_token(USER, EMAIL);

    let response = app(state)
        .oneshot(get_request("/api/paypal/capture", Some(&token)))
        .await
        .unwrap();
    assert_eq!(
        location(&response).unwrap(),
        "http://fund.test/campaigns/hempin-launch?pay_error=invalid"
    );
}

#[tokio::test]
async fn test_cancel_redirects_back_to_campaign() {
    let state = create_test_app_state();

    let response = app(state)
        .oneshot(get_request("/api/paypal/cancel?token=ORDER-9", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response).unwrap(),
        "http://fund.test/campaigns/hempin-launch?pay_error=cancelled"
    );
}
