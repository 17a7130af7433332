//! Tests for POST /api/pledge/capture (client-reported capture).

use axum::http::StatusCode;
use serde_json::json;

#[path = "../common/mod.rs"]
mod common;
use common::*;

const USER: &str = "p1-user";
const EMAIL: &str = "a@b.com";

fn setup_intent(amount_cents: i64) -> (AppState, Campaign, Pledge) {
    let state = create_test_app_state();
    let (campaign, pledge) = {
        let conn = state.db.get().unwrap();
        let (campaign, _) = create_launch_campaign(&conn);
        let pledge = create_intent_pledge(&conn, &campaign, USER, EMAIL, amount_cents);
        (campaign, pledge)
    };
    (state, campaign, pledge)
}

#[tokio::test]
async fn test_capture_requires_session() {
    let (state, _, pledge) = setup_intent(2000);
    let body = json!({ "pledgeId": pledge.id, "orderId": "O1", "amount": "20.00" });

    let (status, _) = send(&state, json_request("POST", "/api/pledge/capture", &body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Intent);
}

#[tokio::test]
async fn test_capture_with_matching_amount() {
    let (state, _, pledge) = setup_intent(2000);
    let token = mint_token(USER, EMAIL);
    let body = json!({ "pledgeId": pledge.id, "orderId": "O1", "status": "COMPLETED", "amount": "20.00" });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["pledgeId"], pledge.id.as_str());
    assert_eq!(resp["status"], "captured");
    assert_eq!(resp["applied"], true);

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Captured);
    assert_eq!(stored.paypal_order_id.as_deref(), Some("O1"));
    assert_eq!(stored.amount_cents, 2000);
    assert_eq!(stored.metadata["via"], "client");
}

#[tokio::test]
async fn test_capture_amount_overrides_requested_amount() {
    let (state, _, pledge) = setup_intent(2000);
    let token = mint_token(USER, EMAIL);
    let raw = json!({
        "id": "O2",
        "status": "COMPLETED",
        "purchase_units": [{
            "reference_id": pledge.id,
            "payments": { "captures": [{
                "id": "CAP-2",
                "status": "COMPLETED",
                "amount": { "currency_code": "USD", "value": "19.99" }
            }]}
        }]
    });
    let body = json!({ "pledgeId": pledge.id, "orderId": "O2", "amount": 20, "raw": raw });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["applied"], true);

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.amount_cents, 1999);
    assert_eq!(stored.paypal_capture_id.as_deref(), Some("CAP-2"));
    assert_eq!(stored.metadata["paypal"]["id"], "O2");
}

#[tokio::test]
async fn test_capture_awards_leaves_once() {
    let (state, _, pledge) = setup_intent(2000);
    let token = mint_token(USER, EMAIL);
    let body = json!({ "pledgeId": pledge.id, "orderId": "O1", "amount": "20.00" });

    let (_, first) = send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(first["applied"], true);
    let (status, second) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["applied"], true);
    assert_eq!(second["status"], "captured");

    let conn = state.db.get().unwrap();
    let profile = queries::get_profile_by_user_id(&conn, USER).unwrap().unwrap();
    assert_eq!(profile.leaf_total, 2);
    let ledger = queries::list_ledger_for_profile(&conn, &profile.id).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].event_type, LedgerEventType::PaymentCapture);
    assert_eq!(ledger[0].external_id.as_deref(), Some("O1"));
    assert_eq!(ledger[0].campaign_slug.as_deref(), Some(LAUNCH_SLUG));
}

#[tokio::test]
async fn test_capture_without_pledge_id_inserts_fallback_row() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_launch_campaign(&conn);
    }
    let token = mint_token(USER, EMAIL);
    let raw = json!({
        "id": "O3",
        "status": "COMPLETED",
        "purchase_units": [{
            "custom_id": LAUNCH_SLUG,
            "payments": { "captures": [{
                "id": "CAP-3",
                "amount": { "currency_code": "USD", "value": "50.00" }
            }]}
        }]
    });
    let body = json!({ "orderId": "O3", "raw": raw });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["status"], "captured");

    let conn = state.db.get().unwrap();
    let pledge = queries::get_pledge_by_order_id(&conn, "O3").unwrap().unwrap();
    assert_eq!(pledge.id, resp["pledgeId"].as_str().unwrap());
    assert_eq!(pledge.amount_cents, 5000);
    assert_eq!(pledge.paypal_capture_id.as_deref(), Some("CAP-3"));
    assert_eq!(pledge.user_id.as_deref(), Some(USER));
    assert!(pledge.campaign_id.is_some());
    assert_eq!(pledge.metadata["via"], "client_insert");
    assert_eq!(queries::count_pledges(&conn).unwrap(), 1);
}

#[tokio::test]
async fn test_capture_requires_order_id() {
    let (state, _, pledge) = setup_intent(2000);
    let token = mint_token(USER, EMAIL);
    let body = json!({ "pledgeId": pledge.id, "amount": "20.00" });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["ok"], false);
}

#[tokio::test]
async fn test_capture_cannot_touch_another_users_pledge() {
    let (state, _, pledge) = setup_intent(2000);
    let intruder = mint_token("someone-else", "x@example.com");
    let body = json!({ "pledgeId": pledge.id, "orderId": "O1", "amount": "20.00" });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&intruder))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(resp["ok"], false);

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Intent);
    assert!(stored.paypal_order_id.is_none());
}

#[tokio::test]
async fn test_capture_on_refunded_pledge_is_not_applied() {
    let (state, _, pledge) = setup_intent(2000);
    {
        let conn = state.db.get().unwrap();
        let mut refunded = pledge.clone();
        refunded.status = PledgeStatus::Refunded;
        refunded.paypal_order_id = Some("O1".into());
        queries::update_pledge(&conn, &refunded).unwrap();
    }
    let token = mint_token(USER, EMAIL);
    let body = json!({ "pledgeId": pledge.id, "orderId": "O1", "amount": "20.00" });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["applied"], false);
    assert_eq!(resp["status"], "refunded");

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Refunded);
}

#[tokio::test]
async fn test_declined_capture_marks_pledge_denied() {
    let (state, _, pledge) = setup_intent(2000);
    let token = mint_token(USER, EMAIL);
    let body = json!({ "pledgeId": pledge.id, "orderId": "O1", "status": "DECLINED", "amount": "1.00" });

    let (status, resp) =
        send(&state, json_request("POST", "/api/pledge/capture", &body, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["status"], "denied");

    let conn = state.db.get().unwrap();
    let stored = queries::get_pledge_by_id(&conn, &pledge.id).unwrap().unwrap();
    assert_eq!(stored.status, PledgeStatus::Denied);
    // Failure facts never rewrite the amount
    assert_eq!(stored.amount_cents, 2000);
    let profile = queries::get_profile_by_user_id(&conn, USER).unwrap().unwrap();
    assert_eq!(profile.leaf_total, 0);
}
