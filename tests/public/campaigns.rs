//! Tests for GET /api/campaigns/{slug} and /api/campaigns/{slug}/totals.

use axum::http::StatusCode;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn set_status(conn: &rusqlite::Connection, pledge: &Pledge, status: PledgeStatus, amount_cents: i64) {
    let mut updated = pledge.clone();
    updated.status = status;
    updated.amount_cents = amount_cents;
    queries::update_pledge(conn, &updated).unwrap();
}

#[tokio::test]
async fn test_campaign_read_lists_tiers_and_totals() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        create_launch_campaign(&conn);
    }

    let (status, body) = send(&state, get_request("/api/campaigns/hempin-launch", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["campaign"]["slug"], "hempin-launch");

    let tiers = body["tiers"].as_array().unwrap();
    let titles: Vec<&str> = tiers.iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Seed", "Sprout", "Bloom", "Canopy"]);
    assert_eq!(body["totals"]["raised_cents"], 0);
    assert_eq!(body["totals"]["backers"], 0);
}

#[tokio::test]
async fn test_unknown_campaign_is_not_found() {
    let state = create_test_app_state();

    let (status, body) = send(&state, get_request("/api/campaigns/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Campaign not found");

    let (status, _) = send(&state, get_request("/api/campaigns/nope/totals", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_totals_count_only_successful_pledges() {
    let state = create_test_app_state();
    {
        let conn = state.db.get().unwrap();
        let (campaign, _) = create_launch_campaign(&conn);

        // Same backer twice, both paid
        let a1 = create_intent_pledge(&conn, &campaign, "user-a", "a@example.com", 2000);
        set_status(&conn, &a1, PledgeStatus::Captured, 2000);
        let a2 = create_intent_pledge(&conn, &campaign, "user-a", "a@example.com", 5000);
        set_status(&conn, &a2, PledgeStatus::Paid, 4999);

        // Second backer, paid then refunded
        let b = create_intent_pledge(&conn, &campaign, "user-b", "b@example.com", 10000);
        set_status(&conn, &b, PledgeStatus::Refunded, 10000);

        // Third backer, still an intent
        create_intent_pledge(&conn, &campaign, "user-c", "c@example.com", 25000);
    }

    let (status, body) = send(&state, get_request("/api/campaigns/hempin-launch/totals", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["raised"], 69.99);
    assert_eq!(body["backers"], 1);
    assert_eq!(body["goal"], 10000.0);
}
