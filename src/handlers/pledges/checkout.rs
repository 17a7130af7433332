//! Server-side PayPal checkout: order creation, the approval return URL and
//! the cancel URL.

use axum::{
    extract::{OriginalUri, State},
    response::Redirect,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{CurrentUser, Json, MaybeUser, Query};
use crate::models::{Pledge, PledgeStatus};
use crate::payments::{OrderRequest, PayErrorCode, facts_from_order, order_capture_status};
use crate::reconcile::{self, CaptureRequest, Entry, Lookup};
use crate::session::{SessionUser, login_redirect_url};

use super::owner_for;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalOrderRequest {
    pub pledge_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalOrderResponse {
    pub ok: bool,
    pub order_id: String,
    pub approval_url: String,
}

fn campaign_slug_of(conn: &Connection, pledge: &Pledge) -> Result<Option<String>> {
    match pledge.campaign_id.as_deref() {
        Some(id) => Ok(queries::get_campaign_by_id(conn, id)?.map(|c| c.slug)),
        None => Ok(None),
    }
}

/// POST /api/pledge/paypal
///
/// Opens a PayPal order for one of the caller's intent pledges.
pub async fn create_paypal_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<PayPalOrderRequest>,
) -> Result<Json<PayPalOrderResponse>> {
    let order = {
        let conn = state.db.get()?;
        let pledge = queries::get_pledge_for_user(&conn, &req.pledge_id, &user.id)?
            .or_not_found(msg::PLEDGE_NOT_FOUND)?;
        if pledge.status != PledgeStatus::Intent {
            return Err(AppError::BadRequest(msg::PLEDGE_NOT_INTENT.into()));
        }
        let campaign_slug = campaign_slug_of(&conn, &pledge)?;
        let label = pledge
            .metadata
            .get("label")
            .and_then(|v| v.as_str())
            .unwrap_or("Pledge");

        OrderRequest {
            reference_id: pledge.id.clone(),
            description: format!("{} ({})", label, campaign_slug.as_deref().unwrap_or("fund")),
            campaign_slug,
            amount_cents: pledge.amount_cents,
            currency: pledge.currency.clone(),
            return_url: format!("{}/api/paypal/capture", state.site_url),
            cancel_url: format!("{}/api/paypal/cancel", state.site_url),
        }
    };

    let created = state.paypal.create_order(&order).await?;

    let conn = state.db.get()?;
    queries::set_pledge_order_id(&conn, &order.reference_id, &created.id)?
        .or_not_found(msg::PLEDGE_NOT_FOUND)?;

    tracing::info!(
        pledge_id = %order.reference_id,
        order_id = %created.id,
        "PayPal order created"
    );

    Ok(Json(PayPalOrderResponse {
        ok: true,
        order_id: created.id,
        approval_url: created.approval_url,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReturnQuery {
    /// PayPal passes the order id as `token`.
    pub token: Option<String>,
}

fn campaign_url(state: &AppState, slug: &str) -> String {
    format!("{}/campaigns/{}", state.site_url, urlencoding::encode(slug))
}

fn pay_error_redirect(state: &AppState, slug: &str, code: PayErrorCode) -> Redirect {
    Redirect::to(&format!(
        "{}?pay_error={}",
        campaign_url(state, slug),
        code.as_ref()
    ))
}

/// Campaign the order's pledge belongs to, else the default campaign.
fn slug_for_order(state: &AppState, order_id: Option<&str>) -> Result<String> {
    let conn = state.db.get()?;
    let pledge = match order_id {
        Some(order_id) => queries::get_pledge_by_order_id(&conn, order_id)?,
        None => None,
    };
    let slug = match pledge {
        Some(pledge) => campaign_slug_of(&conn, &pledge)?,
        None => None,
    };
    Ok(slug.unwrap_or_else(|| state.default_campaign_slug.clone()))
}

/// GET /api/paypal/capture?token=<orderId>
///
/// PayPal sends the buyer here after approval. The order is captured
/// server-side and the pledge is reconciled for the signed-in owner.
pub async fn paypal_return(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ReturnQuery>,
) -> Redirect {
    let Some(user) = user else {
        let here = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/api/paypal/capture");
        let next = format!("{}{}", state.site_url, here);
        return Redirect::to(&login_redirect_url(&state.auth_login_url, &next));
    };

    let order_id = query
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    match complete_checkout(&state, &user, order_id.as_deref()).await {
        Ok(redirect) => redirect,
        Err(e) => {
            tracing::error!(order_id = ?order_id, "PayPal return failed: {}", e);
            pay_error_redirect(&state, &state.default_campaign_slug, PayErrorCode::Unknown)
        }
    }
}

async fn complete_checkout(
    state: &AppState,
    user: &SessionUser,
    order_id: Option<&str>,
) -> Result<Redirect> {
    let slug = slug_for_order(state, order_id)?;
    let Some(order_id) = order_id else {
        return Ok(pay_error_redirect(state, &slug, PayErrorCode::Invalid));
    };

    let order = match state.paypal.capture_order(order_id).await {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(order_id, "PayPal capture failed: {}", e);
            return Ok(pay_error_redirect(state, &slug, e.pay_error_code()));
        }
    };

    match order_capture_status(&order) {
        (Some("COMPLETED"), None | Some("COMPLETED")) => {}
        (_, Some("DECLINED" | "FAILED")) => {
            return Ok(pay_error_redirect(state, &slug, PayErrorCode::Declined));
        }
        (order_status, capture_status) => {
            tracing::warn!(order_id, ?order_status, ?capture_status, "PayPal order not completed");
            return Ok(pay_error_redirect(state, &slug, PayErrorCode::Unknown));
        }
    }

    let facts = facts_from_order(&order, PledgeStatus::Paid);

    let mut conn = state.db.get()?;
    let owner = owner_for(&conn, user)?;
    let request = CaptureRequest {
        facts: &facts,
        lookup: match facts.reference_id.as_deref() {
            Some(pledge_id) => Lookup::Pledge(pledge_id),
            None => Lookup::CaptureThenOrder,
        },
        owner: Some(&owner),
        entry: Entry::Redirect,
        allow_fallback: facts.reference_id.is_none(),
    };
    let outcome = reconcile::apply_capture(&mut conn, &request)?;

    let Some(pledge) = outcome.pledge() else {
        return Ok(pay_error_redirect(state, &slug, PayErrorCode::Unknown));
    };
    let slug = facts
        .campaign_slug
        .clone()
        .or(campaign_slug_of(&conn, pledge)?)
        .unwrap_or(slug);

    Ok(Redirect::to(&format!(
        "{}/thanks?pledge={}",
        campaign_url(state, &slug),
        urlencoding::encode(&pledge.id)
    )))
}

/// GET /api/paypal/cancel
pub async fn paypal_cancel(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
) -> Result<Redirect> {
    let slug = slug_for_order(&state, query.token.as_deref())?;
    tracing::info!(order_id = ?query.token, "PayPal checkout cancelled");
    Ok(pay_error_redirect(&state, &slug, PayErrorCode::Cancelled))
}
