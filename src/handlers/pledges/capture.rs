use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::extractors::{CurrentUser, Json};
use crate::models::{PledgeStatus, normalize_currency};
use crate::payments::facts_from_order;
use crate::reconcile::{self, CaptureRequest, Entry, Lookup, Outcome};

use super::{owner_for, parse_amount};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureBody {
    pub pledge_id: Option<String>,
    pub order_id: Option<String>,
    pub capture_id: Option<String>,
    /// Status PayPal reported to the browser.
    pub status: Option<String>,
    pub amount: Option<Value>,
    pub currency: Option<String>,
    /// The order object returned by the client-side capture, if forwarded.
    pub raw: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub ok: bool,
    pub pledge_id: String,
    pub status: PledgeStatus,
    /// False when the pledge was already past the reported state.
    pub applied: bool,
}

/// Map the client-reported provider status onto a pledge status.
fn observed_status(raw: Option<&str>) -> Result<PledgeStatus> {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        None | Some("") | Some("COMPLETED") => Ok(PledgeStatus::Captured),
        Some("DECLINED" | "DENIED" | "FAILED") => Ok(PledgeStatus::Denied),
        Some(other) => Err(AppError::BadRequest(format!(
            "Capture status {} cannot be recorded",
            other
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/pledge/capture
///
/// The browser reports a capture it completed with PayPal. The provider's
/// captured amount replaces whatever the intent asked for.
pub async fn capture_pledge(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CaptureBody>,
) -> Result<Json<CaptureResponse>> {
    let status = observed_status(body.status.as_deref())?;

    let raw = body.raw.as_ref().filter(|r| r.is_object()).unwrap_or(&Value::Null);
    let mut facts = facts_from_order(raw, status);

    facts.order_id = non_empty(body.order_id).or(facts.order_id);
    if facts.order_id.is_none() {
        return Err(AppError::BadRequest(msg::MISSING_ORDER_ID.into()));
    }
    facts.capture_id = non_empty(body.capture_id).or(facts.capture_id);
    if facts.amount_cents.is_none()
        && let Some(amount) = &body.amount
    {
        facts.amount_cents = Some(parse_amount(amount)?);
    }
    if facts.currency.is_none() {
        facts.currency = Some(normalize_currency(body.currency.as_deref())?);
    }
    if !status.is_success() {
        facts.amount_cents = None;
    }

    let pledge_id = non_empty(body.pledge_id);

    let mut conn = state.db.get()?;
    let owner = owner_for(&conn, &user)?;
    let request = CaptureRequest {
        facts: &facts,
        lookup: match pledge_id.as_deref() {
            Some(id) => Lookup::Pledge(id),
            None => Lookup::CaptureThenOrder,
        },
        owner: Some(&owner),
        entry: Entry::Client,
        allow_fallback: pledge_id.is_none(),
    };

    let outcome = reconcile::apply_capture(&mut conn, &request)?;
    let applied = outcome.applied();
    let pledge = match outcome {
        Outcome::NotFound => return Err(AppError::NotFound(msg::PLEDGE_NOT_FOUND.into())),
        Outcome::Updated(p) | Outcome::Created(p) | Outcome::Unchanged(p) => p,
        Outcome::Rejected { pledge, .. } => pledge,
    };

    Ok(Json(CaptureResponse {
        ok: true,
        pledge_id: pledge.id,
        status: pledge.status,
        applied,
    }))
}
