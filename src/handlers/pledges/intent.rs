use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{CurrentUser, Json};
use crate::models::{CreatePledge, PledgeStatus, normalize_currency};

use super::{owner_for, parse_amount};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntentRequest {
    #[serde(alias = "campaignSlug")]
    pub campaign: Option<String>,
    /// Tier id or title.
    #[serde(alias = "tierKey")]
    pub tier: Option<String>,
    pub label: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<Value>,
    pub return_to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub ok: bool,
    pub pledge_id: String,
}

/// POST /api/pledge/intent
///
/// Records the caller's intent to pledge before checkout starts. Every call
/// creates a fresh row; abandoned intents are simply never promoted.
pub async fn create_intent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<IntentRequest>,
) -> Result<Json<IntentResponse>> {
    let slug = req
        .campaign
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest(msg::MISSING_FIELDS.into()))?;
    let amount = req
        .amount
        .as_ref()
        .filter(|a| !a.is_null())
        .ok_or_else(|| AppError::BadRequest(msg::MISSING_FIELDS.into()))?;
    let amount_cents = parse_amount(amount)?;
    let currency = normalize_currency(req.currency.as_deref())?;

    let conn = state.db.get()?;
    let campaign = queries::get_campaign_by_slug(&conn, slug)?
        .or_not_found(msg::CAMPAIGN_NOT_FOUND)?;

    let tier = match req.tier.as_deref() {
        Some(key) => queries::find_tier(&conn, &campaign.id, key)?,
        None => None,
    };
    if tier.is_none() && req.tier.is_some() {
        tracing::debug!(campaign = %campaign.slug, tier = ?req.tier, "Unknown tier, pledging without one");
    }

    let owner = owner_for(&conn, &user)?;

    let mut metadata = Map::new();
    if let Some(return_to) = req.return_to.filter(|r| !r.trim().is_empty()) {
        metadata.insert("returnTo".into(), Value::String(return_to));
    }
    let label = req.label.or_else(|| tier.as_ref().map(|t| t.title.clone()));
    if let Some(label) = label {
        metadata.insert("label".into(), Value::String(label));
    }

    let pledge = queries::create_pledge(
        &conn,
        &CreatePledge {
            campaign_id: Some(campaign.id.clone()),
            tier_id: tier.map(|t| t.id),
            profile_id: Some(owner.profile_id),
            user_id: Some(owner.user_id),
            email: Some(owner.email),
            amount_cents,
            currency,
            status: PledgeStatus::Intent,
            paypal_order_id: None,
            paypal_capture_id: None,
            metadata: Value::Object(metadata),
        },
    )?;

    tracing::info!(
        pledge_id = %pledge.id,
        campaign = %campaign.slug,
        amount_cents,
        "Pledge intent created"
    );

    Ok(Json(IntentResponse {
        ok: true,
        pledge_id: pledge.id,
    }))
}
