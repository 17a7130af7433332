use axum::extract::State;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{Campaign, CampaignTotals, Tier};

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub ok: bool,
    pub campaign: Campaign,
    pub tiers: Vec<Tier>,
    pub totals: CampaignTotals,
}

/// GET /api/campaigns/{slug}
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CampaignResponse>> {
    let conn = state.db.get()?;
    let campaign = queries::get_campaign_by_slug(&conn, &slug)?
        .or_not_found(msg::CAMPAIGN_NOT_FOUND)?;
    let tiers = queries::list_tiers(&conn, &campaign.id)?;
    let totals = queries::campaign_totals(&conn, &slug)?
        .or_not_found(msg::CAMPAIGN_NOT_FOUND)?;

    Ok(Json(CampaignResponse {
        ok: true,
        campaign,
        tiers,
        totals,
    }))
}

#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub ok: bool,
    /// Decimal currency units.
    pub raised: f64,
    pub backers: i64,
    pub goal: f64,
}

/// GET /api/campaigns/{slug}/totals
pub async fn get_campaign_totals(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<TotalsResponse>> {
    let conn = state.db.get()?;
    let totals = queries::campaign_totals(&conn, &slug)?
        .or_not_found(msg::CAMPAIGN_NOT_FOUND)?;

    Ok(Json(TotalsResponse {
        ok: true,
        raised: totals.raised_cents as f64 / 100.0,
        backers: totals.backers,
        goal: totals.goal_cents as f64 / 100.0,
    }))
}
