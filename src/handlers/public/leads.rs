use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::models::{
    CreateLead, CreateLedgerEntry, CreateProfile, CreateWorkForm, LeadRole, LedgerEventType,
    normalize_email,
};

const DEFAULT_LEAD_SOURCE: &str = "fund.hempin.org";
const DEFAULT_FORM_SOURCE: &str = "fund.hempin.org#workform1";

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeadRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub source: Option<String>,
    /// Honeypot. Humans never see this field.
    pub company: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct LeadResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedupe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honey: Option<bool>,
}

/// POST /api/lead
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(req): Json<LeadRequest>,
) -> Result<Json<LeadResponse>> {
    if non_empty(req.company).is_some() {
        tracing::debug!("Lead honeypot tripped, discarding");
        return Ok(Json(LeadResponse {
            ok: true,
            honey: Some(true),
            ..Default::default()
        }));
    }

    let email = normalize_email(req.email.as_deref().unwrap_or_default())?;
    let role = match non_empty(req.role) {
        Some(role) => LeadRole::parse(&role)?,
        None => LeadRole::Life,
    };
    let source = non_empty(req.source).unwrap_or_else(|| DEFAULT_LEAD_SOURCE.to_string());

    let conn = state.db.get()?;
    let lead = queries::insert_lead(&conn, &CreateLead { email, role, source })?;

    let response = if lead.was_created() {
        tracing::info!(role = role.as_ref(), "Lead captured");
        LeadResponse {
            ok: true,
            inserted: Some(true),
            ..Default::default()
        }
    } else {
        LeadResponse {
            ok: true,
            dedupe: Some(true),
            ..Default::default()
        }
    };
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorkFormRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub website: Option<String>,
    pub message: Option<String>,
    pub role: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// POST /api/form
pub async fn submit_work_form(
    State(state): State<AppState>,
    Json(req): Json<WorkFormRequest>,
) -> Result<Json<OkResponse>> {
    let (Some(name), Some(email)) = (non_empty(req.name), non_empty(req.email)) else {
        return Err(AppError::BadRequest(msg::MISSING_FIELDS.into()));
    };
    let email = normalize_email(&email)?;
    // Anything that is not explicitly LIFE is a work enquiry.
    let role = match non_empty(req.role).map(|r| r.to_uppercase()).as_deref() {
        Some("LIFE") => LeadRole::Life,
        _ => LeadRole::Work,
    };

    let conn = state.db.get()?;
    let form = queries::insert_work_form(
        &conn,
        &CreateWorkForm {
            name,
            email,
            company: non_empty(req.company),
            website: non_empty(req.website),
            message: non_empty(req.message).unwrap_or_default(),
            role,
            source: non_empty(req.source).unwrap_or_else(|| DEFAULT_FORM_SOURCE.to_string()),
        },
    )?;
    tracing::info!(form_id = %form.id, "Work form received");

    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailCaptureRequest {
    pub email: Option<String>,
    pub campaign_slug: Option<String>,
    pub tier_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailCaptureResponse {
    pub ok: bool,
    pub profile_id: String,
}

/// POST /api/email-capture
///
/// Ensures a profile for the address and awards one leaf per campaign.
pub async fn capture_email(
    State(state): State<AppState>,
    Json(req): Json<EmailCaptureRequest>,
) -> Result<Json<EmailCaptureResponse>> {
    let email = normalize_email(req.email.as_deref().unwrap_or_default())?;
    let (Some(campaign_slug), Some(tier_key)) =
        (non_empty(req.campaign_slug), non_empty(req.tier_key))
    else {
        return Err(AppError::BadRequest(msg::MISSING_FIELDS.into()));
    };

    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;

    let profile = queries::upsert_profile(&tx, &CreateProfile::from_email(&email))?.into_inner();

    let mut entry = CreateLedgerEntry::new(
        &profile.id,
        LedgerEventType::EmailCapture,
        "email capture (fund)",
    );
    entry.campaign_slug = Some(campaign_slug.clone());
    entry.source = Some("fund".into());
    entry.external_id = Some(campaign_slug.clone());
    entry.metadata = serde_json::json!({ "tier_key": tier_key });
    let awarded = queries::award_leaves(&tx, &entry)?.was_created();

    tx.commit()?;

    tracing::info!(profile_id = %profile.id, awarded, "Email captured");
    Ok(Json(EmailCaptureResponse {
        ok: true,
        profile_id: profile.id,
    }))
}
