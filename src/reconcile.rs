//! Pledge reconciliation.
//!
//! Every entry point that learns about a PayPal payment (the browser's capture
//! call, the return-URL redirect, and the webhook) funnels into
//! [`apply_capture`]. It runs in one `BEGIN IMMEDIATE` transaction so that
//! "find the row, else insert one" cannot interleave with another writer,
//! and the unique provider-id columns act as the final backstop.

use rusqlite::{Connection, TransactionBehavior};
use serde_json::{Map, Value};
use strum::AsRefStr;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{
    CreateLedgerEntry, CreatePledge, LedgerEventType, Pledge, PledgeStatus, Upsert,
};

/// Which entry point observed the payment. Stored as `metadata.via`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Entry {
    /// Browser reported a client-side capture.
    Client,
    /// Server captured the order on PayPal's return URL.
    Redirect,
    Webhook,
}

/// What the provider says happened to a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFacts {
    pub status: PledgeStatus,
    pub order_id: Option<String>,
    pub capture_id: Option<String>,
    /// Authoritative captured amount; only success facts carry one.
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub campaign_slug: Option<String>,
    /// Our pledge id as echoed by the provider.
    pub reference_id: Option<String>,
    pub payer_email: Option<String>,
    /// Raw provider payload, stored under `metadata.paypal`.
    pub payload: Value,
}

/// How to find the pledge a payment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// A pledge id supplied by the signed-in owner.
    Pledge(&'a str),
    /// Capture id first, then order id.
    CaptureThenOrder,
    OrderOnly,
    CaptureOnly,
}

/// The signed-in caller a capture is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub user_id: String,
    pub email: String,
    pub profile_id: String,
}

#[derive(Debug, Clone)]
pub struct CaptureRequest<'a> {
    pub facts: &'a CaptureFacts,
    pub lookup: Lookup<'a>,
    pub owner: Option<&'a Owner>,
    pub entry: Entry,
    /// Insert a new pledge when nothing matches and the facts are a success.
    pub allow_fallback: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Updated(Pledge),
    Created(Pledge),
    /// The stored row already reflects these facts; nothing was written.
    Unchanged(Pledge),
    /// The transition table forbids moving this row to `attempted`.
    Rejected {
        pledge: Pledge,
        attempted: PledgeStatus,
    },
    NotFound,
}

impl Outcome {
    pub fn pledge(&self) -> Option<&Pledge> {
        match self {
            Outcome::Updated(p) | Outcome::Created(p) | Outcome::Unchanged(p) => Some(p),
            Outcome::Rejected { pledge, .. } => Some(pledge),
            Outcome::NotFound => None,
        }
    }

    /// True when the row now reflects the facts (written now or earlier).
    pub fn applied(&self) -> bool {
        matches!(
            self,
            Outcome::Updated(_) | Outcome::Created(_) | Outcome::Unchanged(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Updated(_) => "updated",
            Outcome::Created(_) => "created",
            Outcome::Unchanged(_) => "unchanged",
            Outcome::Rejected { .. } => "rejected",
            Outcome::NotFound => "not_found",
        }
    }
}

/// Apply provider facts to the matching pledge, or create one.
pub fn apply_capture(conn: &mut Connection, req: &CaptureRequest<'_>) -> Result<Outcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let outcome = apply_in_tx(&tx, req)?;
    tx.commit()?;

    match &outcome {
        Outcome::Rejected { pledge, attempted } => tracing::warn!(
            pledge_id = %pledge.id,
            from = %pledge.status,
            to = %attempted,
            via = req.entry.as_ref(),
            "Pledge transition rejected"
        ),
        Outcome::NotFound => tracing::info!(
            order_id = ?req.facts.order_id,
            capture_id = ?req.facts.capture_id,
            via = req.entry.as_ref(),
            "No pledge matched payment"
        ),
        other => {
            if let Some(p) = other.pledge() {
                tracing::info!(
                    pledge_id = %p.id,
                    status = %p.status,
                    order_id = ?p.paypal_order_id,
                    capture_id = ?p.paypal_capture_id,
                    via = req.entry.as_ref(),
                    outcome = other.label(),
                    "Pledge reconciled"
                );
            }
        }
    }
    Ok(outcome)
}

fn apply_in_tx(conn: &Connection, req: &CaptureRequest<'_>) -> Result<Outcome> {
    let facts = req.facts;
    let found = match req.lookup {
        Lookup::Pledge(id) => resolve_named(conn, id, req)?,
        Lookup::CaptureThenOrder => queries::find_pledge_by_provider_ids(
            conn,
            facts.capture_id.as_deref(),
            facts.order_id.as_deref(),
        )?,
        Lookup::OrderOnly => match facts.order_id.as_deref() {
            Some(order_id) => queries::get_pledge_by_order_id(conn, order_id)?,
            None => None,
        },
        Lookup::CaptureOnly => match facts.capture_id.as_deref() {
            Some(capture_id) => queries::get_pledge_by_capture_id(conn, capture_id)?,
            None => None,
        },
    };

    if let Some(existing) = found {
        check_owner(&existing, req.owner)?;
        return merge_into(conn, existing, req);
    }

    if matches!(req.lookup, Lookup::Pledge(_)) {
        return Err(AppError::NotFound(msg::PLEDGE_NOT_FOUND.into()));
    }
    if !req.allow_fallback || !facts.status.is_success() {
        return Ok(Outcome::NotFound);
    }
    insert_fallback(conn, req)
}

/// The pledge a caller named, unless its payment already landed on another row.
fn resolve_named(conn: &Connection, id: &str, req: &CaptureRequest<'_>) -> Result<Option<Pledge>> {
    let Some(named) = queries::get_pledge_by_id(conn, id)? else {
        return Ok(None);
    };
    let owner = req.owner.ok_or(AppError::Unauthorized)?;
    if named.user_id.as_deref() != Some(owner.user_id.as_str()) {
        return Ok(None);
    }

    let holder = queries::find_pledge_by_provider_ids(
        conn,
        req.facts.capture_id.as_deref(),
        req.facts.order_id.as_deref(),
    )?;
    match holder {
        Some(holder) if holder.id != named.id => {
            check_owner(&holder, Some(owner))?;
            tracing::info!(
                named = %named.id,
                adopted = %holder.id,
                "Payment already recorded on another pledge, adopting it"
            );
            Ok(Some(holder))
        }
        _ => Ok(Some(named)),
    }
}

fn check_owner(pledge: &Pledge, owner: Option<&Owner>) -> Result<()> {
    match (owner, pledge.user_id.as_deref()) {
        (Some(owner), Some(user_id)) if user_id != owner.user_id => {
            Err(AppError::Conflict(msg::PAYMENT_OWNED_ELSEWHERE.into()))
        }
        _ => Ok(()),
    }
}

fn merge_metadata(existing: &Value, facts: &CaptureFacts, via: &str) -> Value {
    let mut meta = match existing {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if !facts.payload.is_null() {
        meta.insert("paypal".into(), facts.payload.clone());
    }
    meta.insert("via".into(), Value::String(via.to_string()));
    Value::Object(meta)
}

/// Take a provider id unless another row already owns it.
fn claim_id(
    conn: &Connection,
    pledge_id: &str,
    current: &Option<String>,
    incoming: &Option<String>,
    holder: impl Fn(&Connection, &str) -> Result<Option<Pledge>>,
) -> Result<Option<String>> {
    match incoming {
        Some(id) if current.as_deref() != Some(id.as_str()) => match holder(conn, id)? {
            Some(other) if other.id != pledge_id => {
                tracing::warn!(
                    pledge_id,
                    other = %other.id,
                    provider_id = %id,
                    "Provider id already held by another pledge, keeping stored value"
                );
                Ok(current.clone())
            }
            _ => Ok(Some(id.clone())),
        },
        _ => Ok(current.clone()),
    }
}

fn merge_into(conn: &Connection, existing: Pledge, req: &CaptureRequest<'_>) -> Result<Outcome> {
    let facts = req.facts;
    let next = match existing.status.advance(facts.status) {
        Ok(next) => next,
        Err(e) => {
            return Ok(Outcome::Rejected {
                attempted: e.to,
                pledge: existing,
            });
        }
    };

    let mut merged = existing.clone();
    merged.status = next;

    // Failure and reversal facts only move the status and record metadata.
    if facts.status.is_success() {
        merged.paypal_order_id = claim_id(
            conn,
            &existing.id,
            &existing.paypal_order_id,
            &facts.order_id,
            queries::get_pledge_by_order_id,
        )?;
        merged.paypal_capture_id = claim_id(
            conn,
            &existing.id,
            &existing.paypal_capture_id,
            &facts.capture_id,
            queries::get_pledge_by_capture_id,
        )?;
        if let Some(amount) = facts.amount_cents {
            merged.amount_cents = amount;
        }
        if let Some(currency) = &facts.currency {
            merged.currency = currency.clone();
        }
        if let Some(owner) = req.owner
            && merged.user_id.is_none()
        {
            merged.user_id = Some(owner.user_id.clone());
            merged.email = Some(owner.email.clone());
            merged.profile_id = Some(owner.profile_id.clone());
        }
        if merged.email.is_none() {
            merged.email = facts.payer_email.clone();
        }
        if merged.campaign_id.is_none() {
            merged.campaign_id = campaign_id_for(conn, facts)?;
        }
    }
    merged.metadata = merge_metadata(&existing.metadata, facts, req.entry.as_ref());

    if merged == existing {
        return Ok(Outcome::Unchanged(existing));
    }

    let saved = queries::update_pledge(conn, &merged)?;

    let entered_success = next.is_success() && !existing.status.is_success();
    let gained_profile = next.is_success() && existing.profile_id.is_none();
    if entered_success || gained_profile {
        award_capture(conn, &saved)?;
    }
    Ok(Outcome::Updated(saved))
}

fn campaign_id_for(conn: &Connection, facts: &CaptureFacts) -> Result<Option<String>> {
    match facts.campaign_slug.as_deref() {
        Some(slug) => Ok(queries::get_campaign_by_slug(conn, slug)?.map(|c| c.id)),
        None => Ok(None),
    }
}

fn insert_fallback(conn: &Connection, req: &CaptureRequest<'_>) -> Result<Outcome> {
    let facts = req.facts;
    let amount_cents = facts
        .amount_cents
        .ok_or_else(|| AppError::BadRequest(msg::INVALID_AMOUNT.into()))?;

    let mut metadata = Map::new();
    if !facts.payload.is_null() {
        metadata.insert("paypal".into(), facts.payload.clone());
    }
    metadata.insert(
        "via".into(),
        Value::String(format!("{}_insert", req.entry.as_ref())),
    );

    let input = CreatePledge {
        campaign_id: campaign_id_for(conn, facts)?,
        tier_id: None,
        profile_id: req.owner.map(|o| o.profile_id.clone()),
        user_id: req.owner.map(|o| o.user_id.clone()),
        email: req
            .owner
            .map(|o| o.email.clone())
            .or_else(|| facts.payer_email.clone()),
        amount_cents,
        currency: facts.currency.clone().unwrap_or_else(|| "USD".to_string()),
        status: facts.status,
        paypal_order_id: facts.order_id.clone(),
        paypal_capture_id: facts.capture_id.clone(),
        metadata: Value::Object(metadata),
    };

    match queries::insert_pledge_if_absent(conn, &input)? {
        Upsert::Created(pledge) => {
            award_capture(conn, &pledge)?;
            Ok(Outcome::Created(pledge))
        }
        Upsert::AlreadyExisted(existing) => {
            check_owner(&existing, req.owner)?;
            merge_into(conn, existing, req)
        }
    }
}

/// +2 leaves for the pledge's profile, once per payment.
fn award_capture(conn: &Connection, pledge: &Pledge) -> Result<()> {
    let Some(profile_id) = pledge.profile_id.as_deref() else {
        return Ok(());
    };
    let external_id = pledge
        .paypal_capture_id
        .clone()
        .or_else(|| pledge.paypal_order_id.clone())
        .unwrap_or_else(|| pledge.id.clone());

    let campaign_slug = match pledge.campaign_id.as_deref() {
        Some(id) => queries::get_campaign_by_id(conn, id)?.map(|c| c.slug),
        None => None,
    };

    let mut entry = CreateLedgerEntry::new(
        profile_id,
        LedgerEventType::PaymentCapture,
        "Pledge payment captured",
    );
    entry.source = Some("paypal".into());
    entry.campaign_slug = campaign_slug;
    entry.external_id = Some(external_id);
    entry.metadata = serde_json::json!({ "pledge_id": pledge.id });

    if !queries::award_leaves(conn, &entry)?.was_created() {
        tracing::debug!(pledge_id = %pledge.id, "Capture leaves already awarded");
    }
    Ok(())
}
