use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, types::Value};
use uuid::Uuid;

use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::*;

use super::from_row::{
    CAMPAIGN_COLS, FromRow, LEAD_COLS, LEDGER_COLS, PLEDGE_COLS, PROFILE_COLS, TIER_COLS,
    WEBHOOK_EVENT_COLS, WORK_FORM_COLS, query_all, query_one,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builder for dynamic UPDATE statements.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Set a column to an explicit value, `None` writing NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.fields.push((column, v.into())),
            None => self.fields.push((column, Value::Null)),
        }
        self
    }

    /// Execute the update and return the updated row.
    /// Returns None if no rows matched.
    fn execute_returning<T: FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
    ) -> Result<Option<T>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

/// Re-select after `INSERT ... ON CONFLICT DO NOTHING`.
///
/// `inserted` is the number of rows the insert reported; zero means a unique
/// key already held a row, which `existing` must find.
fn resolve_upsert<T>(
    inserted: usize,
    created: impl FnOnce() -> Result<Option<T>>,
    existing: impl FnOnce() -> Result<Option<T>>,
) -> Result<Upsert<T>> {
    if inserted > 0 {
        let row = created()?
            .ok_or_else(|| AppError::Internal("inserted row not readable".into()))?;
        return Ok(Upsert::Created(row));
    }
    let row = existing()?
        .ok_or_else(|| AppError::Internal("conflicting row not found".into()))?;
    Ok(Upsert::AlreadyExisted(row))
}

// ============ Profiles ============

/// Insert a profile keyed by email, or return the one already holding that email.
pub fn upsert_profile(conn: &Connection, input: &CreateProfile) -> Result<Upsert<Profile>> {
    let id = gen_id();
    let now = now();
    let inserted = conn.execute(
        "INSERT INTO profiles (id, email, display_name, user_id, leaf_total, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
         ON CONFLICT DO NOTHING",
        params![&id, &input.email, &input.display_name, &input.user_id, now],
    )?;
    resolve_upsert(
        inserted,
        || get_profile_by_id(conn, &id),
        || get_profile_by_email(conn, &input.email),
    )
}

pub fn get_profile_by_id(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLS),
        &[&id],
    )
}

pub fn get_profile_by_email(conn: &Connection, email: &str) -> Result<Option<Profile>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE email = ?1", PROFILE_COLS),
        &[&email],
    )
}

pub fn get_profile_by_user_id(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    query_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLS),
        &[&user_id],
    )
}

/// Resolve the profile of a signed-in user, creating it or attaching the
/// identity to an existing email-keyed profile as needed.
pub fn link_profile_identity(conn: &Connection, user_id: &str, email: &str) -> Result<Profile> {
    if let Some(profile) = get_profile_by_user_id(conn, user_id)? {
        return Ok(profile);
    }

    let mut input = CreateProfile::from_email(email);
    input.user_id = Some(user_id.to_string());
    let profile = match upsert_profile(conn, &input)? {
        Upsert::Created(profile) => return Ok(profile),
        Upsert::AlreadyExisted(profile) => profile,
    };

    if profile.user_id.is_some() {
        if profile.user_id.as_deref() != Some(user_id) {
            tracing::warn!(
                profile_id = %profile.id,
                "Profile email already linked to a different identity"
            );
        }
        return Ok(profile);
    }

    let linked = UpdateBuilder::new("profiles", &profile.id)
        .with_updated_at()
        .set("user_id", user_id.to_string())
        .execute_returning(conn, PROFILE_COLS)?;
    Ok(linked.unwrap_or(profile))
}

// ============ Leaf ledger ============

/// Append a ledger entry and bump the profile's leaf total.
///
/// Entries carrying an `external_id` are unique per (profile, event type);
/// a repeat returns the stored entry and leaves the total untouched. Run
/// inside a transaction so the entry and the total move together.
pub fn award_leaves(conn: &Connection, input: &CreateLedgerEntry) -> Result<Upsert<LedgerEntry>> {
    let id = gen_id();
    let inserted = conn.execute(
        "INSERT INTO leaf_ledger
            (id, profile_id, event_type, leaf_delta, reason, source_app, source, campaign_slug, external_id, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'fund', ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT DO NOTHING",
        params![
            &id,
            &input.profile_id,
            input.event_type.as_ref(),
            input.leaf_delta,
            &input.reason,
            &input.source,
            &input.campaign_slug,
            &input.external_id,
            input.metadata.to_string(),
            now(),
        ],
    )?;

    if inserted > 0 {
        conn.execute(
            "UPDATE profiles SET leaf_total = leaf_total + ?1, updated_at = ?2 WHERE id = ?3",
            params![input.leaf_delta, now(), &input.profile_id],
        )?;
    }

    resolve_upsert(
        inserted,
        || {
            query_one(
                conn,
                &format!("SELECT {} FROM leaf_ledger WHERE id = ?1", LEDGER_COLS),
                &[&id],
            )
        },
        || {
            query_one(
                conn,
                &format!(
                    "SELECT {} FROM leaf_ledger
                     WHERE profile_id = ?1 AND event_type = ?2 AND external_id = ?3",
                    LEDGER_COLS
                ),
                &[&input.profile_id, &input.event_type.as_ref(), &input.external_id],
            )
        },
    )
}

pub fn list_ledger_for_profile(conn: &Connection, profile_id: &str) -> Result<Vec<LedgerEntry>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM leaf_ledger WHERE profile_id = ?1 ORDER BY created_at, rowid",
            LEDGER_COLS
        ),
        &[&profile_id],
    )
}

// ============ Leads ============

/// Record a lead once per email.
pub fn insert_lead(conn: &Connection, input: &CreateLead) -> Result<Upsert<Lead>> {
    let id = gen_id();
    let inserted = conn.execute(
        "INSERT INTO leads (id, email, role, source, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(email) DO NOTHING",
        params![&id, &input.email, input.role.as_ref(), &input.source, now()],
    )?;
    resolve_upsert(
        inserted,
        || {
            query_one(
                conn,
                &format!("SELECT {} FROM leads WHERE id = ?1", LEAD_COLS),
                &[&id],
            )
        },
        || get_lead_by_email(conn, &input.email),
    )
}

pub fn get_lead_by_email(conn: &Connection, email: &str) -> Result<Option<Lead>> {
    query_one(
        conn,
        &format!("SELECT {} FROM leads WHERE email = ?1", LEAD_COLS),
        &[&email],
    )
}

pub fn count_leads(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM leads", [], |row| row.get(0))
        .map_err(Into::into)
}

pub fn insert_work_form(conn: &Connection, input: &CreateWorkForm) -> Result<WorkForm> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO work_forms (id, name, email, company, website, message, role, source, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &id,
            &input.name,
            &input.email,
            &input.company,
            &input.website,
            &input.message,
            input.role.as_ref(),
            &input.source,
            now,
        ],
    )?;
    Ok(WorkForm {
        id,
        name: input.name.clone(),
        email: input.email.clone(),
        company: input.company.clone(),
        website: input.website.clone(),
        message: input.message.clone(),
        role: input.role,
        source: input.source.clone(),
        created_at: now,
    })
}

pub fn list_work_forms(conn: &Connection) -> Result<Vec<WorkForm>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM work_forms ORDER BY created_at DESC",
            WORK_FORM_COLS
        ),
        &[],
    )
}

// ============ Campaigns & tiers ============

pub fn create_campaign(conn: &Connection, input: &CreateCampaign) -> Result<Campaign> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO campaigns (id, slug, title, goal_cents, starts_at, ends_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.slug,
            &input.title,
            input.goal_cents,
            input.starts_at,
            input.ends_at,
            now
        ],
    )?;
    Ok(Campaign {
        id,
        slug: input.slug.clone(),
        title: input.title.clone(),
        goal_cents: input.goal_cents,
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        created_at: now,
    })
}

pub fn get_campaign_by_slug(conn: &Connection, slug: &str) -> Result<Option<Campaign>> {
    query_one(
        conn,
        &format!("SELECT {} FROM campaigns WHERE slug = ?1", CAMPAIGN_COLS),
        &[&slug],
    )
}

pub fn get_campaign_by_id(conn: &Connection, id: &str) -> Result<Option<Campaign>> {
    query_one(
        conn,
        &format!("SELECT {} FROM campaigns WHERE id = ?1", CAMPAIGN_COLS),
        &[&id],
    )
}

pub fn create_tier(conn: &Connection, campaign_id: &str, input: &CreateTier) -> Result<Tier> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO tiers (id, campaign_id, title, amount_cents, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&id, campaign_id, &input.title, input.amount_cents, now],
    )?;
    Ok(Tier {
        id,
        campaign_id: campaign_id.to_string(),
        title: input.title.clone(),
        amount_cents: input.amount_cents,
        created_at: now,
    })
}

pub fn list_tiers(conn: &Connection, campaign_id: &str) -> Result<Vec<Tier>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM tiers WHERE campaign_id = ?1 ORDER BY amount_cents, title",
            TIER_COLS
        ),
        &[&campaign_id],
    )
}

/// Resolve a client tier key within a campaign: exact id first, then a
/// case-insensitive title match.
pub fn find_tier(conn: &Connection, campaign_id: &str, key: &str) -> Result<Option<Tier>> {
    let key = key.trim();
    if key.is_empty() {
        return Ok(None);
    }
    query_one(
        conn,
        &format!(
            "SELECT {} FROM tiers
             WHERE campaign_id = ?1 AND (id = ?2 OR lower(title) = lower(?2))
             ORDER BY id = ?2 DESC
             LIMIT 1",
            TIER_COLS
        ),
        &[&campaign_id, &key],
    )
}

/// Money raised and distinct backers over success-tier pledges of a campaign.
pub fn campaign_totals(conn: &Connection, slug: &str) -> Result<Option<CampaignTotals>> {
    let Some(campaign) = get_campaign_by_slug(conn, slug)? else {
        return Ok(None);
    };
    let statuses = PledgeStatus::SUCCESS
        .iter()
        .map(|s| format!("'{}'", s.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    let (raised_cents, backers): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(amount_cents), 0),
                    COUNT(DISTINCT COALESCE(profile_id, lower(email), id))
             FROM pledges
             WHERE campaign_id = ?1 AND status IN ({})",
            statuses
        ),
        params![&campaign.id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(Some(CampaignTotals {
        raised_cents,
        backers,
        goal_cents: campaign.goal_cents,
    }))
}

// ============ Pledges ============

fn insert_pledge_row(
    conn: &Connection,
    id: &str,
    input: &CreatePledge,
    or_ignore: bool,
) -> Result<usize> {
    let now = now();
    let sql = format!(
        "INSERT INTO pledges
            (id, campaign_id, tier_id, profile_id, user_id, email, amount_cents, currency, status,
             paypal_order_id, paypal_capture_id, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13){}",
        if or_ignore { " ON CONFLICT DO NOTHING" } else { "" }
    );
    conn.execute(
        &sql,
        params![
            id,
            &input.campaign_id,
            &input.tier_id,
            &input.profile_id,
            &input.user_id,
            &input.email,
            input.amount_cents,
            &input.currency,
            input.status.as_ref(),
            &input.paypal_order_id,
            &input.paypal_capture_id,
            input.metadata.to_string(),
            now,
        ],
    )
    .map_err(Into::into)
}

pub fn create_pledge(conn: &Connection, input: &CreatePledge) -> Result<Pledge> {
    let id = gen_id();
    insert_pledge_row(conn, &id, input, false)?;
    get_pledge_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("inserted pledge not readable".into()))
}

/// Insert a pledge unless a row already holds its provider capture or order id.
pub fn insert_pledge_if_absent(conn: &Connection, input: &CreatePledge) -> Result<Upsert<Pledge>> {
    let id = gen_id();
    let inserted = insert_pledge_row(conn, &id, input, true)?;
    resolve_upsert(
        inserted,
        || get_pledge_by_id(conn, &id),
        || {
            find_pledge_by_provider_ids(
                conn,
                input.paypal_capture_id.as_deref(),
                input.paypal_order_id.as_deref(),
            )
        },
    )
}

pub fn get_pledge_by_id(conn: &Connection, id: &str) -> Result<Option<Pledge>> {
    query_one(
        conn,
        &format!("SELECT {} FROM pledges WHERE id = ?1", PLEDGE_COLS),
        &[&id],
    )
}

/// A pledge the given user may act on.
pub fn get_pledge_for_user(conn: &Connection, id: &str, user_id: &str) -> Result<Option<Pledge>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM pledges WHERE id = ?1 AND user_id = ?2",
            PLEDGE_COLS
        ),
        &[&id, &user_id],
    )
}

pub fn get_pledge_by_order_id(conn: &Connection, order_id: &str) -> Result<Option<Pledge>> {
    query_one(
        conn,
        &format!("SELECT {} FROM pledges WHERE paypal_order_id = ?1", PLEDGE_COLS),
        &[&order_id],
    )
}

pub fn get_pledge_by_capture_id(conn: &Connection, capture_id: &str) -> Result<Option<Pledge>> {
    query_one(
        conn,
        &format!("SELECT {} FROM pledges WHERE paypal_capture_id = ?1", PLEDGE_COLS),
        &[&capture_id],
    )
}

/// Capture id first, then order id; first match wins.
pub fn find_pledge_by_provider_ids(
    conn: &Connection,
    capture_id: Option<&str>,
    order_id: Option<&str>,
) -> Result<Option<Pledge>> {
    if let Some(capture_id) = capture_id
        && let Some(pledge) = get_pledge_by_capture_id(conn, capture_id)?
    {
        return Ok(Some(pledge));
    }
    match order_id {
        Some(order_id) => get_pledge_by_order_id(conn, order_id),
        None => Ok(None),
    }
}

/// Attach a freshly created provider order to an intent pledge.
pub fn set_pledge_order_id(conn: &Connection, id: &str, order_id: &str) -> Result<Option<Pledge>> {
    UpdateBuilder::new("pledges", id)
        .with_updated_at()
        .set("paypal_order_id", order_id.to_string())
        .execute_returning(conn, PLEDGE_COLS)
}

/// Write every mutable column of a pledge.
pub fn update_pledge(conn: &Connection, pledge: &Pledge) -> Result<Pledge> {
    UpdateBuilder::new("pledges", &pledge.id)
        .with_updated_at()
        .set_nullable("campaign_id", pledge.campaign_id.clone())
        .set_nullable("tier_id", pledge.tier_id.clone())
        .set_nullable("profile_id", pledge.profile_id.clone())
        .set_nullable("user_id", pledge.user_id.clone())
        .set_nullable("email", pledge.email.clone())
        .set("amount_cents", pledge.amount_cents)
        .set("currency", pledge.currency.clone())
        .set("status", pledge.status.as_ref().to_string())
        .set_nullable("paypal_order_id", pledge.paypal_order_id.clone())
        .set_nullable("paypal_capture_id", pledge.paypal_capture_id.clone())
        .set("metadata", pledge.metadata.to_string())
        .execute_returning(conn, PLEDGE_COLS)?
        .or_not_found(msg::PLEDGE_NOT_FOUND)
}

pub fn count_pledges(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM pledges", [], |row| row.get(0))
        .map_err(Into::into)
}

// ============ Webhook events ============

pub fn insert_webhook_event(conn: &Connection, input: &CreateWebhookEvent) -> Result<WebhookEvent> {
    let id = gen_id();
    let now = now();
    conn.execute(
        "INSERT INTO webhook_events (id, source, event_type, resource_id, verified, payload, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            &input.source,
            &input.event_type,
            &input.resource_id,
            input.verified as i32,
            &input.payload,
            now,
        ],
    )?;
    Ok(WebhookEvent {
        id,
        source: input.source.clone(),
        event_type: input.event_type.clone(),
        resource_id: input.resource_id.clone(),
        verified: input.verified,
        payload: input.payload.clone(),
        received_at: now,
    })
}

pub fn list_webhook_events(conn: &Connection, source: &str) -> Result<Vec<WebhookEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE source = ?1 ORDER BY received_at, rowid",
            WEBHOOK_EVENT_COLS
        ),
        &[&source],
    )
}
