//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse a JSON text column; an unreadable value becomes an empty object.
fn parse_json(row: &Row, col: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(col)?;
    Ok(serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({})))
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const PROFILE_COLS: &str =
    "id, email, display_name, user_id, leaf_total, created_at, updated_at";

pub const LEAD_COLS: &str = "id, email, role, source, created_at";

pub const WORK_FORM_COLS: &str =
    "id, name, email, company, website, message, role, source, created_at";

pub const CAMPAIGN_COLS: &str = "id, slug, title, goal_cents, starts_at, ends_at, created_at";

pub const TIER_COLS: &str = "id, campaign_id, title, amount_cents, created_at";

pub const PLEDGE_COLS: &str = "id, campaign_id, tier_id, profile_id, user_id, email, amount_cents, currency, status, paypal_order_id, paypal_capture_id, metadata, created_at, updated_at";

pub const LEDGER_COLS: &str = "id, profile_id, event_type, leaf_delta, reason, source_app, source, campaign_slug, external_id, metadata, created_at";

pub const WEBHOOK_EVENT_COLS: &str =
    "id, source, event_type, resource_id, verified, payload, received_at";

// ============ FromRow Implementations ============

impl FromRow for Profile {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Profile {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            user_id: row.get(3)?,
            leaf_total: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for Lead {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Lead {
            id: row.get(0)?,
            email: row.get(1)?,
            role: parse_enum(row, 2, "role")?,
            source: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for WorkForm {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WorkForm {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            company: row.get(3)?,
            website: row.get(4)?,
            message: row.get(5)?,
            role: parse_enum(row, 6, "role")?,
            source: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl FromRow for Campaign {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Campaign {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            goal_cents: row.get(3)?,
            starts_at: row.get(4)?,
            ends_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for Tier {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Tier {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            title: row.get(2)?,
            amount_cents: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

impl FromRow for Pledge {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Pledge {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            tier_id: row.get(2)?,
            profile_id: row.get(3)?,
            user_id: row.get(4)?,
            email: row.get(5)?,
            amount_cents: row.get(6)?,
            currency: row.get(7)?,
            status: parse_enum(row, 8, "status")?,
            paypal_order_id: row.get(9)?,
            paypal_capture_id: row.get(10)?,
            metadata: parse_json(row, 11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl FromRow for LedgerEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(LedgerEntry {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            event_type: parse_enum(row, 2, "event_type")?,
            leaf_delta: row.get(3)?,
            reason: row.get(4)?,
            source_app: row.get(5)?,
            source: row.get(6)?,
            campaign_slug: row.get(7)?,
            external_id: row.get(8)?,
            metadata: parse_json(row, 9)?,
            created_at: row.get(10)?,
        })
    }
}

impl FromRow for WebhookEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEvent {
            id: row.get(0)?,
            source: row.get(1)?,
            event_type: row.get(2)?,
            resource_id: row.get(3)?,
            verified: row.get::<_, i32>(4)? != 0,
            payload: row.get(5)?,
            received_at: row.get(6)?,
        })
    }
}
