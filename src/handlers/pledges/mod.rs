mod capture;
mod checkout;
mod intent;

pub use capture::*;
pub use checkout::*;
pub use intent::*;

use axum::{
    Router,
    routing::{get, post},
};
use rusqlite::Connection;
use serde_json::Value;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::{amount_to_cents, parse_money};
use crate::reconcile::Owner;
use crate::session::SessionUser;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pledge/intent", post(create_intent))
        .route("/api/pledge/capture", post(capture_pledge))
        .route("/api/pledge/paypal", post(create_paypal_order))
        .route("/api/paypal/capture", get(paypal_return))
        .route("/api/paypal/cancel", get(paypal_cancel))
}

/// Link the session identity to a profile and describe it as a pledge owner.
pub(crate) fn owner_for(conn: &Connection, user: &SessionUser) -> Result<Owner> {
    let profile = queries::link_profile_identity(conn, &user.id, &user.email)?;
    Ok(Owner {
        user_id: user.id.clone(),
        email: user.email.clone(),
        profile_id: profile.id,
    })
}

/// Client amounts arrive as JSON numbers or decimal strings.
pub(crate) fn parse_amount(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => amount_to_cents(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => match parse_money(s) {
            Some(cents) if cents > 0 => Ok(cents),
            _ => amount_to_cents(s.trim().parse().unwrap_or(f64::NAN)),
        },
        _ => Err(AppError::BadRequest(msg::INVALID_AMOUNT.into())),
    }
}
