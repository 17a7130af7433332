mod campaign;
mod lead;
mod ledger;
mod pledge;
mod profile;
mod webhook_event;

pub use campaign::*;
pub use lead::*;
pub use ledger::*;
pub use pledge::*;
pub use profile::*;
pub use webhook_event::*;

use crate::error::{AppError, Result, msg};

/// Outcome of an insert keyed on a unique column.
///
/// The row store resolves conflicts itself (`ON CONFLICT DO NOTHING` plus a
/// re-select), so callers never inspect driver error codes.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert<T> {
    Created(T),
    AlreadyExisted(T),
}

impl<T> Upsert<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Upsert::Created(v) | Upsert::AlreadyExisted(v) => v,
        }
    }

    pub fn get(&self) -> &T {
        match self {
            Upsert::Created(v) | Upsert::AlreadyExisted(v) => v,
        }
    }
}

/// Normalize and validate an email address.
///
/// Accepts `local@domain.tld` with no whitespace, a single `@`, and a
/// top-level label of at least two characters. Returns the trimmed,
/// lowercased address.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();

    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL.into()));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL.into()));
    };
    if local.is_empty() || domain.contains('@') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL.into()));
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && tld.len() >= 2 => Ok(email),
        _ => Err(AppError::BadRequest(msg::INVALID_EMAIL.into())),
    }
}

/// Convert a client-supplied decimal amount to cents.
pub fn amount_to_cents(amount: f64) -> Result<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
    }
    let cents = (amount * 100.0).round();
    if cents < 1.0 || cents > i64::MAX as f64 {
        return Err(AppError::BadRequest(msg::INVALID_AMOUNT.into()));
    }
    Ok(cents as i64)
}

/// Parse a provider money string such as `"19.99"` into cents without floats.
pub fn parse_money(value: &str) -> Option<i64> {
    let value = value.trim();
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac_cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    whole.checked_mul(100)?.checked_add(frac_cents)
}

/// Render cents as a two-decimal string, the format PayPal expects.
pub fn format_money(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents.rem_euclid(100))
}

/// Uppercase ISO currency code; `USD` when absent.
pub fn normalize_currency(raw: Option<&str>) -> Result<String> {
    let currency = raw.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("USD");
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::BadRequest(msg::INVALID_CURRENCY.into()));
    }
    Ok(currency.to_ascii_uppercase())
}
