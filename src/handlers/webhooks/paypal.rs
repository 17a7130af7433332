//! PayPal webhook delivery.
//!
//! Every delivery is recorded in `webhook_events` with its verification result
//! before anything else happens. Only verified deliveries touch pledges, and
//! the provider always gets a 200 for well-formed JSON so it does not retry.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use serde_json::value::RawValue;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::CreateWebhookEvent;
use crate::payments::{PayPalEvent, TransmissionHeaders, audit_fields};
use crate::reconcile::{self, CaptureRequest, Entry, Lookup, Outcome};

const SOURCE: &str = "paypal";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    fn ack(verified: bool) -> Response {
        (
            StatusCode::OK,
            Json(WebhookResponse {
                ok: true,
                verified,
                error: None,
            }),
        )
            .into_response()
    }

    fn failed(verified: bool, error: &AppError) -> Response {
        (
            StatusCode::OK,
            Json(WebhookResponse {
                ok: false,
                verified,
                error: Some(error.to_string()),
            }),
        )
            .into_response()
    }
}

/// POST /api/webhooks/paypal
pub async fn handle_paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event: Value = match serde_json::from_slice(&body) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => return AppError::BadRequest("Expected a JSON object".into()).into_response(),
        Err(e) => return AppError::from(e).into_response(),
    };
    // Verification and the audit row both need the bytes PayPal signed,
    // not a re-serialization of the parsed value.
    let raw: &RawValue = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => return AppError::from(e).into_response(),
    };

    let transmission = TransmissionHeaders::from_headers(&headers);
    let verified = state
        .paypal
        .verify_webhook_signature(transmission.as_ref(), raw)
        .await;

    let mut conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("PayPal webhook: failed to get DB connection: {}", e);
            return WebhookResponse::failed(verified, &AppError::from(e));
        }
    };

    let (event_type, resource_id) = audit_fields(&event);
    let audit = CreateWebhookEvent {
        source: SOURCE.to_string(),
        event_type: event_type.clone(),
        resource_id: resource_id.clone(),
        verified,
        payload: raw.get().to_string(),
    };
    if let Err(e) = queries::insert_webhook_event(&conn, &audit) {
        tracing::error!("PayPal webhook: failed to record delivery: {}", e);
        return WebhookResponse::failed(verified, &e);
    }

    if !verified {
        tracing::warn!(
            event_type = ?event_type,
            resource_id = ?resource_id,
            "Unverified PayPal webhook recorded, not applied"
        );
        return WebhookResponse::ack(false);
    }

    match process_event(&mut conn, &PayPalEvent::parse(&event)) {
        Ok(outcome) => {
            tracing::debug!(
                event_type = ?event_type,
                outcome = outcome.label(),
                "PayPal webhook processed"
            );
            WebhookResponse::ack(true)
        }
        Err(e) => {
            tracing::error!(
                event_type = ?event_type,
                resource_id = ?resource_id,
                "PayPal webhook processing failed: {}",
                e
            );
            WebhookResponse::failed(true, &e)
        }
    }
}

/// Apply a verified PayPal event to the pledge it concerns.
///
/// Completed captures fall back to inserting a row so a successful payment is
/// never lost; completed orders only update a row already holding the order
/// id; reversals resolve by capture id and never create anything.
pub fn process_event(conn: &mut Connection, event: &PayPalEvent) -> Result<Outcome> {
    let (facts, lookup, allow_fallback) = match event {
        PayPalEvent::CaptureCompleted(facts) => (facts, Lookup::CaptureThenOrder, true),
        PayPalEvent::OrderCompleted(facts) => (facts, Lookup::OrderOnly, false),
        PayPalEvent::CaptureReversal(facts) => (facts, Lookup::CaptureOnly, false),
        PayPalEvent::Ignored { event_type } => {
            tracing::info!(event_type = ?event_type, "Ignoring PayPal event");
            return Ok(Outcome::NotFound);
        }
    };

    reconcile::apply_capture(
        conn,
        &CaptureRequest {
            facts,
            lookup,
            owner: None,
            entry: Entry::Webhook,
            allow_fallback,
        },
    )
}
