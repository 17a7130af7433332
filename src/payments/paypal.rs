use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::config::PayPalConfig;
use crate::error::{AppError, msg};
use crate::models::{PledgeStatus, format_money, parse_money};
use crate::reconcile::CaptureFacts;

use super::PayErrorCode;

pub const BRAND_NAME: &str = "Hemp'in Fund";

pub mod event_types {
    pub const CAPTURE_COMPLETED: &str = "PAYMENT.CAPTURE.COMPLETED";
    pub const CAPTURE_DENIED: &str = "PAYMENT.CAPTURE.DENIED";
    pub const CAPTURE_REFUNDED: &str = "PAYMENT.CAPTURE.REFUNDED";
    pub const CAPTURE_REVERSED: &str = "PAYMENT.CAPTURE.REVERSED";
    pub const ORDER_COMPLETED: &str = "CHECKOUT.ORDER.COMPLETED";
}

/// A failed PayPal REST call.
#[derive(Debug, Error)]
pub enum PayPalError {
    #[error("{}", msg::PAYPAL_NOT_CONFIGURED)]
    NotConfigured,

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx answer. `issue` is the first `details[].issue` PayPal reported.
    #[error("{status}: {message}")]
    Api {
        status: u16,
        issue: Option<String>,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl PayPalError {
    /// Browser-facing code for a failed checkout.
    pub fn pay_error_code(&self) -> PayErrorCode {
        match self {
            PayPalError::Network(_) => PayErrorCode::Network,
            PayPalError::Api { status, issue, .. } => match issue.as_deref() {
                Some(
                    "INSTRUMENT_DECLINED" | "TRANSACTION_REFUSED" | "PAYER_CANNOT_PAY"
                    | "PAYER_ACTION_REQUIRED",
                ) => PayErrorCode::Declined,
                Some("ORDER_EXPIRED") => PayErrorCode::Expired,
                Some("ORDER_NOT_APPROVED") => PayErrorCode::Cancelled,
                Some("INVALID_RESOURCE_ID" | "RESOURCE_NOT_FOUND" | "INVALID_REQUEST") => {
                    PayErrorCode::Invalid
                }
                _ if *status == 404 => PayErrorCode::Invalid,
                _ => PayErrorCode::Unknown,
            },
            PayPalError::NotConfigured | PayPalError::Malformed(_) => PayErrorCode::Unknown,
        }
    }
}

impl From<PayPalError> for AppError {
    fn from(err: PayPalError) -> Self {
        match err {
            PayPalError::NotConfigured => AppError::Internal(msg::PAYPAL_NOT_CONFIGURED.into()),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit<'a>>,
    application_context: ApplicationContext<'a>,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit<'a> {
    reference_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_id: Option<&'a str>,
    amount: Amount,
    description: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Amount {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct ApplicationContext<'a> {
    brand_name: &'static str,
    landing_page: &'static str,
    user_action: &'static str,
    return_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    issue: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifySignatureRequest<'a> {
    auth_algo: &'a str,
    cert_url: &'a str,
    transmission_id: &'a str,
    transmission_sig: &'a str,
    transmission_time: &'a str,
    webhook_id: &'a str,
    /// The delivery exactly as received; PayPal signs the original bytes.
    webhook_event: &'a RawValue,
}

#[derive(Debug, Deserialize)]
struct VerifySignatureResponse {
    verification_status: String,
}

/// What a new order should charge and where PayPal sends the browser back.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Our pledge id; PayPal echoes it back as `purchase_units[0].reference_id`.
    pub reference_id: String,
    pub campaign_slug: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub id: String,
    pub approval_url: String,
}

/// The `paypal-*` transmission headers of a webhook delivery.
#[derive(Debug, Clone)]
pub struct TransmissionHeaders {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
}

impl TransmissionHeaders {
    /// All five headers, or `None` if any is missing.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };
        Some(Self {
            auth_algo: get("paypal-auth-algo")?,
            cert_url: get("paypal-cert-url")?,
            transmission_id: get("paypal-transmission-id")?,
            transmission_sig: get("paypal-transmission-sig")?,
            transmission_time: get("paypal-transmission-time")?,
        })
    }
}

// ============ Client ============

pub struct PayPalClient {
    client: Client,
    config: PayPalConfig,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.config.has_credentials()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn access_token(&self) -> Result<String, PayPalError> {
        let (Some(client_id), Some(secret)) = (&self.config.client_id, &self.config.secret) else {
            return Err(PayPalError::NotConfigured);
        };

        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        Ok(token.access_token)
    }

    /// Create a CAPTURE-intent order and return its id and approval link.
    pub async fn create_order(&self, order: &OrderRequest) -> Result<CreatedOrder, PayPalError> {
        let token = self.access_token().await?;

        let request = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                reference_id: &order.reference_id,
                custom_id: order.campaign_slug.as_deref(),
                amount: Amount {
                    currency_code: order.currency.clone(),
                    value: format_money(order.amount_cents),
                },
                description: order.description.clone(),
            }],
            application_context: ApplicationContext {
                brand_name: BRAND_NAME,
                landing_page: "LOGIN",
                user_action: "PAY_NOW",
                return_url: &order.return_url,
                cancel_url: &order.cancel_url,
            },
        };

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;

        let created: CreateOrderResponse = read_json(response).await?;
        let approval_url = created
            .links
            .into_iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href)
            .ok_or_else(|| PayPalError::Malformed("no approve link".into()))?;

        Ok(CreatedOrder {
            id: created.id,
            approval_url,
        })
    }

    /// Capture an approved order. Returns the raw order body PayPal answers with.
    pub async fn capture_order(&self, order_id: &str) -> Result<Value, PayPalError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url(&format!(
                "/v2/checkout/orders/{}/capture",
                urlencoding::encode(order_id)
            )))
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .send()
            .await?;
        read_json(response).await
    }

    /// Ask PayPal whether a delivery really came from it.
    ///
    /// Without a configured webhook id or the transmission headers nothing is
    /// sent and the delivery counts as unverified; so does any failed call.
    pub async fn verify_webhook_signature(
        &self,
        headers: Option<&TransmissionHeaders>,
        event: &RawValue,
    ) -> bool {
        let Some(webhook_id) = self.config.webhook_id.as_deref() else {
            tracing::warn!("PAYPAL_WEBHOOK_ID not set, webhook left unverified");
            return false;
        };
        let Some(headers) = headers else {
            tracing::warn!("PayPal webhook missing transmission headers");
            return false;
        };

        let result = async {
            let token = self.access_token().await?;
            let request = VerifySignatureRequest {
                auth_algo: &headers.auth_algo,
                cert_url: &headers.cert_url,
                transmission_id: &headers.transmission_id,
                transmission_sig: &headers.transmission_sig,
                transmission_time: &headers.transmission_time,
                webhook_id,
                webhook_event: event,
            };
            let response = self
                .client
                .post(self.url("/v1/notifications/verify-webhook-signature"))
                .bearer_auth(&token)
                .json(&request)
                .send()
                .await?;
            read_json::<VerifySignatureResponse>(response).await
        }
        .await;

        match result {
            Ok(r) if r.verification_status.eq_ignore_ascii_case("SUCCESS") => true,
            Ok(r) => {
                tracing::warn!("PayPal signature check returned {}", r.verification_status);
                false
            }
            Err(e) => {
                tracing::warn!("PayPal signature check failed: {}", e);
                false
            }
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PayPalError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
        let issue = body
            .as_ref()
            .and_then(|b| b.details.iter().find_map(|d| d.issue.clone()));
        let message = body
            .and_then(|b| b.message)
            .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });
        return Err(PayPalError::Api {
            status: status.as_u16(),
            issue,
            message,
        });
    }
    response
        .json()
        .await
        .map_err(|e| PayPalError::Malformed(e.to_string()))
}

// ============ Payload parsing ============

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn owned_at(value: &Value, pointer: &str) -> Option<String> {
    str_at(value, pointer).map(String::from)
}

/// `(cents, currency)` from a PayPal `{ value, currency_code }` object.
fn amount_at(value: &Value, pointer: &str) -> Option<(i64, String)> {
    let amount = value.pointer(pointer)?;
    let cents = parse_money(str_at(amount, "/value")?)?;
    let currency = str_at(amount, "/currency_code").unwrap_or("USD").to_ascii_uppercase();
    Some((cents, currency))
}

/// Facts from an order body (capture response or `CHECKOUT.ORDER.COMPLETED` resource).
pub fn facts_from_order(order: &Value, status: PledgeStatus) -> CaptureFacts {
    let amount = amount_at(order, "/purchase_units/0/payments/captures/0/amount")
        .or_else(|| amount_at(order, "/purchase_units/0/amount"));
    CaptureFacts {
        status,
        order_id: owned_at(order, "/id"),
        capture_id: owned_at(order, "/purchase_units/0/payments/captures/0/id"),
        amount_cents: amount.as_ref().map(|(c, _)| *c),
        currency: amount.map(|(_, cur)| cur),
        campaign_slug: owned_at(order, "/purchase_units/0/custom_id"),
        reference_id: owned_at(order, "/purchase_units/0/reference_id"),
        payer_email: owned_at(order, "/payer/email_address"),
        payload: order.clone(),
    }
}

/// Order-level status plus the first capture's status, as PayPal reports them.
pub fn order_capture_status(order: &Value) -> (Option<&str>, Option<&str>) {
    (
        str_at(order, "/status"),
        str_at(order, "/purchase_units/0/payments/captures/0/status"),
    )
}

/// Facts from a capture resource (`PAYMENT.CAPTURE.*`).
fn facts_from_capture(resource: &Value, status: PledgeStatus) -> CaptureFacts {
    let amount = amount_at(resource, "/amount");
    CaptureFacts {
        status,
        order_id: owned_at(resource, "/supplementary_data/related_ids/order_id"),
        capture_id: owned_at(resource, "/id"),
        amount_cents: amount.as_ref().map(|(c, _)| *c),
        currency: amount.map(|(_, cur)| cur),
        campaign_slug: owned_at(resource, "/custom_id"),
        reference_id: None,
        payer_email: None,
        payload: resource.clone(),
    }
}

/// A refund resource names its capture only through the `up` link.
fn refunded_capture_id(resource: &Value) -> Option<String> {
    resource
        .get("links")
        .and_then(Value::as_array)
        .and_then(|links| {
            links.iter().find(|l| l.get("rel").and_then(Value::as_str) == Some("up"))
        })
        .and_then(|l| l.get("href").and_then(Value::as_str))
        .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(String::from)
}

/// A webhook delivery, classified by what it means for a pledge.
#[derive(Debug, Clone, PartialEq)]
pub enum PayPalEvent {
    /// A capture succeeded; may create a row if none matches.
    CaptureCompleted(CaptureFacts),
    /// The buyer's order completed; only updates an existing row.
    OrderCompleted(CaptureFacts),
    /// Denied, refunded or reversed capture.
    CaptureReversal(CaptureFacts),
    Ignored { event_type: Option<String> },
}

impl PayPalEvent {
    pub fn parse(body: &Value) -> Self {
        let event_type = str_at(body, "/event_type");
        let resource = body.get("resource").unwrap_or(&Value::Null);

        match event_type {
            Some(event_types::CAPTURE_COMPLETED) => {
                PayPalEvent::CaptureCompleted(facts_from_capture(resource, PledgeStatus::Captured))
            }
            Some(event_types::ORDER_COMPLETED) => {
                PayPalEvent::OrderCompleted(facts_from_order(resource, PledgeStatus::Captured))
            }
            Some(event_types::CAPTURE_DENIED) => {
                PayPalEvent::CaptureReversal(reversal(resource, PledgeStatus::Denied, None))
            }
            Some(event_types::CAPTURE_REVERSED) => {
                PayPalEvent::CaptureReversal(reversal(resource, PledgeStatus::Reversed, None))
            }
            Some(event_types::CAPTURE_REFUNDED) => PayPalEvent::CaptureReversal(reversal(
                resource,
                PledgeStatus::Refunded,
                refunded_capture_id(resource),
            )),
            other => PayPalEvent::Ignored {
                event_type: other.map(String::from),
            },
        }
    }
}

/// Failure facts carry ids only; amount stays whatever was captured.
fn reversal(resource: &Value, status: PledgeStatus, capture_id: Option<String>) -> CaptureFacts {
    CaptureFacts {
        status,
        order_id: owned_at(resource, "/supplementary_data/related_ids/order_id"),
        capture_id: capture_id.or_else(|| owned_at(resource, "/id")),
        amount_cents: None,
        currency: None,
        campaign_slug: None,
        reference_id: None,
        payer_email: None,
        payload: resource.clone(),
    }
}

/// Event type and resource id for the audit row, whatever the event.
pub fn audit_fields(body: &Value) -> (Option<String>, Option<String>) {
    (owned_at(body, "/event_type"), owned_at(body, "/resource/id"))
}
