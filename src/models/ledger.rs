use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LedgerEventType {
    EmailCapture,
    PaymentCapture,
}

impl LedgerEventType {
    /// Leaves awarded for the event.
    pub fn default_delta(self) -> i64 {
        match self {
            LedgerEventType::EmailCapture => 1,
            LedgerEventType::PaymentCapture => 2,
        }
    }
}

/// Append-only scoring record. Never the source of truth for money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub profile_id: String,
    pub event_type: LedgerEventType,
    pub leaf_delta: i64,
    pub reason: String,
    pub source_app: String,
    pub source: Option<String>,
    pub campaign_slug: Option<String>,
    /// Links the award to the event that caused it; unique per profile and type.
    pub external_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateLedgerEntry {
    pub profile_id: String,
    pub event_type: LedgerEventType,
    pub leaf_delta: i64,
    pub reason: String,
    pub source: Option<String>,
    pub campaign_slug: Option<String>,
    pub external_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl CreateLedgerEntry {
    pub fn new(profile_id: &str, event_type: LedgerEventType, reason: &str) -> Self {
        Self {
            profile_id: profile_id.to_string(),
            event_type,
            leaf_delta: event_type.default_delta(),
            reason: reason.to_string(),
            source: None,
            campaign_slug: None,
            external_id: None,
            metadata: serde_json::json!({}),
        }
    }
}
