use serde::{Deserialize, Serialize};

/// Audit row for one inbound provider delivery, acted upon or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub source: String,
    pub event_type: Option<String>,
    pub resource_id: Option<String>,
    pub verified: bool,
    /// Delivery body exactly as received.
    pub payload: String,
    pub received_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateWebhookEvent {
    pub source: String,
    pub event_type: Option<String>,
    pub resource_id: Option<String>,
    pub verified: bool,
    pub payload: String,
}
