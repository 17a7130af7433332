use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

/// Lifecycle of a pledge.
///
/// `intent` is the only initial state. `recorded`, `captured` and `paid` form
/// the success tier and are peers of each other; `denied`, `refunded` and
/// `reversed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PledgeStatus {
    Intent,
    Recorded,
    Captured,
    Paid,
    Denied,
    Refunded,
    Reversed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pledge status cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: PledgeStatus,
    pub to: PledgeStatus,
}

impl PledgeStatus {
    pub fn is_success(self) -> bool {
        Self::SUCCESS.contains(&self)
    }

    /// Statuses a row in `self` may be moved to.
    pub fn allowed_next(self) -> &'static [PledgeStatus] {
        use PledgeStatus::*;
        match self {
            Intent => &[Recorded, Captured, Paid, Denied],
            Recorded | Captured | Paid => &[Recorded, Captured, Paid, Denied, Refunded, Reversed],
            Denied => &[Denied],
            Refunded => &[Refunded],
            Reversed => &[Reversed],
        }
    }

    pub fn can_transition_to(self, next: PledgeStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Status to store when `observed` is reported for a row currently in `self`.
    ///
    /// Success peers keep the stored label so repeated captures from either
    /// entry point converge on one value.
    pub fn advance(self, observed: PledgeStatus) -> Result<PledgeStatus, TransitionError> {
        if !self.can_transition_to(observed) {
            return Err(TransitionError {
                from: self,
                to: observed,
            });
        }
        if self.is_success() && observed.is_success() {
            Ok(self)
        } else {
            Ok(observed)
        }
    }

    /// Statuses counted as money raised.
    pub const SUCCESS: [PledgeStatus; 3] = [
        PledgeStatus::Recorded,
        PledgeStatus::Captured,
        PledgeStatus::Paid,
    ];
}

impl std::fmt::Display for PledgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pledge {
    pub id: String,
    pub campaign_id: Option<String>,
    pub tier_id: Option<String>,
    pub profile_id: Option<String>,
    /// Identity-provider user that owns this pledge (None for webhook fallbacks).
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PledgeStatus,
    pub paypal_order_id: Option<String>,
    pub paypal_capture_id: Option<String>,
    /// Free-form object: client context (`returnTo`) and provider payload (`paypal`, `via`).
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Pledge {
    pub fn return_to(&self) -> Option<&str> {
        self.metadata.get("returnTo").and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePledge {
    pub campaign_id: Option<String>,
    pub tier_id: Option<String>,
    pub profile_id: Option<String>,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PledgeStatus,
    pub paypal_order_id: Option<String>,
    pub paypal_capture_id: Option<String>,
    pub metadata: serde_json::Value,
}
