mod paypal;

pub use paypal::*;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Short error code appended as `?pay_error=` when a browser checkout fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayErrorCode {
    Cancelled,
    Declined,
    Expired,
    Invalid,
    Network,
    Unknown,
}
