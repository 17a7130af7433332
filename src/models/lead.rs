use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum LeadRole {
    Work,
    Life,
}

impl LeadRole {
    /// Case-insensitive parse; anything but WORK/LIFE is a client error.
    pub fn parse(raw: &str) -> Result<Self> {
        raw.trim()
            .to_uppercase()
            .parse()
            .map_err(|_| AppError::BadRequest(msg::INVALID_ROLE.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub email: String,
    pub role: LeadRole,
    pub source: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateLead {
    pub email: String,
    pub role: LeadRole,
    pub source: String,
}

/// Longer-form interest submission from the work page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkForm {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub website: Option<String>,
    pub message: String,
    pub role: LeadRole,
    pub source: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateWorkForm {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub website: Option<String>,
    pub message: String,
    pub role: LeadRole,
    pub source: String,
}
