use serde::{Deserialize, Serialize};

/// A person known by email, optionally linked to an identity-provider user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// External identity (session `sub`) once the person has signed in.
    pub user_id: Option<String>,
    pub leaf_total: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateProfile {
    /// Already normalized (lowercase, trimmed).
    pub email: String,
    pub display_name: Option<String>,
    pub user_id: Option<String>,
}

impl CreateProfile {
    /// Profile for an email seen for the first time; display name is the local part.
    pub fn from_email(email: &str) -> Self {
        Self {
            email: email.to_string(),
            display_name: email.split('@').next().map(str::to_string),
            user_id: None,
        }
    }
}
