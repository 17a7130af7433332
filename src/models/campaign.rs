use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub goal_cents: i64,
    pub starts_at: Option<i64>,
    pub ends_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateCampaign {
    pub slug: String,
    pub title: String,
    pub goal_cents: i64,
    pub starts_at: Option<i64>,
    pub ends_at: Option<i64>,
}

/// A fixed pledge level within a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub id: String,
    pub campaign_id: String,
    pub title: String,
    pub amount_cents: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateTier {
    pub title: String,
    pub amount_cents: i64,
}

/// Aggregate over paid pledges of one campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignTotals {
    pub raised_cents: i64,
    pub backers: i64,
    pub goal_cents: i64,
}
