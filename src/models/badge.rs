//! Badge catalog model, consumed by the best-effort badge evaluator.

use serde::{Deserialize, Serialize};

/// What a badge's criteria measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCriteriaType {
    /// Total ledger points
    Points,
    /// Current streak length
    Streak,
    /// Lifetime activity count
    Activities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadgeCriteria {
    #[serde(rename = "type")]
    pub criteria_type: BadgeCriteriaType,
    pub value: u32,
}

/// Badge catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    /// Document ID
    pub id: String,
    pub name: String,
    pub criteria: BadgeCriteria,
    /// Bonus points credited on award
    pub points_reward: u32,
    pub is_active: bool,
}

/// Badges a user has earned (stored per user).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EarnedBadges {
    pub badge_ids: Vec<String>,
}
