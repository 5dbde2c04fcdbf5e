// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity model and the deterministic point function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wellness activity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    Steps,
    Meditation,
    Workout,
    Hydration,
    Sleep,
    Yoga,
    Walking,
    Running,
    Cycling,
    Nutrition,
    HealthyEating,
    Custom,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityType::Steps => "steps",
            ActivityType::Meditation => "meditation",
            ActivityType::Workout => "workout",
            ActivityType::Hydration => "hydration",
            ActivityType::Sleep => "sleep",
            ActivityType::Yoga => "yoga",
            ActivityType::Walking => "walking",
            ActivityType::Running => "running",
            ActivityType::Cycling => "cycling",
            ActivityType::Nutrition => "nutrition",
            ActivityType::HealthyEating => "healthy-eating",
            ActivityType::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// One photo attached to an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoEntry {
    /// URL or base64 data URL
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Photo bundle attached to an activity.
///
/// `url` is the canonical single-photo field (the first entry); `urls` keeps
/// every entry. Uploaded files take precedence over URL/base64 entries for
/// the canonical field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoBundle {
    /// "single" or "multiple"
    pub kind: String,
    pub url: String,
    pub urls: Vec<PhotoEntry>,
    pub uploaded_at: DateTime<Utc>,
    pub verified: bool,
}

impl PhotoBundle {
    pub fn from_entries(entries: Vec<PhotoEntry>, now: DateTime<Utc>) -> Option<Self> {
        let first = entries.first()?.url.clone();
        Some(Self {
            kind: if entries.len() > 1 { "multiple" } else { "single" }.to_string(),
            url: first,
            urls: entries,
            uploaded_at: now,
            verified: false,
        })
    }
}

/// Stored activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Document ID
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub value: f64,
    pub unit: String,
    pub points: u32,
    #[serde(default)]
    pub challenge_id: Option<String>,
    pub verified: bool,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub photo: Option<PhotoBundle>,
    pub activity_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Deterministic point value for a logged activity.
///
/// steps: 1 point per 100 steps; meditation: 10/minute; workout family:
/// 20/minute; hydration: 5/glass; sleep: 2/hour; nutrition family:
/// 15/meal; anything else: 10/unit. Never negative.
pub fn points_for(activity_type: ActivityType, value: f64) -> u32 {
    let value = value.max(0.0);
    let points = match activity_type {
        ActivityType::Steps => (value / 100.0).floor(),
        ActivityType::Meditation => value.floor() * 10.0,
        ActivityType::Workout
        | ActivityType::Yoga
        | ActivityType::Walking
        | ActivityType::Running
        | ActivityType::Cycling => value.floor() * 20.0,
        ActivityType::Hydration => value * 5.0,
        ActivityType::Sleep => value.floor() * 2.0,
        ActivityType::Nutrition | ActivityType::HealthyEating => value * 15.0,
        _ => value.floor() * 10.0,
    };
    points.max(0.0) as u32
}
