// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort badge achievement evaluation.
//!
//! Runs after activity logging. Failures are logged by the caller and never
//! surfaced to the user.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::badge::{Badge, BadgeCriteriaType};
use crate::models::User;
use chrono::{DateTime, Utc};

/// Evaluates badge criteria against a user's ledger and activity history.
#[derive(Clone)]
pub struct BadgeEvaluator {
    db: FirestoreDb,
}

impl BadgeEvaluator {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Award any newly earned badges.
    ///
    /// Reward points are credited to the user's in-memory ledger; the caller
    /// persists the user. Returns the names of the badges awarded.
    pub async fn evaluate(
        &self,
        user: &mut User,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        let badges = self.db.active_badges().await?;
        if badges.is_empty() {
            return Ok(Vec::new());
        }

        let mut earned = self.db.get_earned_badges(&user.id).await?;
        let activity_count = self.db.count_activities_for_user(&user.id).await?;

        let mut awarded = Vec::new();
        for badge in badges {
            if earned.badge_ids.contains(&badge.id) {
                continue;
            }
            if !criteria_met(&badge, user, activity_count) {
                continue;
            }

            earned.badge_ids.push(badge.id.clone());
            if badge.points_reward > 0 {
                user.wellness.add_points(badge.points_reward, now);
            }
            tracing::info!(user_id = %user.id, badge = %badge.name, "Badge awarded");
            awarded.push(badge.name);
        }

        if !awarded.is_empty() {
            self.db.set_earned_badges(&user.id, &earned).await?;
        }

        Ok(awarded)
    }
}

fn criteria_met(badge: &Badge, user: &User, activity_count: u32) -> bool {
    match badge.criteria.criteria_type {
        BadgeCriteriaType::Points => user.wellness.total_points >= badge.criteria.value,
        BadgeCriteriaType::Streak => user.wellness.current_streak >= badge.criteria.value,
        BadgeCriteriaType::Activities => activity_count >= badge.criteria.value,
    }
}
