// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge aggregate: definition, participant roster, and per-participant
//! daily progress tracking.
//!
//! Completion is participant-scoped, not challenge-scoped: a challenge never
//! transitions to `completed` on its own. Each participant carries a daily
//! progress log (at most one entry per calendar day) plus a one-time
//! `challenge_completed` milestone flag, because the daily UI feedback and the
//! listing buckets need different granularities from the same progress stream.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::activity::ActivityType;
use crate::time_utils::day_of;

/// Hours a daily challenge stays open after it starts.
pub const DAILY_CHALLENGE_HOURS: i64 = 24;

/// Challenge lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Upcoming,
    Active,
    Completed,
    Expired,
    Cancelled,
}

impl ChallengeStatus {
    /// Wire representation, matching the serde rename.
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Upcoming => "upcoming",
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Expired => "expired",
            ChallengeStatus::Cancelled => "cancelled",
        }
    }
}

/// Per-challenge rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRules {
    pub target_value: f64,
    pub unit: String,
    /// Multiplier applied to the target for the daily completion bonus
    pub point_multiplier: f64,
    #[serde(default)]
    pub requires_photo: bool,
    /// Minimum photos when `requires_photo` (e.g. 2 for before/after)
    pub min_photos: u32,
    pub max_photos: u32,
    /// Hours between logs for hydration challenges
    #[serde(default)]
    pub time_gap: Option<f64>,
}

impl Default for ChallengeRules {
    fn default() -> Self {
        Self {
            target_value: 0.0,
            unit: String::new(),
            point_multiplier: 1.0,
            requires_photo: false,
            min_photos: 1,
            max_photos: 5,
            time_gap: None,
        }
    }
}

/// One calendar day of a participant's progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub value: f64,
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A participant embedded in a challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
    /// Cumulative progress across all days
    pub progress: f64,
    /// Cumulative challenge-scoped points (including daily bonuses)
    pub points: u32,
    #[serde(default)]
    pub daily_progress: Vec<DailyProgress>,
    pub total_days_completed: u32,
    pub challenge_completed: bool,
    #[serde(default)]
    pub challenge_completed_at: Option<DateTime<Utc>>,
    /// Expiry penalty, written at most once
    pub points_lost: u32,
}

/// Stored challenge record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Document ID
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub challenge_type: ActivityType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Daily challenges close 24 hours after they open
    pub expires_at: DateTime<Utc>,
    pub status: ChallengeStatus,
    pub rules: ChallengeRules,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Errors from challenge roster and progress operations.
#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("User is already a participant")]
    DuplicateParticipant,

    #[error("Challenge is full")]
    ChallengeFull,

    #[error("User is not a participant")]
    NotAParticipant,
}

/// Settlement summary returned by `update_participant_progress`.
///
/// `bonus_points` is already reflected in the participant's own points field;
/// the caller is responsible for crediting it to the user's ledger.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProgressUpdate {
    pub daily_completed: bool,
    pub daily_progress: f64,
    pub target_value: f64,
    pub total_days_completed: u32,
    pub bonus_points: u32,
    pub challenge_completed: bool,
}

/// A participant's progress for a single day, as shown in the daily view.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TodayProgress {
    pub value: f64,
    pub completed: bool,
    pub target: f64,
    /// Never negative
    pub remaining: f64,
}

/// Leaderboard row with a dense 1-based rank.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub progress: f64,
    pub points: u32,
}

impl Challenge {
    /// Initial status and expiry for a new challenge.
    ///
    /// A challenge starting today (or backdated) opens immediately and runs
    /// for 24 hours from now; a future challenge is upcoming and will run for
    /// 24 hours from its start date.
    pub fn initial_status_and_expiry(
        start_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (ChallengeStatus, DateTime<Utc>) {
        if day_of(start_date) == day_of(now) || start_date <= now {
            (
                ChallengeStatus::Active,
                now + Duration::hours(DAILY_CHALLENGE_HOURS),
            )
        } else {
            (
                ChallengeStatus::Upcoming,
                start_date + Duration::hours(DAILY_CHALLENGE_HOURS),
            )
        }
    }

    /// Add a user to the roster with zeroed progress.
    pub fn add_participant(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ChallengeError> {
        if self.participants.iter().any(|p| p.user_id == user_id) {
            return Err(ChallengeError::DuplicateParticipant);
        }

        if let Some(max) = self.max_participants {
            if self.participants.len() as u32 >= max {
                return Err(ChallengeError::ChallengeFull);
            }
        }

        self.participants.push(Participant {
            user_id: user_id.to_string(),
            joined_at: now,
            progress: 0.0,
            points: 0,
            daily_progress: Vec::new(),
            total_days_completed: 0,
            challenge_completed: false,
            challenge_completed_at: None,
            points_lost: 0,
        });

        Ok(())
    }

    /// Find a participant record for a user.
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Remove a user from the roster, dropping their progress.
    pub fn remove_participant(&mut self, user_id: &str) -> Result<(), ChallengeError> {
        let idx = self
            .participants
            .iter()
            .position(|p| p.user_id == user_id)
            .ok_or(ChallengeError::NotAParticipant)?;
        self.participants.remove(idx);
        Ok(())
    }

    /// Apply a progress/points delta for one activity.
    ///
    /// Progress accumulates into the activity date's daily entry (created
    /// lazily) and the participant's cumulative totals. The daily completion
    /// check fires at most once per calendar day: the first time the daily
    /// value reaches the target, the entry is irreversibly marked completed,
    /// `total_days_completed` increments, and the bonus
    /// `floor(target * multiplier)` is added to the participant's points.
    /// The first completed day also sets the participant-level
    /// `challenge_completed` flag, which never resets.
    pub fn update_participant_progress(
        &mut self,
        user_id: &str,
        progress: f64,
        points: u32,
        activity_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ProgressUpdate, ChallengeError> {
        let target_value = self.rules.target_value;
        let point_multiplier = self.rules.point_multiplier;

        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(ChallengeError::NotAParticipant)?;

        let day = day_of(activity_date);
        let idx = match participant.daily_progress.iter().position(|d| d.date == day) {
            Some(idx) => idx,
            None => {
                participant.daily_progress.push(DailyProgress {
                    date: day,
                    value: 0.0,
                    completed: false,
                    completed_at: None,
                });
                participant.daily_progress.len() - 1
            }
        };

        participant.daily_progress[idx].value += progress;
        participant.progress += progress;
        participant.points += points;

        let mut bonus_points = 0;
        let entry = &mut participant.daily_progress[idx];
        if !entry.completed && entry.value >= target_value {
            entry.completed = true;
            entry.completed_at = Some(now);
            participant.total_days_completed += 1;

            bonus_points = (target_value * point_multiplier).floor().max(0.0) as u32;
            participant.points += bonus_points;

            if !participant.challenge_completed {
                participant.challenge_completed = true;
                participant.challenge_completed_at = Some(now);
            }
        }

        Ok(ProgressUpdate {
            daily_completed: participant.daily_progress[idx].completed,
            daily_progress: participant.daily_progress[idx].value,
            target_value,
            total_days_completed: participant.total_days_completed,
            bonus_points,
            challenge_completed: participant.challenge_completed,
        })
    }

    /// Today's progress for a user, zeroed if nothing logged yet.
    pub fn today_progress(&self, user_id: &str, today: NaiveDate) -> Option<TodayProgress> {
        let participant = self.participant(user_id)?;

        let entry = participant.daily_progress.iter().find(|d| d.date == today);
        let value = entry.map_or(0.0, |d| d.value);
        let completed = entry.is_some_and(|d| d.completed);

        Some(TodayProgress {
            value,
            completed,
            target: self.rules.target_value,
            remaining: (self.rules.target_value - value).max(0.0),
        })
    }

    /// Rank participants by cumulative progress, descending.
    ///
    /// Ties keep roster order: the sort is stable and no explicit tie-break
    /// rule is applied.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut sorted: Vec<&Participant> = self.participants.iter().collect();
        sorted.sort_by(|a, b| {
            b.progress
                .partial_cmp(&a.progress)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        sorted
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i as u32 + 1,
                user_id: p.user_id.clone(),
                progress: p.progress,
                points: p.points,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn steps_challenge(target: f64, multiplier: f64) -> Challenge {
        Challenge {
            id: "ch1".to_string(),
            name: "10k Steps".to_string(),
            description: "Hit the daily step target".to_string(),
            challenge_type: ActivityType::Steps,
            start_date: at(2024, 6, 10, 0),
            end_date: at(2024, 6, 17, 0),
            expires_at: at(2024, 6, 11, 0),
            status: ChallengeStatus::Active,
            rules: ChallengeRules {
                target_value: target,
                unit: "steps".to_string(),
                point_multiplier: multiplier,
                ..Default::default()
            },
            participants: Vec::new(),
            max_participants: None,
            created_by: "admin1".to_string(),
            created_at: at(2024, 6, 10, 0),
        }
    }

    #[test]
    fn test_add_participant_rejects_duplicate() {
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);

        ch.add_participant("u1", now).unwrap();
        let err = ch.add_participant("u1", now).unwrap_err();

        assert!(matches!(err, ChallengeError::DuplicateParticipant));
        assert_eq!(ch.participants.len(), 1);
    }

    #[test]
    fn test_add_participant_rejects_full_roster() {
        let mut ch = steps_challenge(10000.0, 1.0);
        ch.max_participants = Some(2);
        let now = at(2024, 6, 10, 8);

        ch.add_participant("u1", now).unwrap();
        ch.add_participant("u2", now).unwrap();
        let err = ch.add_participant("u3", now).unwrap_err();

        assert!(matches!(err, ChallengeError::ChallengeFull));
    }

    #[test]
    fn test_remove_participant() {
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);
        ch.add_participant("u1", now).unwrap();

        ch.remove_participant("u1").unwrap();
        assert!(ch.participants.is_empty());

        let err = ch.remove_participant("u1").unwrap_err();
        assert!(matches!(err, ChallengeError::NotAParticipant));
    }

    #[test]
    fn test_progress_requires_participation() {
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);

        let err = ch
            .update_participant_progress("ghost", 100.0, 1, now, now)
            .unwrap_err();
        assert!(matches!(err, ChallengeError::NotAParticipant));
    }

    #[test]
    fn test_daily_target_hit_across_two_logs() {
        // Target 10000, logs of 6000 then 5000 the same day
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);
        ch.add_participant("u1", now).unwrap();

        let first = ch
            .update_participant_progress("u1", 6000.0, 60, now, now)
            .unwrap();
        assert!(!first.daily_completed);
        assert_eq!(first.daily_progress, 6000.0);
        assert_eq!(first.bonus_points, 0);

        let later = at(2024, 6, 10, 14);
        let second = ch
            .update_participant_progress("u1", 5000.0, 50, later, later)
            .unwrap();
        assert!(second.daily_completed);
        assert_eq!(second.daily_progress, 11000.0);
        assert_eq!(second.bonus_points, 10000);
        assert!(second.challenge_completed);
    }

    #[test]
    fn test_daily_completion_fires_at_most_once_per_day() {
        let mut ch = steps_challenge(1000.0, 2.0);
        let now = at(2024, 6, 10, 8);
        ch.add_participant("u1", now).unwrap();

        let first = ch
            .update_participant_progress("u1", 1500.0, 15, now, now)
            .unwrap();
        assert_eq!(first.total_days_completed, 1);
        assert_eq!(first.bonus_points, 2000);

        // Further logs the same day stay above target but never re-complete
        for _ in 0..3 {
            let update = ch
                .update_participant_progress("u1", 500.0, 5, now, now)
                .unwrap();
            assert!(update.daily_completed);
            assert_eq!(update.total_days_completed, 1);
            assert_eq!(update.bonus_points, 0);
        }
    }

    #[test]
    fn test_separate_days_complete_separately() {
        let mut ch = steps_challenge(1000.0, 1.0);
        let day1 = at(2024, 6, 10, 8);
        let day2 = at(2024, 6, 11, 8);
        ch.add_participant("u1", day1).unwrap();

        ch.update_participant_progress("u1", 1200.0, 12, day1, day1)
            .unwrap();
        let update = ch
            .update_participant_progress("u1", 1100.0, 11, day2, day2)
            .unwrap();

        assert_eq!(update.total_days_completed, 2);
        assert_eq!(update.bonus_points, 1000);

        // The milestone flag was set on day 1 and stays set
        let p = ch.participant("u1").unwrap();
        assert!(p.challenge_completed);
        assert_eq!(p.challenge_completed_at, Some(day1));
    }

    #[test]
    fn test_today_progress_zeroed_when_no_entry() {
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);
        ch.add_participant("u1", now).unwrap();

        let progress = ch.today_progress("u1", day_of(now)).unwrap();
        assert_eq!(progress.value, 0.0);
        assert!(!progress.completed);
        assert_eq!(progress.remaining, 10000.0);
    }

    #[test]
    fn test_today_progress_remaining_never_negative() {
        let mut ch = steps_challenge(1000.0, 1.0);
        let now = at(2024, 6, 10, 8);
        ch.add_participant("u1", now).unwrap();
        ch.update_participant_progress("u1", 2500.0, 25, now, now)
            .unwrap();

        let progress = ch.today_progress("u1", day_of(now)).unwrap();
        assert_eq!(progress.remaining, 0.0);
    }

    #[test]
    fn test_today_progress_none_for_non_participant() {
        let ch = steps_challenge(10000.0, 1.0);
        assert!(ch.today_progress("ghost", day_of(at(2024, 6, 10, 8))).is_none());
    }

    #[test]
    fn test_leaderboard_orders_by_progress_desc() {
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);
        for user in ["u1", "u2", "u3"] {
            ch.add_participant(user, now).unwrap();
        }
        ch.update_participant_progress("u1", 300.0, 3, now, now)
            .unwrap();
        ch.update_participant_progress("u2", 500.0, 5, now, now)
            .unwrap();
        ch.update_participant_progress("u3", 100.0, 1, now, now)
            .unwrap();

        let board = ch.leaderboard();
        assert_eq!(board.len(), 3);
        assert_eq!((board[0].rank, board[0].progress), (1, 500.0));
        assert_eq!((board[1].rank, board[1].progress), (2, 300.0));
        assert_eq!((board[2].rank, board[2].progress), (3, 100.0));
    }

    #[test]
    fn test_leaderboard_ties_keep_roster_order() {
        let mut ch = steps_challenge(10000.0, 1.0);
        let now = at(2024, 6, 10, 8);
        for user in ["u1", "u2"] {
            ch.add_participant(user, now).unwrap();
        }
        ch.update_participant_progress("u1", 200.0, 2, now, now)
            .unwrap();
        ch.update_participant_progress("u2", 200.0, 2, now, now)
            .unwrap();

        let board = ch.leaderboard();
        assert_eq!(board[0].user_id, "u1");
        assert_eq!(board[1].user_id, "u2");
    }

    #[test]
    fn test_initial_status_today_is_active() {
        let now = at(2024, 6, 10, 9);
        let (status, expires_at) = Challenge::initial_status_and_expiry(at(2024, 6, 10, 0), now);

        assert_eq!(status, ChallengeStatus::Active);
        assert_eq!(expires_at, now + Duration::hours(24));
    }

    #[test]
    fn test_initial_status_future_is_upcoming() {
        let now = at(2024, 6, 10, 9);
        let start = at(2024, 6, 12, 0);
        let (status, expires_at) = Challenge::initial_status_and_expiry(start, now);

        assert_eq!(status, ChallengeStatus::Upcoming);
        assert_eq!(expires_at, start + Duration::hours(24));
    }

    #[test]
    fn test_initial_status_backdated_is_active() {
        let now = at(2024, 6, 10, 9);
        let (status, expires_at) = Challenge::initial_status_and_expiry(at(2024, 6, 8, 0), now);

        assert_eq!(status, ChallengeStatus::Active);
        assert_eq!(expires_at, now + Duration::hours(24));
    }
}
