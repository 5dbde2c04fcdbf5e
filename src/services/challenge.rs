// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge lifecycle service: creation, roster management, and the
//! read-path categorizer with lazy expiry-penalty settlement.
//!
//! Categorization is a pure function over (challenge, viewer, clock); the
//! penalty pass that follows is the only write, guarded by the persisted
//! `points_lost` field so repeat listings never double-deduct.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::challenge::{
    Challenge, ChallengeError, ChallengeRules, ChallengeStatus, LeaderboardEntry, Participant,
    TodayProgress,
};
use crate::models::{ActivityType, Role};
use crate::time_utils::day_of;
use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

/// Days past `expires_at` before a challenge counts as old-expired.
const EXPIRY_GRACE_DAYS: i64 = 3;

/// Penalty rate applied to a participant's challenge points on expiry.
const EXPIRY_PENALTY_DIVISOR: u32 = 10;

/// Concurrent Firestore writes during the penalty pass.
const PENALTY_WRITE_CONCURRENCY: usize = 4;

/// The bucket a challenge lands in for a given viewing user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Today,
    Upcoming,
    Expired,
    Completed,
}

/// A challenge in the "today" bucket, with its remaining window.
#[derive(Debug, Clone, Serialize)]
pub struct TodayEntry {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub time_remaining_secs: i64,
}

/// The four mutually exclusive challenge listings.
#[derive(Debug, Default, Serialize)]
pub struct ChallengeBuckets {
    pub today: Vec<TodayEntry>,
    pub upcoming: Vec<Challenge>,
    pub expired: Vec<Challenge>,
    pub completed: Vec<Challenge>,
}

/// A participant's overall progress in one challenge.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MyProgress {
    pub total_progress: f64,
    pub total_points: u32,
    pub total_days_completed: u32,
    pub challenge_completed: bool,
    pub today_progress: TodayProgress,
}

/// Parameters for creating a challenge.
#[derive(Debug)]
pub struct NewChallenge {
    pub name: String,
    pub description: String,
    pub challenge_type: ActivityType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub rules: ChallengeRules,
    pub max_participants: Option<u32>,
}

/// Challenge lifecycle and listing service.
#[derive(Clone)]
pub struct ChallengeService {
    db: FirestoreDb,
}

impl ChallengeService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Create a challenge. Admin/HR only, at most one per creator per day.
    pub async fn create_challenge(
        &self,
        creator_id: &str,
        role: Role,
        new: NewChallenge,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        if !role.is_admin_or_hr() {
            return Err(AppError::Forbidden(
                "Only admins and HR can create challenges".to_string(),
            ));
        }
        if new.end_date <= new.start_date {
            return Err(AppError::Validation(
                "End date must be after start date".to_string(),
            ));
        }
        if new.rules.target_value <= 0.0 {
            return Err(AppError::Validation(
                "Target value must be positive".to_string(),
            ));
        }

        let window_start = start_of_day(now);
        let created_today = self
            .db
            .challenges_created_by_in_window(creator_id, window_start, window_start + Duration::days(1))
            .await?;
        if !created_today.is_empty() {
            return Err(AppError::PreconditionFailed(
                "Only one challenge can be created per day".to_string(),
            ));
        }

        let (status, expires_at) = Challenge::initial_status_and_expiry(new.start_date, now);
        let challenge = Challenge {
            id: uuid::Uuid::new_v4().to_string(),
            name: new.name,
            description: new.description,
            challenge_type: new.challenge_type,
            start_date: new.start_date,
            end_date: new.end_date,
            expires_at,
            status,
            rules: new.rules,
            participants: Vec::new(),
            max_participants: new.max_participants,
            created_by: creator_id.to_string(),
            created_at: now,
        };

        self.db.upsert_challenge(&challenge).await?;
        tracing::info!(
            challenge_id = %challenge.id,
            creator_id,
            challenge_type = %challenge.challenge_type,
            "Challenge created"
        );

        Ok(challenge)
    }

    /// Delete a challenge. Admin/HR only.
    pub async fn delete_challenge(&self, challenge_id: &str, role: Role) -> Result<()> {
        if !role.is_admin_or_hr() {
            return Err(AppError::Forbidden(
                "Only admins and HR can delete challenges".to_string(),
            ));
        }
        if self.db.get_challenge(challenge_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Challenge {}", challenge_id)));
        }
        self.db.delete_challenge(challenge_id).await?;
        tracing::info!(challenge_id, "Challenge deleted");
        Ok(())
    }

    /// Join a challenge.
    ///
    /// Blocked when the challenge is closed, the roster is full, the user
    /// already joined, or the user already has an active joined challenge of
    /// the same type overlapping today.
    pub async fn join_challenge(
        &self,
        challenge_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let mut challenge = self
            .db
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Challenge {}", challenge_id)))?;

        match challenge.status {
            ChallengeStatus::Completed | ChallengeStatus::Cancelled | ChallengeStatus::Expired => {
                return Err(AppError::PreconditionFailed(
                    "This challenge is no longer open for joining".to_string(),
                ));
            }
            ChallengeStatus::Upcoming | ChallengeStatus::Active => {}
        }

        // One active joined challenge per type per day
        let same_type = self
            .db
            .active_challenges_of_type(challenge.challenge_type)
            .await?;
        let already_joined_today = same_type.iter().any(|other| {
            other.id != challenge.id
                && other.start_date <= now
                && now <= other.end_date
                && other.participant(user_id).is_some()
        });
        if already_joined_today {
            return Err(AppError::PreconditionFailed(format!(
                "You already joined an active {} challenge today",
                challenge.challenge_type
            )));
        }

        challenge
            .add_participant(user_id, now)
            .map_err(roster_error)?;
        self.db.upsert_challenge(&challenge).await?;

        tracing::info!(challenge_id, user_id, "Participant joined");
        Ok(challenge)
    }

    /// Leave a challenge, dropping accumulated progress.
    pub async fn leave_challenge(&self, challenge_id: &str, user_id: &str) -> Result<()> {
        let mut challenge = self
            .db
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Challenge {}", challenge_id)))?;

        challenge.remove_participant(user_id).map_err(roster_error)?;
        self.db.upsert_challenge(&challenge).await?;

        tracing::info!(challenge_id, user_id, "Participant left");
        Ok(())
    }

    /// A participant's progress summary for one challenge.
    pub async fn my_progress(
        &self,
        challenge_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<MyProgress> {
        let challenge = self
            .db
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Challenge {}", challenge_id)))?;

        let participant = challenge
            .participant(user_id)
            .ok_or_else(|| {
                AppError::PreconditionFailed("You have not joined this challenge".to_string())
            })?;

        let today_progress = challenge
            .today_progress(user_id, day_of(now))
            .unwrap_or(TodayProgress {
                value: 0.0,
                completed: false,
                target: challenge.rules.target_value,
                remaining: challenge.rules.target_value,
            });

        Ok(MyProgress {
            total_progress: participant.progress,
            total_points: participant.points,
            total_days_completed: participant.total_days_completed,
            challenge_completed: participant.challenge_completed,
            today_progress,
        })
    }

    /// Ranked leaderboard for a challenge.
    pub async fn leaderboard(&self, challenge_id: &str) -> Result<Vec<LeaderboardEntry>> {
        let challenge = self
            .db
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Challenge {}", challenge_id)))?;

        Ok(challenge.leaderboard())
    }

    /// Bucket every challenge for a viewing user and settle expiry penalties.
    ///
    /// Upcoming challenges are only listed for admin/HR viewers.
    pub async fn list_challenges(
        &self,
        user_id: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<ChallengeBuckets> {
        let challenges = self.db.list_challenges().await?;

        let mut buckets = ChallengeBuckets::default();
        let mut penalized: Vec<(Challenge, u32)> = Vec::new();

        for mut challenge in challenges {
            let bucket = categorize(&challenge, challenge.participant(user_id), now);

            if bucket == Bucket::Expired {
                if let Some(penalty) = stage_expiry_penalty(&mut challenge, user_id, now) {
                    penalized.push((challenge.clone(), penalty));
                }
            }

            match bucket {
                Bucket::Completed => buckets.completed.push(challenge),
                Bucket::Expired => buckets.expired.push(challenge),
                Bucket::Upcoming => {
                    if role.is_admin_or_hr() {
                        buckets.upcoming.push(challenge);
                    }
                }
                Bucket::Today => {
                    let time_remaining_secs =
                        (challenge.expires_at - now).num_seconds().max(0);
                    buckets.today.push(TodayEntry {
                        challenge,
                        time_remaining_secs,
                    });
                }
            }
        }

        if !penalized.is_empty() {
            self.apply_penalties(user_id, penalized, now).await?;
        }

        Ok(buckets)
    }

    /// Persist staged expiry penalties: the participant records in parallel,
    /// then a single ledger deduction for the viewing user.
    async fn apply_penalties(
        &self,
        user_id: &str,
        penalized: Vec<(Challenge, u32)>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let total: u32 = penalized.iter().map(|(_, p)| p).sum();
        let challenge_count = penalized.len();

        stream::iter(penalized.into_iter().map(|(challenge, _)| {
            let db = self.db.clone();
            async move { db.upsert_challenge(&challenge).await }
        }))
        .buffer_unordered(PENALTY_WRITE_CONCURRENCY)
        .try_collect::<Vec<()>>()
        .await?;

        if total > 0 {
            let mut user = self
                .db
                .get_user(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
            user.wellness.deduct_points(total, now);
            self.db.upsert_user(&user).await?;

            tracing::info!(
                user_id,
                penalty = total,
                challenges = challenge_count,
                "Expiry penalties settled"
            );
        }

        Ok(())
    }
}

/// Assign a challenge to exactly one bucket for a viewing user.
///
/// Precedence: completed-by-viewer, then old-expired, then upcoming, then
/// today, then stale-active. Anything left (cancelled, lapsed windows) falls
/// through to expired so every challenge lands somewhere.
pub fn categorize(
    challenge: &Challenge,
    viewer: Option<&Participant>,
    now: DateTime<Utc>,
) -> Bucket {
    if viewer.is_some_and(|p| p.challenge_completed) {
        return Bucket::Completed;
    }

    if is_old_expired(challenge, now) && challenge.status != ChallengeStatus::Completed {
        return Bucket::Expired;
    }

    if challenge.status == ChallengeStatus::Upcoming && day_of(challenge.start_date) > day_of(now) {
        return Bucket::Upcoming;
    }

    if challenge.status == ChallengeStatus::Active {
        let in_window = challenge.start_date <= now && now <= challenge.end_date;
        if in_window && now <= challenge.expires_at {
            return Bucket::Today;
        }
        if now > challenge.expires_at {
            return Bucket::Expired;
        }
    }

    Bucket::Expired
}

/// Whether a challenge is past the grace window, 3+ days beyond `expires_at`.
fn is_old_expired(challenge: &Challenge, now: DateTime<Utc>) -> bool {
    challenge.expires_at < now - Duration::days(EXPIRY_GRACE_DAYS)
}

/// Stage the one-time 10% expiry penalty for a participant.
///
/// The penalty only applies once the grace window has lapsed; a stale-active
/// challenge merely past `expires_at` is listed as expired but not yet docked.
/// Returns the penalty amount and writes `points_lost` onto the roster entry;
/// `None` when the challenge is still in its grace window, the viewer did not
/// participate, completed the challenge, was already penalized, or has no
/// points to lose.
fn stage_expiry_penalty(
    challenge: &mut Challenge,
    user_id: &str,
    now: DateTime<Utc>,
) -> Option<u32> {
    if !is_old_expired(challenge, now) {
        return None;
    }

    let participant = challenge
        .participants
        .iter_mut()
        .find(|p| p.user_id == user_id)?;

    if participant.challenge_completed || participant.points_lost > 0 {
        return None;
    }

    let penalty = participant.points / EXPIRY_PENALTY_DIVISOR;
    if penalty == 0 {
        return None;
    }

    participant.points_lost = penalty;
    Some(penalty)
}

fn roster_error(err: ChallengeError) -> AppError {
    match err {
        ChallengeError::DuplicateParticipant => {
            AppError::PreconditionFailed("You have already joined this challenge".to_string())
        }
        ChallengeError::ChallengeFull => {
            AppError::PreconditionFailed("This challenge is full".to_string())
        }
        ChallengeError::NotAParticipant => {
            AppError::PreconditionFailed("You have not joined this challenge".to_string())
        }
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::TimeZone;
    // and_hms_opt(0,0,0) on a valid NaiveDate cannot fail
    Utc.from_utc_datetime(&day_of(now).and_hms_opt(0, 0, 0).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn challenge_with(status: ChallengeStatus, start: DateTime<Utc>, end: DateTime<Utc>, expires: DateTime<Utc>) -> Challenge {
        Challenge {
            id: "ch1".to_string(),
            name: "Steps".to_string(),
            description: String::new(),
            challenge_type: ActivityType::Steps,
            start_date: start,
            end_date: end,
            expires_at: expires,
            status,
            rules: ChallengeRules {
                target_value: 10000.0,
                unit: "steps".to_string(),
                ..Default::default()
            },
            participants: Vec::new(),
            max_participants: None,
            created_by: "admin1".to_string(),
            created_at: start,
        }
    }

    fn join(ch: &mut Challenge, user: &str, now: DateTime<Utc>) {
        ch.add_participant(user, now).unwrap();
    }

    #[test]
    fn test_categorize_completed_takes_precedence() {
        let now = at(2024, 6, 20, 12);
        // Old-expired challenge, but the viewer completed it
        let mut ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 11, 0),
            at(2024, 6, 11, 0),
        );
        join(&mut ch, "u1", at(2024, 6, 10, 1));
        ch.update_participant_progress("u1", 12000.0, 120, at(2024, 6, 10, 9), at(2024, 6, 10, 9))
            .unwrap();

        let bucket = categorize(&ch, ch.participant("u1"), now);
        assert_eq!(bucket, Bucket::Completed);
    }

    #[test]
    fn test_categorize_old_expired() {
        let now = at(2024, 6, 20, 12);
        let ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 11, 0),
            at(2024, 6, 11, 0),
        );
        assert_eq!(categorize(&ch, None, now), Bucket::Expired);
    }

    #[test]
    fn test_categorize_upcoming() {
        let now = at(2024, 6, 10, 12);
        let ch = challenge_with(
            ChallengeStatus::Upcoming,
            at(2024, 6, 12, 0),
            at(2024, 6, 13, 0),
            at(2024, 6, 13, 0),
        );
        assert_eq!(categorize(&ch, None, now), Bucket::Upcoming);
    }

    #[test]
    fn test_categorize_today_within_window() {
        let now = at(2024, 6, 10, 12);
        let ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 12, 0),
            at(2024, 6, 11, 0),
        );
        assert_eq!(categorize(&ch, None, now), Bucket::Today);
    }

    #[test]
    fn test_categorize_stale_active_becomes_expired() {
        // Active but past expires_at, within the 3-day grace window
        let now = at(2024, 6, 11, 12);
        let ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 17, 0),
            at(2024, 6, 11, 0),
        );
        assert_eq!(categorize(&ch, None, now), Bucket::Expired);
    }

    #[test]
    fn test_categorize_always_produces_exactly_one_bucket() {
        // Exhaustive sweep over statuses and clock positions; the function is
        // total so exclusivity is structural, but every combination must not panic
        let times = [
            at(2024, 6, 9, 12),
            at(2024, 6, 10, 12),
            at(2024, 6, 11, 12),
            at(2024, 6, 20, 12),
        ];
        for status in [
            ChallengeStatus::Upcoming,
            ChallengeStatus::Active,
            ChallengeStatus::Completed,
            ChallengeStatus::Expired,
            ChallengeStatus::Cancelled,
        ] {
            for now in times {
                let ch = challenge_with(
                    status,
                    at(2024, 6, 10, 0),
                    at(2024, 6, 12, 0),
                    at(2024, 6, 11, 0),
                );
                categorize(&ch, None, now);
            }
        }
    }

    #[test]
    fn test_expiry_penalty_staged_once() {
        let now = at(2024, 6, 20, 12);
        let mut ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 11, 0),
            at(2024, 6, 11, 0),
        );
        join(&mut ch, "u1", at(2024, 6, 10, 1));
        ch.update_participant_progress("u1", 2000.0, 200, at(2024, 6, 10, 9), at(2024, 6, 10, 9))
            .unwrap();

        // floor(200 * 0.10) = 20
        assert_eq!(stage_expiry_penalty(&mut ch, "u1", now), Some(20));
        assert_eq!(ch.participant("u1").unwrap().points_lost, 20);

        // Guarded by points_lost: repeat listings never double-deduct
        assert_eq!(stage_expiry_penalty(&mut ch, "u1", now), None);
    }

    #[test]
    fn test_expiry_penalty_waits_out_grace_window() {
        // One hour past expires_at: listed as expired, but not docked until
        // the challenge is three days past its window
        let mut ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 17, 0),
            at(2024, 6, 11, 0),
        );
        join(&mut ch, "u1", at(2024, 6, 10, 1));
        ch.update_participant_progress("u1", 2000.0, 200, at(2024, 6, 10, 9), at(2024, 6, 10, 9))
            .unwrap();

        let stale = at(2024, 6, 11, 1);
        assert_eq!(categorize(&ch, ch.participant("u1"), stale), Bucket::Expired);
        assert_eq!(stage_expiry_penalty(&mut ch, "u1", stale), None);
        assert_eq!(ch.participant("u1").unwrap().points_lost, 0);

        // Exactly three days past is still within the grace window
        assert_eq!(stage_expiry_penalty(&mut ch, "u1", at(2024, 6, 14, 0)), None);

        // Past the window the penalty is staged
        assert_eq!(stage_expiry_penalty(&mut ch, "u1", at(2024, 6, 14, 1)), Some(20));
        assert_eq!(ch.participant("u1").unwrap().points_lost, 20);
    }

    #[test]
    fn test_expiry_penalty_skips_completed_participant() {
        let now = at(2024, 6, 20, 12);
        let mut ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 11, 0),
            at(2024, 6, 11, 0),
        );
        join(&mut ch, "u1", at(2024, 6, 10, 1));
        ch.update_participant_progress("u1", 12000.0, 120, at(2024, 6, 10, 9), at(2024, 6, 10, 9))
            .unwrap();

        assert_eq!(stage_expiry_penalty(&mut ch, "u1", now), None);
    }

    #[test]
    fn test_expiry_penalty_skips_non_participant_and_zero_points() {
        let now = at(2024, 6, 20, 12);
        let mut ch = challenge_with(
            ChallengeStatus::Active,
            at(2024, 6, 10, 0),
            at(2024, 6, 11, 0),
            at(2024, 6, 11, 0),
        );
        assert_eq!(stage_expiry_penalty(&mut ch, "ghost", now), None);

        join(&mut ch, "u1", at(2024, 6, 10, 1));
        // Points below the divisor floor to zero: nothing staged
        ch.update_participant_progress("u1", 50.0, 5, at(2024, 6, 10, 9), at(2024, 6, 10, 9))
            .unwrap();
        assert_eq!(stage_expiry_penalty(&mut ch, "u1", now), None);
        assert_eq!(ch.participant("u1").unwrap().points_lost, 0);
    }
}
