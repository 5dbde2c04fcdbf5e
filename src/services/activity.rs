// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity recording service.
//!
//! Handles the core workflow:
//! 1. Resolve the activity value (manual or Google Fit auto-fetch)
//! 2. Enforce challenge rules (photo quota, hydration time gap)
//! 3. Store the activity and credit the points ledger
//! 4. Settle challenge progress and any daily completion bonus
//! 5. Best-effort badge evaluation
//!
//! Also hosts the admin verification gate for photo-proof activities.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::challenge::{Challenge, ChallengeRules, ChallengeStatus, ProgressUpdate};
use crate::models::user::YogaWarning;
use crate::models::{points_for, Activity, ActivityType, PhotoBundle, PhotoEntry, User};
use crate::services::{BadgeEvaluator, GoogleFitClient};
use crate::time_utils::{day_of, format_utc_rfc3339};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Input for logging an activity.
#[derive(Debug)]
pub struct LogActivityInput {
    pub activity_type: ActivityType,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Required unless `auto_fetch` resolves the value
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub challenge_id: Option<String>,
    pub photos: Vec<PhotoEntry>,
    /// Fetch steps from Google Fit instead of a manual value
    pub auto_fetch: bool,
    pub activity_date: Option<DateTime<Utc>>,
}

/// Result of logging an activity.
#[derive(Debug, serde::Serialize)]
pub struct LogActivityOutcome {
    pub activity: Activity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_update: Option<ProgressUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yoga_warning: Option<YogaWarning>,
}

/// Records activities and drives ledger and challenge settlement.
#[derive(Clone)]
pub struct ActivityRecorder {
    db: FirestoreDb,
    fitness: GoogleFitClient,
    badges: BadgeEvaluator,
}

impl ActivityRecorder {
    pub fn new(db: FirestoreDb, fitness: GoogleFitClient, badges: BadgeEvaluator) -> Self {
        Self {
            db,
            fitness,
            badges,
        }
    }

    /// Log an activity for a user.
    pub async fn log_activity(
        &self,
        user_id: &str,
        input: LogActivityInput,
        now: DateTime<Utc>,
    ) -> Result<LogActivityOutcome> {
        let mut user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        let activity_date = input.activity_date.unwrap_or(now);

        // Resolve the value: Google Fit auto-fetch for steps, manual otherwise
        let (value, pre_verified) = if input.auto_fetch {
            if input.activity_type != ActivityType::Steps {
                return Err(AppError::Validation(
                    "Auto-fetch is only supported for step activities".to_string(),
                ));
            }
            let steps = self
                .fetch_steps_with_refresh(&mut user, day_of(activity_date))
                .await?;
            (ensure_steps_found(steps)?, true)
        } else {
            let value = input
                .value
                .ok_or_else(|| AppError::Validation("Activity value is required".to_string()))?;
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(
                    "Activity value must be a non-negative number".to_string(),
                ));
            }
            (value, false)
        };

        // Load the explicit challenge (if any) and enforce its rules up front
        let explicit_challenge = match &input.challenge_id {
            Some(id) => {
                let challenge = self
                    .db
                    .get_challenge(id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Challenge {}", id)))?;

                check_photo_quota(&challenge.rules, input.photos.len())?;
                self.check_time_gap(&challenge, user_id, input.activity_type, now)
                    .await?;

                Some(challenge)
            }
            None => None,
        };

        let points = points_for(input.activity_type, value);
        let unit = input
            .unit
            .unwrap_or_else(|| default_unit(input.activity_type).to_string());

        let activity = Activity {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            activity_type: input.activity_type,
            title: input.title,
            description: input.description,
            value,
            unit,
            points,
            challenge_id: input.challenge_id.clone(),
            verified: pre_verified,
            verified_by: None,
            verified_at: None,
            photo: PhotoBundle::from_entries(input.photos, now),
            activity_date,
            created_at: now,
        };
        self.db.set_activity(&activity).await?;

        // Credit the ledger
        user.wellness.add_points(points, now);
        user.wellness.update_streak(now);
        if input.activity_type == ActivityType::Yoga {
            user.wellness.track_yoga_session(now);
        }
        // The weekly yoga nudge rides on every log, not just yoga sessions
        let warning = user.wellness.check_yoga_warning(now);
        let yoga_warning = warning.warning.then_some(warning);

        // Settle challenge progress; bonus points are a second ledger credit
        let challenge_update = self
            .settle_challenge(
                &mut user,
                user_id,
                explicit_challenge,
                input.activity_type,
                value,
                points,
                activity_date,
                now,
            )
            .await?;

        // Badge evaluation is non-critical
        if let Err(e) = self.badges.evaluate(&mut user, now).await {
            tracing::warn!(user_id, error = %e, "Badge evaluation failed");
        }

        self.db.upsert_user(&user).await?;

        tracing::info!(
            user_id,
            activity_id = %activity.id,
            activity_type = %activity.activity_type,
            points,
            "Activity logged"
        );

        Ok(LogActivityOutcome {
            activity,
            challenge_update,
            yoga_warning,
        })
    }

    /// Update challenge progress for a logged activity.
    ///
    /// Uses the explicit challenge when it is active and type-matching
    /// (silently skipped otherwise), or auto-discovers an active joined
    /// challenge of the same type.
    #[allow(clippy::too_many_arguments)]
    async fn settle_challenge(
        &self,
        user: &mut User,
        user_id: &str,
        explicit: Option<Challenge>,
        activity_type: ActivityType,
        value: f64,
        points: u32,
        activity_date: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<ProgressUpdate>> {
        let mut challenge = match explicit {
            Some(ch)
                if ch.status == ChallengeStatus::Active
                    && ch.challenge_type == activity_type
                    && ch.participant(user_id).is_some() =>
            {
                ch
            }
            Some(_) => {
                tracing::debug!(user_id, "Explicit challenge not settleable, skipping");
                return Ok(None);
            }
            None => {
                let candidates = self.db.active_challenges_of_type(activity_type).await?;
                match candidates.into_iter().find(|ch| {
                    ch.start_date <= now && now <= ch.end_date && ch.participant(user_id).is_some()
                }) {
                    Some(ch) => ch,
                    None => return Ok(None),
                }
            }
        };

        let update =
            match challenge.update_participant_progress(user_id, value, points, activity_date, now)
            {
                Ok(update) => update,
                Err(e) => {
                    tracing::debug!(user_id, challenge_id = %challenge.id, error = %e, "Skipping settlement");
                    return Ok(None);
                }
            };

        self.db.upsert_challenge(&challenge).await?;

        if update.bonus_points > 0 {
            user.wellness.add_points(update.bonus_points, now);
            tracing::info!(
                user_id,
                challenge_id = %challenge.id,
                bonus = update.bonus_points,
                "Daily completion bonus credited"
            );
        }

        Ok(Some(update))
    }

    /// Fetch steps from Google Fit, refreshing an expired access token once.
    ///
    /// A refreshed token is written back onto the user; the caller persists it.
    async fn fetch_steps_with_refresh(
        &self,
        user: &mut User,
        day: chrono::NaiveDate,
    ) -> Result<f64> {
        let token = user
            .google_fit_token
            .clone()
            .ok_or(AppError::ExternalSource {
                message: "Google Fit is not connected".to_string(),
                allow_manual: true,
            })?;

        match self.fitness.fetch_steps_for_day(&token, day).await {
            Ok(steps) => Ok(steps),
            Err(err) => {
                let Some(refresh) = user.google_fit_refresh_token.clone() else {
                    return Err(err);
                };
                tracing::debug!(user_id = %user.id, "Refreshing Google Fit token");
                let new_token = self.fitness.refresh_token(&refresh).await?;
                let steps = self.fitness.fetch_steps_for_day(&new_token, day).await?;
                user.google_fit_token = Some(new_token);
                Ok(steps)
            }
        }
    }

    /// Enforce the hydration time-gap rule for a challenge.
    async fn check_time_gap(
        &self,
        challenge: &Challenge,
        user_id: &str,
        activity_type: ActivityType,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let gap_hours = match challenge.rules.time_gap {
            Some(gap) if challenge.challenge_type == ActivityType::Hydration => gap,
            _ => return Ok(()),
        };

        let midnight = Utc
            .from_utc_datetime(&day_of(now).and_hms_opt(0, 0, 0).ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("Invalid midnight for {}", day_of(now)))
            })?);

        let latest = self
            .db
            .latest_challenge_activity(user_id, &challenge.id, activity_type, midnight)
            .await?;

        if let Some(previous) = latest {
            let next_allowed = next_allowed_after(previous.activity_date, gap_hours);
            if now < next_allowed {
                return Err(AppError::PreconditionFailed(format!(
                    "Please wait {} hours between logs. Next entry allowed at {}",
                    gap_hours,
                    format_utc_rfc3339(next_allowed)
                )));
            }
        }

        Ok(())
    }

    // ─── Verification Gate ───────────────────────────────────────

    /// Mark an activity verified, stamping the verifier.
    pub async fn verify_activity(
        &self,
        activity_id: &str,
        admin_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Activity> {
        let mut activity = self
            .db
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        if activity.verified {
            return Err(AppError::Conflict(
                "Activity is already verified".to_string(),
            ));
        }

        activity.verified = true;
        activity.verified_by = Some(admin_id.to_string());
        activity.verified_at = Some(now);
        if let Some(photo) = &mut activity.photo {
            photo.verified = true;
        }

        self.db.set_activity(&activity).await?;
        tracing::info!(activity_id, admin_id, "Activity verified");

        Ok(activity)
    }

    /// Reject an unverified activity: reverse the ledger credit and delete it.
    ///
    /// Returns the number of points deducted.
    pub async fn reject_activity(
        &self,
        activity_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let activity = self
            .db
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", activity_id)))?;

        if activity.verified {
            return Err(AppError::Conflict(
                "Cannot reject an already verified activity".to_string(),
            ));
        }

        let mut user = self
            .db
            .get_user(&activity.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", activity.user_id)))?;

        user.wellness.deduct_points(activity.points, now);
        self.db.upsert_user(&user).await?;
        self.db.delete_activity(activity_id).await?;

        tracing::info!(
            activity_id,
            user_id = %activity.user_id,
            points = activity.points,
            reason,
            "Activity rejected"
        );

        Ok(activity.points)
    }
}

/// Check a photo count against a challenge's photo quota.
fn check_photo_quota(rules: &ChallengeRules, photo_count: usize) -> Result<()> {
    if !rules.requires_photo {
        return Ok(());
    }

    let count = photo_count as u32;
    if count < rules.min_photos {
        return Err(AppError::PreconditionFailed(format!(
            "This challenge requires at least {} photo(s) as proof",
            rules.min_photos
        )));
    }
    if count > rules.max_photos {
        return Err(AppError::PreconditionFailed(format!(
            "At most {} photo(s) may be attached",
            rules.max_photos
        )));
    }

    Ok(())
}

/// Treat an empty Google Fit aggregate as "no data", falling back to manual
/// entry rather than recording a pre-verified zero-point activity.
fn ensure_steps_found(steps: f64) -> Result<f64> {
    if steps <= 0.0 {
        return Err(AppError::ExternalSource {
            message: "No step data found for this day".to_string(),
            allow_manual: true,
        });
    }
    Ok(steps)
}

/// Earliest timestamp the next time-gapped log is allowed.
fn next_allowed_after(previous: DateTime<Utc>, gap_hours: f64) -> DateTime<Utc> {
    previous + Duration::seconds((gap_hours * 3600.0) as i64)
}

/// Default display unit for an activity type.
fn default_unit(activity_type: ActivityType) -> &'static str {
    match activity_type {
        ActivityType::Steps => "steps",
        ActivityType::Meditation
        | ActivityType::Workout
        | ActivityType::Yoga
        | ActivityType::Walking
        | ActivityType::Running
        | ActivityType::Cycling => "minutes",
        ActivityType::Hydration => "glasses",
        ActivityType::Sleep => "hours",
        ActivityType::Nutrition | ActivityType::HealthyEating => "meals",
        ActivityType::Custom => "units",
    }
}
