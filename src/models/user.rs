//! User model and the wellness points ledger.
//!
//! The ledger owns a user's cumulative point total, level, streaks, and the
//! time-bucketed monthly/weekly sub-ledgers. Each mutation path is idempotent
//! per its time bucket (day for streaks, month for points, ISO week for yoga)
//! because `add_points` is invoked from several call sites per request.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::{day_of, month_key, week_key};

/// Points needed to advance one level.
pub const POINTS_PER_LEVEL: u32 = 500;
/// Default monthly points target.
pub const DEFAULT_MONTHLY_TARGET: u32 = 1000;
/// Default yoga sessions per ISO week.
pub const DEFAULT_WEEKLY_YOGA_TARGET: u32 = 2;
/// Points advertised in the weekly yoga warning.
pub const YOGA_WARNING_POINTS: u32 = 300;
/// Day of month on/after which the counseling check fires.
const COUNSELING_CHECK_DAY: u32 = 28;

/// User role for authorization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Employee,
    Admin,
    Hr,
}

impl Role {
    /// Admin and HR share the elevated management surface.
    pub fn is_admin_or_hr(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Document ID
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub wellness: WellnessProfile,
    /// Google Fit OAuth access token, if the user connected Google Fit
    #[serde(default)]
    pub google_fit_token: Option<String>,
    #[serde(default)]
    pub google_fit_refresh_token: Option<String>,
    pub created_at: String,
}

/// Derived health status from the weighted ledger score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    NeedsAttention,
    Critical,
}

/// One calendar month of the points sub-ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyPoints {
    /// "YYYY-MM"
    pub month: String,
    pub points: u32,
    pub target_points: u32,
    pub counseling_required: bool,
}

/// One ISO week of yoga session tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyYoga {
    /// "YYYY-W##"
    pub week: String,
    pub sessions: u32,
    pub target_sessions: u32,
    /// Suppresses repeat warnings within a day
    #[serde(default)]
    pub last_warning_date: Option<NaiveDate>,
}

/// The points ledger embedded in a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellnessProfile {
    pub total_points: u32,
    pub level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default)]
    pub last_activity_date: Option<NaiveDate>,
    #[serde(default)]
    pub monthly_points: Vec<MonthlyPoints>,
    #[serde(default)]
    pub weekly_yoga: Vec<WeeklyYoga>,
    pub health_status: HealthStatus,
}

impl Default for WellnessProfile {
    fn default() -> Self {
        Self {
            total_points: 0,
            level: 1,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            monthly_points: Vec::new(),
            weekly_yoga: Vec::new(),
            health_status: HealthStatus::Good,
        }
    }
}

/// Result of the weekly yoga warning check.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct YogaWarning {
    pub warning: bool,
    pub days_remaining: u32,
    pub sessions_needed: u32,
    pub sessions_completed: u32,
    /// Points at stake for completing the remaining sessions
    pub points: u32,
}

impl WellnessProfile {
    /// Credit points to the ledger.
    ///
    /// Recomputes the level, upserts the current month's sub-ledger entry,
    /// applies the end-of-month counseling check, and refreshes the derived
    /// health status. Deductions go through `deduct_points` instead.
    pub fn add_points(&mut self, amount: u32, now: DateTime<Utc>) {
        self.total_points += amount;
        self.level = self.total_points / POINTS_PER_LEVEL + 1;

        let entry = self.monthly_entry_mut(&month_key(now));
        entry.points += amount;

        // Counseling check near end of month
        if now.day() >= COUNSELING_CHECK_DAY {
            entry.counseling_required = entry.points < entry.target_points;
        }

        self.update_health_status(now);
    }

    /// Deduct points, clamping the total and the month's running total at zero.
    pub fn deduct_points(&mut self, amount: u32, now: DateTime<Utc>) {
        self.total_points = self.total_points.saturating_sub(amount);
        self.level = self.total_points / POINTS_PER_LEVEL + 1;

        let key = month_key(now);
        if let Some(entry) = self.monthly_points.iter_mut().find(|m| m.month == key) {
            entry.points = entry.points.saturating_sub(amount);
        }

        self.update_health_status(now);
    }

    /// Update the daily streak. Idempotent within a calendar day.
    pub fn update_streak(&mut self, now: DateTime<Utc>) {
        let today = day_of(now);

        match self.last_activity_date {
            Some(last) => {
                let days = (today - last).num_days();
                if days == 0 {
                    // Already logged today
                    return;
                } else if days == 1 {
                    self.current_streak += 1;
                } else {
                    if self.current_streak > self.longest_streak {
                        self.longest_streak = self.current_streak;
                    }
                    self.current_streak = 1;
                }
            }
            None => {
                self.current_streak = 1;
            }
        }

        self.last_activity_date = Some(today);
        self.level = self.total_points / POINTS_PER_LEVEL + 1;
    }

    /// Count a yoga session toward the current ISO week.
    pub fn track_yoga_session(&mut self, now: DateTime<Utc>) {
        let entry = self.weekly_entry_mut(&week_key(now));
        entry.sessions += 1;
        self.update_health_status(now);
    }

    /// Check whether a weekly yoga warning is due.
    ///
    /// Warns when 3 or fewer days remain in the ISO week and sessions are
    /// still needed. Stamps `last_warning_date` so the warning fires at most
    /// once per day.
    pub fn check_yoga_warning(&mut self, now: DateTime<Utc>) -> YogaWarning {
        let today = day_of(now);
        // 0 = Sunday, matching the source system's week accounting
        let day_index = now.weekday().num_days_from_sunday();
        let days_remaining = 7 - day_index;

        let entry = self.weekly_entry_mut(&week_key(now));
        let sessions_needed = entry.target_sessions.saturating_sub(entry.sessions);
        let sessions_completed = entry.sessions;

        if days_remaining <= 3 && sessions_needed > 0 && entry.last_warning_date != Some(today) {
            entry.last_warning_date = Some(today);
            return YogaWarning {
                warning: true,
                days_remaining,
                sessions_needed,
                sessions_completed,
                points: YOGA_WARNING_POINTS,
            };
        }

        YogaWarning {
            warning: false,
            days_remaining,
            sessions_needed,
            sessions_completed,
            points: 0,
        }
    }

    /// Recompute the derived health status.
    ///
    /// Weighted score: 40% total-points tiers, 30% current-month target
    /// attainment, 20% weekly yoga attainment, 10% streak tiers.
    pub fn update_health_status(&mut self, now: DateTime<Utc>) {
        let mut score = 0u32;

        // Points contribution (40%)
        score += match self.total_points {
            p if p >= 5000 => 40,
            p if p >= 3000 => 30,
            p if p >= 1500 => 20,
            p if p >= 500 => 10,
            _ => 0,
        };

        // Monthly target (30%)
        let key = month_key(now);
        let (monthly, target) = self
            .monthly_points
            .iter()
            .find(|m| m.month == key)
            .map_or((0, DEFAULT_MONTHLY_TARGET), |m| (m.points, m.target_points));
        let target = f64::from(target);
        let monthly = f64::from(monthly);
        if monthly >= target {
            score += 30;
        } else if monthly >= target * 0.7 {
            score += 20;
        } else if monthly >= target * 0.5 {
            score += 10;
        }

        // Yoga sessions (20%)
        let wkey = week_key(now);
        let (sessions, yoga_target) = self
            .weekly_yoga
            .iter()
            .find(|w| w.week == wkey)
            .map_or((0, DEFAULT_WEEKLY_YOGA_TARGET), |w| {
                (w.sessions, w.target_sessions)
            });
        let yoga_target = f64::from(yoga_target);
        let sessions = f64::from(sessions);
        if sessions >= yoga_target {
            score += 20;
        } else if sessions >= yoga_target * 0.5 {
            score += 10;
        }

        // Streak (10%)
        score += match self.current_streak {
            s if s >= 30 => 10,
            s if s >= 14 => 7,
            s if s >= 7 => 5,
            _ => 0,
        };

        self.health_status = match score {
            s if s >= 80 => HealthStatus::Excellent,
            s if s >= 60 => HealthStatus::Good,
            s if s >= 40 => HealthStatus::Fair,
            s if s >= 20 => HealthStatus::NeedsAttention,
            _ => HealthStatus::Critical,
        };
    }

    fn monthly_entry_mut(&mut self, key: &str) -> &mut MonthlyPoints {
        let idx = match self.monthly_points.iter().position(|m| m.month == key) {
            Some(idx) => idx,
            None => {
                self.monthly_points.push(MonthlyPoints {
                    month: key.to_string(),
                    points: 0,
                    target_points: DEFAULT_MONTHLY_TARGET,
                    counseling_required: false,
                });
                self.monthly_points.len() - 1
            }
        };
        &mut self.monthly_points[idx]
    }

    fn weekly_entry_mut(&mut self, key: &str) -> &mut WeeklyYoga {
        let idx = match self.weekly_yoga.iter().position(|w| w.week == key) {
            Some(idx) => idx,
            None => {
                self.weekly_yoga.push(WeeklyYoga {
                    week: key.to_string(),
                    sessions: 0,
                    target_sessions: DEFAULT_WEEKLY_YOGA_TARGET,
                    last_warning_date: None,
                });
                self.weekly_yoga.len() - 1
            }
        };
        &mut self.weekly_yoga[idx]
    }
}
