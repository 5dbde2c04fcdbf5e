// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity routes: logging, listing, and the admin verification queue.

use crate::db::firestore::ActivityQueryCursor;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Activity, ActivityType, PhotoEntry};
use crate::services::activity::{LogActivityInput, LogActivityOutcome};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CURSOR_PARTS: usize = 2;
const MAX_PER_PAGE: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", post(log_activity).get(get_activities))
        .route("/api/activities/unverified", get(get_unverified))
        .route("/api/activities/{id}/verify", post(verify_activity))
        .route("/api/activities/{id}/reject", post(reject_activity))
}

// ─── Logging ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct PhotoPayload {
    url: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct LogActivityRequest {
    #[serde(rename = "type")]
    activity_type: Option<ActivityType>,
    title: Option<String>,
    description: Option<String>,
    value: Option<f64>,
    unit: Option<String>,
    challenge_id: Option<String>,
    #[serde(default)]
    photos: Vec<PhotoPayload>,
    /// Fetch steps from Google Fit instead of a manual value
    #[serde(default)]
    auto_fetch: bool,
    activity_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Log an activity for the current user.
async fn log_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<LogActivityRequest>,
) -> Result<Json<LogActivityOutcome>> {
    let activity_type = payload
        .activity_type
        .ok_or_else(|| AppError::Validation("Activity type is required".to_string()))?;

    let now = chrono::Utc::now();
    let photos = payload
        .photos
        .into_iter()
        .map(|p| PhotoEntry {
            url: p.url,
            description: p.description,
            uploaded_at: now,
        })
        .collect();

    let input = LogActivityInput {
        activity_type,
        title: payload.title,
        description: payload.description,
        value: payload.value,
        unit: payload.unit,
        challenge_id: payload.challenge_id,
        photos,
        auto_fetch: payload.auto_fetch,
        activity_date: payload.activity_date,
    };

    let outcome = state.recorder.log_activity(&user.user_id, input, now).await?;
    Ok(Json(outcome))
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ActivitiesQuery {
    /// Filter by activity type
    #[serde(rename = "type")]
    activity_type: Option<ActivityType>,
    /// Cursor for forward pagination (opaque token).
    cursor: Option<String>,
    /// Pagination: items per page
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_per_page() -> u32 {
    50
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<ActivityQueryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor =
                || AppError::Validation("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let parts: Vec<&str> = decoded_str.split(':').collect();
            if parts.len() != CURSOR_PARTS {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let activity_date =
                chrono::DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(ActivityQueryCursor { activity_date })
        })
        .transpose()
}

fn encode_cursor(cursor: ActivityQueryCursor) -> String {
    let payload = format!(
        "{}:{}",
        cursor.activity_date.timestamp(),
        cursor.activity_date.timestamp_subsec_nanos()
    );
    URL_SAFE_NO_PAD.encode(payload)
}

#[derive(Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

/// Get the current user's activities, newest first.
async fn get_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>> {
    let limit = params.per_page.min(MAX_PER_PAGE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    // Fetch one extra item to determine if another page is available
    let fetch_limit = limit.saturating_add(1);
    let mut activities = state
        .db
        .get_activities_for_user(&user.user_id, params.activity_type, cursor, fetch_limit)
        .await?;

    let has_more = activities.len() > limit as usize;
    if has_more {
        activities.truncate(limit as usize);
    }

    let next_cursor = if has_more {
        activities.last().map(|a| {
            encode_cursor(ActivityQueryCursor {
                activity_date: a.activity_date,
            })
        })
    } else {
        None
    };

    Ok(Json(ActivitiesResponse {
        activities,
        per_page: limit,
        next_cursor,
    }))
}

// ─── Verification Gate (admin/HR) ────────────────────────────

#[derive(Serialize)]
pub struct UnverifiedResponse {
    pub activities: Vec<Activity>,
}

/// Photo-proof activities awaiting verification.
async fn get_unverified(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UnverifiedResponse>> {
    require_admin(&user)?;
    let activities = state.db.unverified_activities().await?;
    Ok(Json(UnverifiedResponse { activities }))
}

/// Approve a photo-proof activity.
async fn verify_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    require_admin(&user)?;
    let activity = state
        .recorder
        .verify_activity(&id, &user.user_id, chrono::Utc::now())
        .await?;
    Ok(Json(activity))
}

#[derive(Deserialize)]
struct RejectRequest {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Serialize)]
pub struct RejectResponse {
    pub points_deducted: u32,
}

/// Reject a photo-proof activity, reversing its ledger credit.
async fn reject_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> Result<Json<RejectResponse>> {
    require_admin(&user)?;
    let reason = payload.reason.as_deref().unwrap_or("No reason given");
    let points_deducted = state
        .recorder
        .reject_activity(&id, reason, chrono::Utc::now())
        .await?;
    Ok(Json(RejectResponse { points_deducted }))
}

fn require_admin(user: &AuthUser) -> Result<()> {
    if !user.role.is_admin_or_hr() {
        return Err(AppError::Forbidden(
            "Admin or HR role required".to_string(),
        ));
    }
    Ok(())
}
