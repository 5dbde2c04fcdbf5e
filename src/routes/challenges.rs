// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Challenge routes: listing buckets, creation, roster, and progress views.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::challenge::{Challenge, ChallengeRules, LeaderboardEntry};
use crate::models::ActivityType;
use crate::services::challenge::{ChallengeBuckets, MyProgress, NewChallenge};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/challenges", get(list_challenges).post(create_challenge))
        .route("/api/challenges/{id}", delete(delete_challenge))
        .route("/api/challenges/{id}/join", post(join_challenge))
        .route("/api/challenges/{id}/leave", post(leave_challenge))
        .route("/api/challenges/{id}/leaderboard", get(leaderboard))
        .route("/api/challenges/{id}/my-progress", get(my_progress))
}

/// List challenges bucketed for the current user.
///
/// Applies any pending expiry penalties for the viewer as a side effect.
async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ChallengeBuckets>> {
    let buckets = state
        .challenges
        .list_challenges(&user.user_id, user.role, chrono::Utc::now())
        .await?;
    Ok(Json(buckets))
}

#[derive(Debug, Deserialize, Validate)]
struct RulesRequest {
    target_value: f64,
    unit: String,
    #[serde(default = "default_multiplier")]
    point_multiplier: f64,
    #[serde(default)]
    requires_photo: bool,
    #[serde(default = "default_min_photos")]
    min_photos: u32,
    #[serde(default = "default_max_photos")]
    max_photos: u32,
    #[serde(default)]
    time_gap: Option<f64>,
}

fn default_multiplier() -> f64 {
    1.0
}
fn default_min_photos() -> u32 {
    1
}
fn default_max_photos() -> u32 {
    5
}

#[derive(Debug, Deserialize, Validate)]
struct CreateChallengeRequest {
    #[validate(length(min = 1, max = 200))]
    name: String,
    #[validate(length(max = 2000))]
    #[serde(default)]
    description: String,
    #[serde(rename = "type")]
    challenge_type: ActivityType,
    start_date: chrono::DateTime<chrono::Utc>,
    end_date: chrono::DateTime<chrono::Utc>,
    rules: RulesRequest,
    max_participants: Option<u32>,
}

/// Create a challenge (admin/HR only, one per creator per day).
async fn create_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateChallengeRequest>,
) -> Result<Json<Challenge>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if payload.rules.min_photos > payload.rules.max_photos {
        return Err(AppError::Validation(
            "min_photos cannot exceed max_photos".to_string(),
        ));
    }

    let new = NewChallenge {
        name: payload.name,
        description: payload.description,
        challenge_type: payload.challenge_type,
        start_date: payload.start_date,
        end_date: payload.end_date,
        rules: ChallengeRules {
            target_value: payload.rules.target_value,
            unit: payload.rules.unit,
            point_multiplier: payload.rules.point_multiplier,
            requires_photo: payload.rules.requires_photo,
            min_photos: payload.rules.min_photos,
            max_photos: payload.rules.max_photos,
            time_gap: payload.rules.time_gap,
        },
        max_participants: payload.max_participants,
    };

    let challenge = state
        .challenges
        .create_challenge(&user.user_id, user.role, new, chrono::Utc::now())
        .await?;
    Ok(Json(challenge))
}

/// Delete a challenge (admin/HR only).
async fn delete_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.challenges.delete_challenge(&id, user.role).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Join a challenge.
async fn join_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Challenge>> {
    let challenge = state
        .challenges
        .join_challenge(&id, &user.user_id, chrono::Utc::now())
        .await?;
    Ok(Json(challenge))
}

/// Leave a challenge.
async fn leave_challenge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    state.challenges.leave_challenge(&id, &user.user_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Ranked leaderboard for a challenge.
async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LeaderboardResponse>> {
    let leaderboard = state.challenges.leaderboard(&id).await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}

/// The current user's progress in a challenge.
async fn my_progress(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MyProgress>> {
    let progress = state
        .challenges
        .my_progress(&id, &user.user_id, chrono::Utc::now())
        .await?;
    Ok(Json(progress))
}
