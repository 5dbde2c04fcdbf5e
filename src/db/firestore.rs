// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile + embedded points ledger)
//! - Challenges (aggregate with embedded participant roster)
//! - Activities (logged wellness activities)
//! - Badges (catalog + per-user earned sets)

use crate::db::collections;
use crate::error::AppError;
use crate::models::badge::EarnedBadges;
use crate::models::{Activity, ActivityType, Badge, Challenge, ChallengeStatus, User};
use chrono::{DateTime, Utc};

/// Cursor for forward pagination of activity listings.
#[derive(Debug, Clone, Copy)]
pub struct ActivityQueryCursor {
    pub activity_date: DateTime<Utc>,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Challenge Operations ────────────────────────────────────

    /// Get a challenge by ID.
    pub async fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CHALLENGES)
            .obj()
            .one(challenge_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a challenge.
    pub async fn upsert_challenge(&self, challenge: &Challenge) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CHALLENGES)
            .document_id(&challenge.id)
            .object(challenge)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a challenge.
    pub async fn delete_challenge(&self, challenge_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::CHALLENGES)
            .document_id(challenge_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List every challenge, newest start date first.
    ///
    /// The categorizer needs the full set with participant rosters; the
    /// challenge count is small (one per admin per day).
    pub async fn list_challenges(&self) -> Result<Vec<Challenge>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .order_by([(
                "start_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Challenges created by an admin within a time window.
    ///
    /// Used for the one-challenge-per-admin-per-day precondition.
    pub async fn challenges_created_by_in_window(
        &self,
        admin_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Challenge>, AppError> {
        let admin_id = admin_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .filter(move |q| {
                q.for_all([
                    q.field("created_by").eq(admin_id.clone()),
                    q.field("created_at").greater_than_or_equal(window_start),
                    q.field("created_at").less_than(window_end),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active challenges of a given type.
    ///
    /// Participant membership and date-window checks are applied in memory by
    /// the caller; Firestore cannot filter on embedded roster entries.
    pub async fn active_challenges_of_type(
        &self,
        challenge_type: ActivityType,
    ) -> Result<Vec<Challenge>, AppError> {
        let type_str = challenge_type.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .filter(move |q| {
                q.for_all([
                    q.field("type").eq(type_str.clone()),
                    q.field("status").eq(ChallengeStatus::Active.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by ID.
    pub async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(activity_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store an activity.
    pub async fn set_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an activity (verification rejection path).
    pub async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(activity_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get activities for a user with optional type filter and cursor pagination.
    pub async fn get_activities_for_user(
        &self,
        user_id: &str,
        activity_type: Option<ActivityType>,
        cursor: Option<ActivityQueryCursor>,
        limit: u32,
    ) -> Result<Vec<Activity>, AppError> {
        let user_id = user_id.to_string();
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all(
                    [
                        Some(q.field("user_id").eq(user_id.clone())),
                        activity_type
                            .map(|t| q.field("type").eq(t.to_string())),
                        cursor.map(|c| q.field("activity_date").less_than(c.activity_date)),
                    ]
                    .into_iter()
                    .flatten(),
                )
            });

        query
            .order_by([(
                "activity_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recent activity for a user in a challenge since a given time.
    ///
    /// Used by the hydration time-gap check (same day, same challenge, same type).
    pub async fn latest_challenge_activity(
        &self,
        user_id: &str,
        challenge_id: &str,
        activity_type: ActivityType,
        since: DateTime<Utc>,
    ) -> Result<Option<Activity>, AppError> {
        let user_id = user_id.to_string();
        let challenge_id = challenge_id.to_string();
        let results: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id.clone()),
                    q.field("challenge_id").eq(challenge_id.clone()),
                    q.field("type").eq(activity_type.to_string()),
                    q.field("activity_date").greater_than_or_equal(since),
                ])
            })
            .order_by([(
                "activity_date",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(results.into_iter().next())
    }

    /// Unverified activities that carry a photo (admin verification queue).
    pub async fn unverified_activities(&self) -> Result<Vec<Activity>, AppError> {
        let results: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.for_all([q.field("verified").eq(false)]))
            .order_by([(
                "created_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Photo presence can't be expressed as a simple field filter
        Ok(results.into_iter().filter(|a| a.photo.is_some()).collect())
    }

    /// Lifetime activity count for a user (badge criteria).
    pub async fn count_activities_for_user(&self, user_id: &str) -> Result<u32, AppError> {
        let user_id = user_id.to_string();
        let results: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(results.len() as u32)
    }

    // ─── Badge Operations ────────────────────────────────────────

    /// Active badge catalog entries.
    pub async fn active_badges(&self) -> Result<Vec<Badge>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BADGES)
            .filter(|q| q.for_all([q.field("is_active").eq(true)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Badges a user has earned.
    pub async fn get_earned_badges(&self, user_id: &str) -> Result<EarnedBadges, AppError> {
        Ok(self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::EARNED_BADGES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .unwrap_or_default())
    }

    /// Store a user's earned badge set.
    pub async fn set_earned_badges(
        &self,
        user_id: &str,
        earned: &EarnedBadges,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EARNED_BADGES)
            .document_id(user_id)
            .object(earned)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
