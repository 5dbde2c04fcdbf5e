// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use wellness_tracker::config::Config;
use wellness_tracker::db::FirestoreDb;
use wellness_tracker::middleware::auth::create_jwt;
use wellness_tracker::models::Role;
use wellness_tracker::routes::create_router;
use wellness_tracker::services::{ActivityRecorder, BadgeEvaluator, ChallengeService, GoogleFitClient};
use wellness_tracker::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();

    let fitness = GoogleFitClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let badges = BadgeEvaluator::new(db.clone());
    let recorder = ActivityRecorder::new(db.clone(), fitness, badges);
    let challenges = ChallengeService::new(db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        recorder,
        challenges,
    });

    (create_router(state.clone()), state)
}

/// Create a signed JWT for tests.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, role: Role, signing_key: &[u8]) -> String {
    create_jwt(user_id, role, signing_key).expect("Failed to create test JWT")
}
