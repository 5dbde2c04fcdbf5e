// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Business logic services.

pub mod activity;
pub mod badges;
pub mod challenge;
pub mod fitness;

pub use activity::ActivityRecorder;
pub use badges::BadgeEvaluator;
pub use challenge::ChallengeService;
pub use fitness::GoogleFitClient;
