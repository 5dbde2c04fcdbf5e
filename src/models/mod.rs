// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod badge;
pub mod challenge;
pub mod user;

pub use activity::{points_for, Activity, ActivityType, PhotoBundle, PhotoEntry};
pub use badge::Badge;
pub use challenge::{Challenge, ChallengeStatus, Participant, ProgressUpdate};
pub use user::{Role, User, WellnessProfile};
