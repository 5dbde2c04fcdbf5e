// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wellness-Tracker: employee wellness gamification backend
//!
//! This crate provides the backend API for logging wellness activities,
//! running daily challenges, and keeping each employee's points ledger.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{ActivityRecorder, ChallengeService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub recorder: ActivityRecorder,
    pub challenges: ChallengeService,
}
