// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;
use wellness_tracker::models::Role;

mod common;

fn post_json(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_log_activity_missing_type() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("u1", Role::Employee, &state.config.jwt_signing_key);

    let response = app
        .oneshot(post_json(
            "/api/activities",
            &token,
            serde_json::json!({ "value": 5000 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_log_activity_unknown_type_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("u1", Role::Employee, &state.config.jwt_signing_key);

    let response = app
        .oneshot(post_json(
            "/api/activities",
            &token,
            serde_json::json!({ "type": "skydiving", "value": 1 }),
        ))
        .await
        .unwrap();

    // Unknown enum variant fails deserialization
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_cursor_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("u1", Role::Employee, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/activities?cursor=!!not-base64!!")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_challenge_requires_admin_role() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("u1", Role::Employee, &state.config.jwt_signing_key);

    let response = app
        .oneshot(post_json(
            "/api/challenges",
            &token,
            serde_json::json!({
                "name": "10k Steps",
                "type": "steps",
                "start_date": "2026-09-01T00:00:00Z",
                "end_date": "2026-09-08T00:00:00Z",
                "rules": { "target_value": 10000.0, "unit": "steps" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_challenge_empty_name_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("hr1", Role::Hr, &state.config.jwt_signing_key);

    let response = app
        .oneshot(post_json(
            "/api/challenges",
            &token,
            serde_json::json!({
                "name": "",
                "type": "steps",
                "start_date": "2026-09-01T00:00:00Z",
                "end_date": "2026-09-08T00:00:00Z",
                "rules": { "target_value": 10000.0, "unit": "steps" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_challenge_bad_photo_bounds_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("admin1", Role::Admin, &state.config.jwt_signing_key);

    let response = app
        .oneshot(post_json(
            "/api/challenges",
            &token,
            serde_json::json!({
                "name": "Gym proof",
                "type": "workout",
                "start_date": "2026-09-01T00:00:00Z",
                "end_date": "2026-09-08T00:00:00Z",
                "rules": {
                    "target_value": 45.0,
                    "unit": "minutes",
                    "requires_photo": true,
                    "min_photos": 4,
                    "max_photos": 2
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verification_queue_requires_admin() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("u1", Role::Employee, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/activities/unverified")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_verify_requires_admin() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("u1", Role::Employee, &state.config.jwt_signing_key);

    let response = app
        .oneshot(post_json(
            "/api/activities/a1/verify",
            &token,
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
