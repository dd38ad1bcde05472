// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.
//!
//! Malformed input must be refused before any start.gg or Firestore access,
//! so these run against the offline app.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

async fn post_json(uri: &str, body: &str) -> axum::response::Response {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_start_rejects_unsupported_best_of() {
    let response = post_json("/api/sets/1/start", r#"{"bestOf": 4}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = common::body_json(response).await;
    assert_eq!(json["errors"][0], "bestOf: must be 3 or 5");
}

#[tokio::test]
async fn test_start_rejects_malformed_body() {
    let response = post_json("/api/sets/1/start", r#"{"bestOf": "five"}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_requires_games() {
    let response = post_json("/api/sets/1/submit", r#"{"games": []}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "validation_failed");
}

#[tokio::test]
async fn test_submit_rejects_stock_count_above_three() {
    let body = r#"{
        "games": [{
            "index": 1,
            "stage": "Battlefield",
            "winner": "p1",
            "stocksP1": 4,
            "stocksP2": 0,
            "characterP1": "mario",
            "characterP2": "fox"
        }]
    }"#;
    let response = post_json("/api/sets/1/submit", body).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_rejects_unknown_winner() {
    let body = r#"{
        "games": [{
            "index": 1,
            "stage": "Battlefield",
            "winner": "p3",
            "characterP1": "mario",
            "characterP2": "fox"
        }]
    }"#;
    let response = post_json("/api/sets/1/submit", body).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_rejects_long_notes() {
    let body = format!(
        r#"{{
            "games": [{{
                "index": 1,
                "stage": "Battlefield",
                "winner": "p1",
                "characterP1": "mario",
                "characterP2": "fox"
            }}],
            "notes": "{}"
        }}"#,
        "n".repeat(1001)
    );
    let response = post_json("/api/sets/1/submit", &body).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_rejects_invalid_json() {
    let response = post_json("/api/sets/1/submit", "{not json").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rps_rejects_unknown_choice() {
    let response = post_json("/api/sets/1/rps", r#"{"choice": "lizard"}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_ban_rejects_unknown_stage() {
    let response = post_json("/api/sets/1/bans", r#"{"stage": "Temple"}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_ban_rejects_empty_stage() {
    let response = post_json("/api/sets/1/bans", r#"{"stage": ""}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_draft_rejects_scalar_data() {
    let response = post_json("/api/sets/1/draft", r#"{"data": 42}"#).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = common::body_json(response).await;
    assert_eq!(json["errors"][0], "data: must be an object or array");
}

#[tokio::test]
async fn test_event_sets_rejects_unknown_status() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(12345, &state.config.jwt_signing_key);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/events/100/sets?status=junk1")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.cache.is_empty());
}
