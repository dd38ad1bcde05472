// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login and callback tests.
//!
//! These tests drive `/auth/login` and `/auth/callback` through the router,
//! with a local stand-in for the start.gg token and GraphQL endpoints.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::post,
    Json, Router,
};
use startgg_manager::routes::auth::{sign_state, verify_and_decode_state, OAUTH_SCOPES};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

mod common;

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).unwrap().into_owned())
    })
}

fn valid_state(frontend_url: &str, secret: &[u8]) -> String {
    sign_state(frontend_url, 1_700_000_000_000, secret).unwrap()
}

/// start.gg stand-in whose token endpoint refuses every code.
async fn refusing_startgg(calls: Arc<AtomicUsize>) -> String {
    let router = Router::new().route(
        "/oauth/access_token",
        post(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": "invalid_grant",
                        "error_description": "The authorization code is invalid"
                    })),
                )
            }
        }),
    );
    common::spawn_server(router).await
}

#[tokio::test]
async fn test_login_redirects_to_startgg() {
    let (app, state) = common::create_test_app();

    let response = get(app, "/auth/login").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let url = location(&response);
    assert!(url.starts_with(&state.config.startgg_authorize_url));
    assert_eq!(
        query_param(&url, "client_id").as_deref(),
        Some(state.config.startgg_client_id.as_str())
    );
    assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&url, "scope").as_deref(), Some(OAUTH_SCOPES));
    assert_eq!(
        query_param(&url, "redirect_uri").as_deref(),
        Some(state.config.startgg_redirect_uri.as_str())
    );

    let oauth_state = query_param(&url, "state").unwrap();
    assert_eq!(
        verify_and_decode_state(&oauth_state, &state.config.oauth_state_key),
        Some(state.config.frontend_url.clone())
    );
}

#[tokio::test]
async fn test_login_ignores_foreign_redirect_uri() {
    let (app, state) = common::create_test_app();

    let response = get(app, "/auth/login?redirect_uri=https%3A%2F%2Fevil.example").await;

    let oauth_state = query_param(&location(&response), "state").unwrap();
    assert_eq!(
        verify_and_decode_state(&oauth_state, &state.config.oauth_state_key),
        Some(state.config.frontend_url.clone())
    );
}

#[tokio::test]
async fn test_login_keeps_localhost_redirect_uri() {
    let (app, state) = common::create_test_app();

    let response = get(app, "/auth/login?redirect_uri=http%3A%2F%2F127.0.0.1%3A4173").await;

    let oauth_state = query_param(&location(&response), "state").unwrap();
    assert_eq!(
        verify_and_decode_state(&oauth_state, &state.config.oauth_state_key),
        Some("http://127.0.0.1:4173".to_string())
    );
}

#[tokio::test]
async fn test_callback_invalid_state() {
    let (app, state) = common::create_test_app();
    let forged = valid_state("https://evil.example", b"not_the_state_key");

    let response = get(app, &format!("/auth/callback?code=abc&state={}", forged)).await;

    assert_eq!(
        location(&response),
        format!("{}/oauth/callback?error=invalid_state", state.config.frontend_url)
    );
}

#[tokio::test]
async fn test_callback_missing_state() {
    let (app, state) = common::create_test_app();

    let response = get(app, "/auth/callback?code=abc").await;

    assert_eq!(
        location(&response),
        format!("{}/oauth/callback?error=invalid_state", state.config.frontend_url)
    );
}

#[tokio::test]
async fn test_callback_missing_code() {
    let (app, state) = common::create_test_app();
    let oauth_state = valid_state("http://localhost:5173", &state.config.oauth_state_key);

    let response = get(app, &format!("/auth/callback?state={}", oauth_state)).await;

    assert_eq!(
        location(&response),
        "http://localhost:5173/oauth/callback?error=missing_code"
    );
}

#[tokio::test]
async fn test_callback_passes_provider_error() {
    let (app, state) = common::create_test_app();
    let oauth_state = valid_state("http://localhost:5173", &state.config.oauth_state_key);

    let response = get(
        app,
        &format!("/auth/callback?state={}&error=access_denied", oauth_state),
    )
    .await;

    assert_eq!(
        location(&response),
        "http://localhost:5173/oauth/callback?error=access_denied"
    );
}

#[tokio::test]
async fn test_callback_refused_code_cannot_be_replayed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base_url = refusing_startgg(calls.clone()).await;
    let (app, state) = common::create_test_app_with(common::config_for_mock(&base_url));
    let oauth_state = valid_state("http://localhost:5173", &state.config.oauth_state_key);
    let uri = format!("/auth/callback?code=one-time-code&state={}", oauth_state);

    let first = get(app.clone(), &uri).await;
    assert_eq!(
        location(&first),
        "http://localhost:5173/oauth/callback?error=token_exchange_failed"
    );

    let second = get(app, &uri).await;
    assert_eq!(
        location(&second),
        "http://localhost:5173/oauth/callback?error=code_already_used"
    );

    // The replay never reached start.gg
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callback_storage_failure_releases_code() {
    let router = Router::new()
        .route(
            "/oauth/access_token",
            post(|| async {
                Json(serde_json::json!({
                    "access_token": "access-123",
                    "refresh_token": "refresh-456",
                    "expires_in": 3600,
                    "scope": OAUTH_SCOPES
                }))
            }),
        )
        .route(
            "/gql/alpha",
            post(|| async {
                Json(serde_json::json!({
                    "data": {
                        "currentUser": {
                            "id": 4242,
                            "email": "player@example.com",
                            "player": { "gamerTag": "Player" }
                        }
                    }
                }))
            }),
        );
    let base_url = common::spawn_server(router).await;
    let (app, state) = common::create_test_app_with(common::config_for_mock(&base_url));
    let oauth_state = valid_state("http://localhost:5173", &state.config.oauth_state_key);
    let uri = format!("/auth/callback?code=good-code&state={}", oauth_state);

    // Firestore is offline, so storing the user fails after a good exchange
    let response = get(app.clone(), &uri).await;
    assert_eq!(
        location(&response),
        "http://localhost:5173/oauth/callback?error=server_error"
    );
    assert!(state.used_oauth_codes.is_empty());

    let retry = get(app, &uri).await;
    assert_eq!(
        location(&retry),
        "http://localhost:5173/oauth/callback?error=server_error"
    );
}
