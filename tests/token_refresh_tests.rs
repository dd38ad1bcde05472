// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Retry after a rejected start.gg access token.
//!
//! start.gg answering 401 triggers exactly one token refresh and one retry.
//! The client-level tests run offline; the service-level ones store tokens
//! in Firestore and need the emulator.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use startgg_manager::error::AppError;
use startgg_manager::models::UserTokens;
use startgg_manager::services::kms::{decrypt_token, encrypt_tokens};
use startgg_manager::services::startgg::{CachedToken, StartggClient};
use startgg_manager::services::{KmsService, StartggService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;

const STALE_TOKEN: &str = "stale-token";
const FRESH_TOKEN: &str = "fresh-token";

const ALL_TOURNAMENTS: &str = "query AllTournaments { currentUser { id } }";

#[derive(Clone, Default)]
struct Calls {
    graphql: Arc<AtomicUsize>,
    token: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct MockState {
    calls: Calls,
    /// Bearer token the GraphQL endpoint accepts; `None` rejects everything.
    accepted: Option<&'static str>,
}

async fn graphql(State(mock): State<MockState>, headers: HeaderMap) -> Response {
    mock.calls.graphql.fetch_add(1, Ordering::SeqCst);

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    if mock.accepted.is_none() || bearer != mock.accepted {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid authentication token" })),
        )
            .into_response();
    }

    Json(json!({
        "data": { "currentUser": { "id": 4242, "tournaments": { "nodes": [] } } }
    }))
    .into_response()
}

async fn token_endpoint(State(mock): State<MockState>) -> Json<Value> {
    mock.calls.token.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": FRESH_TOKEN,
        "refresh_token": "refresh-2",
        "expires_in": 3600,
        "scope": "user.identity tournament.reporter"
    }))
}

async fn mock_startgg(accepted: Option<&'static str>) -> (String, Calls) {
    let calls = Calls::default();
    let router = Router::new()
        .route("/gql/alpha", post(graphql))
        .route("/oauth/access_token", post(token_endpoint))
        .with_state(MockState {
            calls: calls.clone(),
            accepted,
        });
    (common::spawn_server(router).await, calls)
}

/// Refresh callback handing out `token` and counting its uses.
fn refresh_to(
    token: &'static str,
    uses: &Arc<AtomicUsize>,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, AppError>> + Send>>
{
    let uses = uses.clone();
    move || {
        Box::pin(async move {
            uses.fetch_add(1, Ordering::SeqCst);
            Ok(token.to_string())
        })
    }
}

#[tokio::test]
async fn test_rejected_token_is_refreshed_and_retried_once() {
    let (base_url, calls) = mock_startgg(Some(FRESH_TOKEN)).await;
    let client = StartggClient::new(&common::config_for_mock(&base_url));
    let refreshes = Arc::new(AtomicUsize::new(0));

    let data: Value = client
        .query_with_refresh(
            STALE_TOKEN,
            ALL_TOURNAMENTS,
            json!({}),
            refresh_to(FRESH_TOKEN, &refreshes),
        )
        .await
        .unwrap();

    assert_eq!(data["currentUser"]["id"], 4242);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(calls.graphql.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_rejection_is_returned_without_another_retry() {
    let (base_url, calls) = mock_startgg(None).await;
    let client = StartggClient::new(&common::config_for_mock(&base_url));
    let refreshes = Arc::new(AtomicUsize::new(0));

    let err = client
        .query_with_refresh::<Value, _, _>(
            STALE_TOKEN,
            ALL_TOURNAMENTS,
            json!({}),
            refresh_to(FRESH_TOKEN, &refreshes),
        )
        .await
        .unwrap_err();

    assert!(err.is_startgg_token_error());
    assert!(err.to_string().contains("Invalid authentication token"));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(calls.graphql.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_accepted_token_is_not_refreshed() {
    let (base_url, calls) = mock_startgg(Some(FRESH_TOKEN)).await;
    let client = StartggClient::new(&common::config_for_mock(&base_url));
    let refreshes = Arc::new(AtomicUsize::new(0));

    let _: Value = client
        .query_with_refresh(
            FRESH_TOKEN,
            ALL_TOURNAMENTS,
            json!({}),
            refresh_to(FRESH_TOKEN, &refreshes),
        )
        .await
        .unwrap();

    assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    assert_eq!(calls.graphql.load(Ordering::SeqCst), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SERVICE TESTS (Firestore emulator)
// ═══════════════════════════════════════════════════════════════════════════

fn unique_user_id() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

/// Service whose user holds a stale (but unexpired) token and a refresh token.
async fn service_with_stale_token(base_url: &str) -> (StartggService, KmsService, u64) {
    let config = common::config_for_mock(base_url);
    let db = common::test_db().await;
    let kms = KmsService::new_mock();
    let user_id = unique_user_id();
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(1);

    let (access, refresh) = encrypt_tokens(&kms, STALE_TOKEN, Some("refresh-1"), user_id)
        .await
        .unwrap();
    db.set_tokens(
        user_id,
        &UserTokens {
            access_token_encrypted: access,
            refresh_token_encrypted: refresh,
            expires_at: Some(expires_at.to_rfc3339()),
            scopes: vec!["user.identity".to_string()],
        },
    )
    .await
    .unwrap();

    let token_cache = Arc::new(dashmap::DashMap::new());
    token_cache.insert(user_id, CachedToken::new(STALE_TOKEN, expires_at));
    let startgg = StartggService::new(
        &config,
        db,
        kms.clone(),
        token_cache,
        Arc::new(dashmap::DashMap::new()),
    );
    (startgg, kms, user_id)
}

#[tokio::test]
async fn test_service_refreshes_stored_token_after_rejection() {
    require_emulator!();

    let (base_url, calls) = mock_startgg(Some(FRESH_TOKEN)).await;
    let (startgg, kms, user_id) = service_with_stale_token(&base_url).await;

    let events = startgg.user_events(user_id).await.unwrap();

    assert!(events.is_empty());
    assert_eq!(calls.token.load(Ordering::SeqCst), 1);
    assert_eq!(calls.graphql.load(Ordering::SeqCst), 2);
    assert_eq!(
        startgg
            .token_cache()
            .get(&user_id)
            .map(|c| c.access_token().to_string())
            .as_deref(),
        Some(FRESH_TOKEN)
    );

    let db = common::test_db().await;
    let stored = db.get_tokens(user_id).await.unwrap().unwrap();
    assert_eq!(
        decrypt_token(&kms, &stored.access_token_encrypted, user_id)
            .await
            .unwrap(),
        FRESH_TOKEN
    );
}

#[tokio::test]
async fn test_service_surfaces_rejection_after_one_refresh() {
    require_emulator!();

    let (base_url, calls) = mock_startgg(None).await;
    let (startgg, _, user_id) = service_with_stale_token(&base_url).await;

    let err = startgg.user_events(user_id).await.unwrap_err();

    assert!(err.is_startgg_token_error());
    assert_eq!(calls.token.load(Ordering::SeqCst), 1);
    assert_eq!(calls.graphql.load(Ordering::SeqCst), 2);
}
