// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Routes that talk to start.gg, against a local GraphQL stand-in.
//!
//! Users get their access token through the token cache, so none of these
//! need Firestore.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use startgg_manager::AppState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

mod common;

const PLAYER_ONE: u64 = 12345;
const OUTSIDER: u64 = 55555;
const ACCESS_TOKEN: &str = "user-access-token";

/// Operation name of a GraphQL document, e.g. `EventDetail`.
fn operation_name(query: &str) -> &str {
    query
        .split_whitespace()
        .skip_while(|word| *word != "query" && *word != "mutation")
        .nth(1)
        .map(|name| name.split(['(', '{']).next().unwrap_or(name))
        .unwrap_or("")
}

fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 30 * 86400
}

async fn graphql(
    State(calls): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    calls.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {}", ACCESS_TOKEN);
    if headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok()) != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let query = body["query"].as_str().unwrap_or_default();
    let data = match operation_name(query) {
        "AllTournaments" => json!({
            "currentUser": {
                "id": PLAYER_ONE,
                "tournaments": { "nodes": [{
                    "id": 7,
                    "name": "Genesis",
                    "slug": "tournament/genesis",
                    "startAt": far_future(),
                    "endAt": far_future() + 86400,
                    "events": [
                        { "id": 100, "name": "Ultimate Singles", "isOnline": false,
                          "videogame": { "id": 1386 } },
                        { "id": 101, "name": "Online Ultimate", "isOnline": true,
                          "videogame": { "id": 1386 } },
                        { "id": 102, "name": "Melee Singles", "isOnline": false,
                          "videogame": { "id": 1 } }
                    ]
                }]}
            }
        }),
        "EventDetail" => json!({
            "event": {
                "id": 100,
                "name": "Ultimate Singles",
                "slug": "tournament/genesis/event/ultimate-singles",
                "startAt": far_future(),
                "tournament": {
                    "id": 7,
                    "name": "Genesis",
                    "slug": "tournament/genesis",
                    "owner": { "id": 999 }
                },
                "userEntrant": null
            }
        }),
        "CheckUserTournaments" => json!({
            "currentUser": { "tournaments": { "nodes": [] } }
        }),
        "TournamentAdminsViaUser" => json!({
            "tournament": {
                "owner": { "id": 999 },
                "admins": [{ "id": 5, "user": { "id": 777 } }]
            }
        }),
        "SetDetail" => json!({
            "set": {
                "id": 555,
                "fullRoundText": "Winners Round 1",
                "round": 1,
                "state": 2,
                "event": { "id": 100, "name": "Ultimate Singles" },
                "slots": [
                    { "entrant": { "id": 11, "name": "Alpha",
                        "participants": [{ "id": 1, "user": { "id": PLAYER_ONE } }] } },
                    { "entrant": { "id": 22, "name": "Beta",
                        "participants": [{ "id": 2, "user": { "id": 67890 } }] } }
                ]
            }
        }),
        "MarkSetInProgress" => {
            return Json(json!({
                "data": { "markSetInProgress": null },
                "errors": [{ "message": "Your token is missing the tournament.reporter scope" }]
            }))
            .into_response();
        }
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": [{ "message": format!("unexpected operation {other}") }] })),
            )
                .into_response();
        }
    };

    Json(json!({ "data": data })).into_response()
}

async fn mock_app() -> (Router, Arc<AppState>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let startgg = Router::new()
        .route("/gql/alpha", post(graphql))
        .with_state(calls.clone());
    let base_url = common::spawn_server(startgg).await;

    let (app, state) = common::create_test_app_with(common::config_for_mock(&base_url));
    for user_id in [PLAYER_ONE, OUTSIDER] {
        common::seed_token(&state, user_id, ACCESS_TOKEN);
    }
    (app, state, calls)
}

async fn send(
    app: Router,
    state: &AppState,
    method: &str,
    uri: &str,
    user_id: u64,
    body: Option<Value>,
) -> Response {
    let token = common::create_test_jwt(user_id, &state.config.jwt_signing_key);
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

#[test]
fn test_operation_name() {
    assert_eq!(operation_name("\nquery EventDetail($id: ID!) {"), "EventDetail");
    assert_eq!(operation_name("mutation MarkSetInProgress($setId: ID!)"), "MarkSetInProgress");
    assert_eq!(operation_name("query CurrentUser {"), "CurrentUser");
}

#[tokio::test]
async fn test_my_events_keeps_offline_ultimate_events() {
    let (app, state, _) = mock_app().await;

    let response = send(app, &state, "GET", "/api/me/events", PLAYER_ONE, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let events = common::body_json(response).await;
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "100");
    assert_eq!(events[0]["status"], "upcoming");
    assert_eq!(events[0]["tournamentSlug"], "tournament/genesis");
}

#[tokio::test]
async fn test_my_events_served_from_cache() {
    let (app, state, calls) = mock_app().await;

    let first = send(app.clone(), &state, "GET", "/api/me/events", PLAYER_ONE, None).await;
    assert_eq!(first.status(), StatusCode::OK);
    let after_first = calls.load(Ordering::SeqCst);

    let second = send(app, &state, "GET", "/api/me/events", PLAYER_ONE, None).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), after_first);
}

#[tokio::test]
async fn test_event_detail() {
    let (app, state, _) = mock_app().await;

    let response = send(app, &state, "GET", "/api/events/100", PLAYER_ONE, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let event = common::body_json(response).await;
    assert_eq!(event["name"], "Ultimate Singles");
    assert_eq!(event["tournamentSlug"], "tournament/genesis");
    assert_eq!(event["tournamentOwnerId"], "999");
    assert_eq!(event["isAdmin"], false);
}

#[tokio::test]
async fn test_admin_check_for_non_admin() {
    let (app, state, _) = mock_app().await;

    let response = send(
        app,
        &state,
        "GET",
        "/api/events/100/admin-check",
        PLAYER_ONE,
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["isAdmin"], false);
    assert_eq!(body["slug"], "tournament/genesis");
    assert_eq!(body["promoted"], false);
}

#[tokio::test]
async fn test_rps_from_outsider_is_forbidden() {
    let (app, state, _) = mock_app().await;

    let response = send(
        app,
        &state,
        "POST",
        "/api/sets/555/rps",
        OUTSIDER,
        Some(json!({ "choice": "rock" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::body_json(response).await;
    assert_eq!(body["details"], "User not a participant of this set");
}

#[tokio::test]
async fn test_ban_from_outsider_is_forbidden() {
    let (app, state, _) = mock_app().await;

    let response = send(
        app,
        &state,
        "POST",
        "/api/sets/555/bans",
        OUTSIDER,
        Some(json!({ "stage": "Battlefield" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_start_without_reporter_scope_asks_for_login() {
    let (app, state, _) = mock_app().await;

    let response = send(
        app,
        &state,
        "POST",
        "/api/sets/555/start",
        PLAYER_ONE,
        Some(json!({ "bestOf": 5 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "insufficient_scope");
    assert_eq!(body["action"], "reauthenticate");
    assert_eq!(body["reauth_url"], state.config.reauth_url());
}

#[tokio::test]
async fn test_user_without_token_never_reaches_startgg() {
    let (app, state, calls) = mock_app().await;

    // No cached token and Firestore is offline, so start.gg is never called
    let response = send(app, &state, "GET", "/api/events/100", 424242, None).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
