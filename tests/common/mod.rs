// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use startgg_manager::config::Config;
use startgg_manager::db::FirestoreDb;
use startgg_manager::middleware::auth::create_jwt;
use startgg_manager::routes::create_router;
use startgg_manager::services::startgg::CachedToken;
use startgg_manager::services::{KmsService, ResponseCache, StartggService};
use startgg_manager::AppState;
use std::sync::Arc;

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
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Shared state backed by the offline database and mock KMS.
#[allow(dead_code)]
pub fn test_state(config: Config) -> Arc<AppState> {
    let db = test_db_offline();
    let kms = KmsService::new_mock();
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    let startgg = StartggService::new(&config, db.clone(), kms, token_cache.clone(), refresh_locks);

    Arc::new(AppState {
        config,
        db,
        startgg,
        cache: ResponseCache::new(),
        used_oauth_codes: Arc::new(dashmap::DashMap::new()),
        set_locks: Arc::new(dashmap::DashMap::new()),
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = test_state(config);
    (create_router(state.clone()), state)
}

/// Session JWT for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: u64, signing_key: &[u8]) -> String {
    create_jwt(user_id, signing_key).expect("Failed to create JWT")
}

/// Serve `router` on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Config pointing the GraphQL and token endpoints at a mock start.gg.
#[allow(dead_code)]
pub fn config_for_mock(base_url: &str) -> Config {
    Config {
        startgg_api_url: format!("{}/gql/alpha", base_url),
        startgg_token_url: format!("{}/oauth/access_token", base_url),
        ..Config::test_default()
    }
}

/// Give `user_id` a valid start.gg access token without touching the database.
#[allow(dead_code)]
pub fn seed_token(state: &AppState, user_id: u64, access_token: &str) {
    state.startgg.token_cache().insert(
        user_id,
        CachedToken::new(access_token, chrono::Utc::now() + chrono::Duration::hours(1)),
    );
}

/// Parse a JSON response body.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
