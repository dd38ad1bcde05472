// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! start.gg OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::routes::is_allowed_origin;
use crate::AppState;

/// Scopes requested from start.gg; `tournament.reporter` is needed to report sets.
pub const OAUTH_SCOPES: &str = "user.identity user.email tournament.reporter";

/// How long a redeemed authorization code stays blocked.
const USED_CODE_TTL: Duration = Duration::from_secs(5 * 60);

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// Only the configured frontend or a localhost origin is accepted.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Sign `frontend_url|timestamp_hex` and encode it as an OAuth state value.
pub fn sign_state(frontend_url: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
pub fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // The frontend URL never contains '|', so split from the right.
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let payload = format!("{}|{}", frontend_url, timestamp_hex);
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Start OAuth flow - redirect to start.gg authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = match params.redirect_uri {
        Some(uri) if is_allowed_origin(&uri, &state.config.frontend_url) => uri,
        Some(uri) => {
            tracing::warn!(redirect_uri = %uri, "Ignoring unrecognized redirect_uri");
            state.config.frontend_url.clone()
        }
        None => state.config.frontend_url.clone(),
    };

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let oauth_state = sign_state(&frontend_url, timestamp, &state.config.oauth_state_key)?;

    let auth_url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
        state.config.startgg_authorize_url.trim_end_matches('?'),
        urlencoding::encode(&state.config.startgg_client_id),
        urlencoding::encode(&state.config.startgg_redirect_uri),
        urlencoding::encode(OAUTH_SCOPES),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.startgg_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to start.gg"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn callback_redirect(frontend_url: &str, query: &str) -> Redirect {
    Redirect::temporary(&format!(
        "{}/oauth/callback?{}",
        frontend_url.trim_end_matches('/'),
        query
    ))
}

fn code_key(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Record `code` as redeemed. Returns false if it was already redeemed
/// within the last few minutes.
fn claim_code(state: &AppState, key: &str) -> bool {
    let now = Instant::now();
    state
        .used_oauth_codes
        .retain(|_, seen| now.duration_since(*seen) < USED_CODE_TTL);

    match state.used_oauth_codes.entry(key.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(_) => false,
        dashmap::mapref::entry::Entry::Vacant(slot) => {
            slot.insert(now);
            true
        }
    }
}

/// OAuth callback - exchange code for tokens, create session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(frontend_url) = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
    else {
        tracing::warn!("Invalid or missing OAuth state parameter");
        return callback_redirect(&state.config.frontend_url, "error=invalid_state").into_response();
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from start.gg");
        let query = format!("error={}", urlencoding::encode(&error));
        return callback_redirect(&frontend_url, &query).into_response();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!("OAuth callback without code");
        return callback_redirect(&frontend_url, "error=missing_code").into_response();
    };

    let key = code_key(&code);
    if !claim_code(&state, &key) {
        tracing::warn!(code_hash = &key[..8], "OAuth code used twice");
        return callback_redirect(&frontend_url, "error=code_already_used").into_response();
    }

    tracing::info!("Exchanging authorization code for tokens");

    let oauth_result = match state.startgg.handle_oauth_callback(&code).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "OAuth callback failed");
            // A code start.gg refused stays blocked; anything else may be retried.
            if !e.code_rejected() {
                state.used_oauth_codes.remove(&key);
            }
            let query = format!("error={}", e.redirect_code());
            return callback_redirect(&frontend_url, &query).into_response();
        }
    };

    let jwt = match create_jwt(oauth_result.user_id, &state.config.jwt_signing_key) {
        Ok(jwt) => jwt,
        Err(e) => {
            tracing::error!(error = %e, "JWT creation failed");
            return callback_redirect(&frontend_url, "error=server_error").into_response();
        }
    };

    tracing::info!(
        user_id = oauth_result.user_id,
        name = %oauth_result.name,
        "OAuth successful, session created"
    );

    let jar = jar.add(session_cookie(jwt.clone(), &state.config.api_url));
    let query = format!("token={}", jwt);
    (jar, callback_redirect(&frontend_url, &query)).into_response()
}

fn is_local(api_url: &str) -> bool {
    api_url.contains("localhost") || api_url.contains("127.0.0.1")
}

/// Session cookie; cross-site in production since the frontend is hosted elsewhere.
fn session_cookie(value: String, api_url: &str) -> Cookie<'static> {
    let local = is_local(api_url);
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(!local)
        .same_site(if local { SameSite::Lax } else { SameSite::None })
        .build()
}

/// Logout - clear the session cookie and go home.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let removal = session_cookie(String::new(), &state.config.api_url);
    (jar.remove(removal), Redirect::temporary("/"))
}
