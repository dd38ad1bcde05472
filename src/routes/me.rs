// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Current-user routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserProfile;
use crate::services::cache::{keys, EVENT_TTL};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/events", get(get_my_events))
        .route("/api/auth/refresh", post(refresh_token))
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserProfile>> {
    let user = state
        .db
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;

    Ok(Json(UserProfile::from(&user)))
}

/// Active and upcoming events of the current user.
///
/// start.gg failures are logged and produce an empty list so the dashboard
/// still renders.
async fn get_my_events(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Json<serde_json::Value> {
    let key = keys::user_events(auth.user_id);
    let events = state
        .cache
        .get_or_try_insert(&key, EVENT_TTL, || async {
            let events = state.startgg.user_events(auth.user_id).await?;
            tracing::info!(user_id = auth.user_id, count = events.len(), "Fetched user events");
            serde_json::to_value(events).map_err(|e| AppError::Internal(e.into()))
        })
        .await;

    match events {
        Ok(events) => Json(events),
        Err(e) => {
            tracing::error!(user_id = auth.user_id, error = %e, "Failed to fetch user events");
            Json(serde_json::Value::Array(Vec::new()))
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RefreshResponse {
    pub ok: bool,
    pub expires_at: Option<String>,
}

/// Refresh the user's start.gg token now.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<RefreshResponse>> {
    let outcome = state.startgg.force_refresh(auth.user_id).await.map_err(|e| {
        tracing::warn!(user_id = auth.user_id, error = %e, "Manual token refresh failed");
        AppError::BadRequest("Refresh failed".to_string())
    })?;

    Ok(Json(RefreshResponse {
        ok: true,
        expires_at: outcome.expires_at.map(format_utc_rfc3339),
    }))
}
