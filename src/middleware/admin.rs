// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local admin role check for `/api/admin`.

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require the authenticated user to hold the local `admin` role.
///
/// Must run after [`require_auth`](super::require_auth).
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = request
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .db
        .get_user(auth.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !user.is_admin() {
        tracing::warn!(user_id = auth.user_id, "Non-admin attempted admin route");
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }

    Ok(next.run(request).await)
}
