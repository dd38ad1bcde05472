// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin report review: list, inspect, edit, approve and reject.
//!
//! Every handler runs behind `require_auth` and `require_admin`, and then
//! checks that the caller administers the event the report belongs to.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{LifecycleError, Report, ReportStatus, ReportWithGames};
use crate::routes::events::cached_event;
use crate::routes::sets::reauth_on_scope_error;
use crate::routes::ValidatedJson;
use crate::services::admin::resolve_event_admin;
use crate::services::cache::keys;
use crate::services::reports::{build_game_data, to_games, validate_games, GamesPayload};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/reports", get(list_reports))
        .route(
            "/api/admin/reports/{report_id}",
            get(get_report).put(edit_report),
        )
        .route("/api/admin/reports/{report_id}/approve", post(approve_report))
        .route("/api/admin/reports/{report_id}/reject", post(reject_report))
}

const NOT_EVENT_ADMIN: &str = "Not an admin of this event";

fn lifecycle_error(error: LifecycleError) -> AppError {
    AppError::Validation(vec![error.to_string()])
}

/// 403 unless the user administers `event_id`.
async fn ensure_event_admin(state: &AppState, user_id: u64, event_id: &str) -> Result<()> {
    let slug = match cached_event(state, user_id, event_id).await {
        Ok(event) => event.tournament_slug.or(event.tournament_name),
        Err(e) => {
            tracing::warn!(event_id, user_id, error = %e, "Event lookup failed during admin check");
            None
        }
    };

    let Some(slug) = slug else {
        return Err(AppError::Forbidden(NOT_EVENT_ADMIN.to_string()));
    };

    if resolve_event_admin(&state.startgg, user_id, event_id, &slug)
        .await
        .is_admin
    {
        Ok(())
    } else {
        tracing::warn!(event_id, user_id, slug = %slug, "Admin action refused for event");
        Err(AppError::Forbidden(NOT_EVENT_ADMIN.to_string()))
    }
}

async fn load_report(state: &AppState, report_id: &str) -> Result<ReportWithGames> {
    state
        .db
        .get_report_with_games(report_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))
}

fn invalidate_event(state: &AppState, report: &Report) {
    state
        .cache
        .invalidate_prefix(&keys::event_sets_prefix(&report.event_id));
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    event_id: Option<String>,
    status: Option<String>,
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Report>>> {
    let event_id = query
        .event_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("eventId is required".to_string()))?;

    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            ReportStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status '{}'", s)))?,
        ),
        None => None,
    };

    ensure_event_admin(&state, auth.user_id, &event_id).await?;

    let reports = state.db.list_reports(&event_id, status).await?;
    Ok(Json(reports))
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<ReportWithGames>> {
    let report = load_report(&state, &report_id).await?;
    ensure_event_admin(&state, auth.user_id, &report.report.event_id).await?;
    Ok(Json(report))
}

// ─── Review ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReviewResponse {
    pub message: String,
    pub report: ReportWithGames,
}

/// Replace the games of a pending or rejected report and send it back to review.
async fn edit_report(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(report_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<GamesPayload>,
) -> Result<Json<ReviewResponse>> {
    let ReportWithGames { mut report, .. } = load_report(&state, &report_id).await?;
    ensure_event_admin(&state, auth.user_id, &report.event_id).await?;

    let errors = validate_games(&payload.games, report.best_of);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    report
        .reopen(&format_utc_rfc3339(chrono::Utc::now()))
        .map_err(lifecycle_error)?;
    let games = report.set_games(to_games(&report.id, &payload.games));
    if let Some(notes) = payload.notes {
        report.notes = Some(notes);
    }

    state.db.update_report_games(&report, &games).await?;
    invalidate_event(&state, &report);

    tracing::info!(
        report_id = %report.id,
        admin_id = auth.user_id,
        score_p1 = report.score_p1,
        score_p2 = report.score_p2,
        "Report edited by admin"
    );

    Ok(Json(ReviewResponse {
        message: "Report updated".to_string(),
        report: ReportWithGames { report, games },
    }))
}

/// Report the set to start.gg, then mark the report approved.
///
/// Nothing is stored if start.gg refuses the result.
async fn approve_report(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<ReviewResponse>> {
    let ReportWithGames { mut report, games } = load_report(&state, &report_id).await?;
    ensure_event_admin(&state, auth.user_id, &report.event_id).await?;

    if report.status != ReportStatus::Pending {
        return Err(lifecycle_error(LifecycleError::NotPending));
    }

    let game_data = build_game_data(&report, &games);
    state
        .startgg
        .report_set(
            auth.user_id,
            &report.set_id,
            report.winner_entrant_id(),
            &game_data,
        )
        .await
        .map_err(|e| {
            tracing::error!(report_id = %report.id, set_id = %report.set_id, error = %e, "Error approving report");
            reauth_on_scope_error(e, &state.config)
        })?;

    report
        .approve(&format_utc_rfc3339(chrono::Utc::now()))
        .map_err(lifecycle_error)?;
    state.db.finish_review(&report).await?;
    invalidate_event(&state, &report);

    tracing::info!(
        report_id = %report.id,
        set_id = %report.set_id,
        admin_id = auth.user_id,
        winner = %report.winner_entrant_id(),
        games = game_data.len(),
        "Report approved and submitted to start.gg"
    );

    Ok(Json(ReviewResponse {
        message: "Report approved and submitted to start.gg".to_string(),
        report: ReportWithGames { report, games },
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectPayload {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

async fn reject_report(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(report_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<RejectPayload>,
) -> Result<Json<ReviewResponse>> {
    let ReportWithGames { mut report, games } = load_report(&state, &report_id).await?;
    ensure_event_admin(&state, auth.user_id, &report.event_id).await?;

    report
        .reject(&payload.reason, &format_utc_rfc3339(chrono::Utc::now()))
        .map_err(lifecycle_error)?;
    state.db.finish_review(&report).await?;
    invalidate_event(&state, &report);

    tracing::info!(report_id = %report.id, admin_id = auth.user_id, "Report rejected");

    Ok(Json(ReviewResponse {
        message: "Report rejected".to_string(),
        report: ReportWithGames { report, games },
    }))
}
