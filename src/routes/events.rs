// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event routes: event header, admin check and set listing.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::set_state::DEFAULT_BEST_OF;
use crate::models::{Report, Role, SetState};
use crate::services::admin::resolve_event_admin;
use crate::services::cache::{keys, EVENT_TTL, SETS_TTL};
use crate::services::startgg::types::{EventDetail, SetStatus, SetSummary};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/events/{event_id}", get(get_event))
        .route("/api/events/{event_id}/admin-check", get(admin_check))
        .route("/api/events/{event_id}/sets", get(get_event_sets))
}

/// Event detail for the user, served from the response cache when fresh.
pub(crate) async fn cached_event(
    state: &AppState,
    user_id: u64,
    event_id: &str,
) -> Result<EventDetail> {
    let value = state
        .cache
        .get_or_try_insert(&keys::event(event_id, user_id), EVENT_TTL, || async {
            let event = state.startgg.event(user_id, event_id).await?;
            serde_json::to_value(event).map_err(|e| AppError::Internal(e.into()))
        })
        .await?;
    serde_json::from_value(value).map_err(|e| AppError::Internal(e.into()))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<EventDetail>> {
    let event = cached_event(&state, auth.user_id, &event_id)
        .await
        .inspect_err(|e| tracing::error!(event_id = %event_id, error = %e, "Error fetching event"))?;
    Ok(Json(event))
}

// ─── Admin Check ─────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminCheckQuery {
    tournament_slug: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheckResponse {
    pub is_admin: bool,
    pub slug: String,
    pub promoted: bool,
}

fn admin_check_failure(status: StatusCode, reason: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "isAdmin": false, "reason": reason })),
    )
        .into_response()
}

/// Decide whether the user administers the event's tournament, promoting
/// the local role when they do.
async fn admin_check(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Query(query): Query<AdminCheckQuery>,
) -> Result<Response> {
    let slug = match query.tournament_slug.filter(|s| !s.is_empty()) {
        Some(slug) => Some(slug),
        None => match cached_event(&state, auth.user_id, &event_id).await {
            Ok(event) => event.tournament_slug.or(event.tournament_name),
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Failed to resolve tournament slug");
                return Ok(admin_check_failure(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "slug_unavailable",
                ));
            }
        },
    };

    let Some(slug) = slug else {
        return Ok(admin_check_failure(StatusCode::BAD_REQUEST, "slug_missing"));
    };

    let resolution = resolve_event_admin(&state.startgg, auth.user_id, &event_id, &slug).await;

    let mut promoted = false;
    if resolution.is_admin {
        if let Some(mut user) = state.db.get_user(auth.user_id).await? {
            if user.role != Role::Admin {
                user.role = Role::Admin;
                user.last_active = format_utc_rfc3339(chrono::Utc::now());
                state.db.upsert_user(&user).await?;
                promoted = true;
                tracing::info!(user_id = auth.user_id, event_id = %event_id, slug = %slug, "User promoted to admin role");
            }
        }
    }

    tracing::info!(
        event_id = %event_id,
        slug = %slug,
        user_id = auth.user_id,
        is_admin = resolution.is_admin,
        owners = ?resolution.signals.owner_ids,
        admins_count = resolution.signals.admin_ids.len(),
        in_user_tournaments = resolution.signals.in_user_tournaments,
        promoted,
        "Admin check result"
    );

    Ok(Json(AdminCheckResponse {
        is_admin: resolution.is_admin,
        slug,
        promoted,
    })
    .into_response())
}

// ─── Sets ────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct SetsQuery {
    mine: Option<String>,
    status: Option<String>,
}

fn truthy(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "on" | "yes"))
}

/// Overlay local reports and states on the start.gg set list, then apply
/// the `mine` and `status` filters.
pub fn enrich_sets(
    sets: Vec<SetSummary>,
    reports: &HashMap<String, Report>,
    states: &HashMap<String, SetState>,
    mine_for: Option<u64>,
    status: Option<SetStatus>,
) -> Vec<SetSummary> {
    sets.into_iter()
        .map(|mut set| {
            if let Some(state) = states.get(&set.id) {
                set.best_of = state.best_of;
            }
            if let Some(report) = reports.get(&set.id) {
                set.status = SetStatus::from_report(report.status);
                set.report_status = Some(report.status);
            }
            set
        })
        .filter(|set| mine_for.is_none_or(|user_id| set.involves_user(user_id)))
        .filter(|set| status.is_none_or(|s| set.status == s))
        .collect()
}

async fn load_event_sets(
    state: &AppState,
    user_id: u64,
    event_id: &str,
    mine: bool,
    status: Option<SetStatus>,
) -> Result<Vec<SetSummary>> {
    let sets = state
        .startgg
        .event_sets(user_id, event_id, DEFAULT_BEST_OF)
        .await?;

    let set_ids: Vec<String> = sets.iter().map(|s| s.id.clone()).collect();
    let reports = state.db.latest_reports_for_sets(&set_ids).await?;
    let states = state.db.set_states_for(&set_ids).await?;

    Ok(enrich_sets(
        sets,
        &reports,
        &states,
        mine.then_some(user_id),
        status,
    ))
}

async fn get_event_sets(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Query(query): Query<SetsQuery>,
) -> Result<Json<serde_json::Value>> {
    let mine = truthy(query.mine.as_deref());
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            SetStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown set status '{}'", raw)))?,
        ),
        None => None,
    };
    let key = keys::event_sets(
        &event_id,
        mine.then_some(auth.user_id),
        status.map(SetStatus::as_str),
    );

    let sets = state
        .cache
        .get_or_try_insert(&key, SETS_TTL, || async {
            let sets = load_event_sets(&state, auth.user_id, &event_id, mine, status).await?;
            serde_json::to_value(sets).map_err(|e| AppError::Internal(e.into()))
        })
        .await
        .inspect_err(|e| tracing::error!(event_id = %event_id, error = %e, "Error fetching event sets"))?;

    Ok(Json(sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::tests::sample_report;
    use crate::models::ReportStatus;
    use crate::services::startgg::types::SetSide;

    fn side(user_id: &str, name: &str) -> SetSide {
        SetSide {
            user_id: Some(user_id.to_string()),
            participant_id: None,
            entrant_id: None,
            name: name.to_string(),
        }
    }

    fn set(id: &str, p1_user: &str, p2_user: &str) -> SetSummary {
        SetSummary {
            id: id.to_string(),
            event_id: "e1".to_string(),
            round: "Winners Round 1".to_string(),
            best_of: 3,
            p1: side(p1_user, "Alice"),
            p2: side(p2_user, "Bob"),
            status: SetStatus::NotStarted,
            report_status: None,
        }
    }

    #[test]
    fn test_enrich_applies_reports_and_states() {
        let mut report = sample_report();
        report.set_id = "s1".to_string();
        report.status = ReportStatus::Pending;
        let reports = HashMap::from([("s1".to_string(), report)]);

        let stored = SetState::new("s2", 5, "2026-01-01T00:00:00Z");
        let states = HashMap::from([("s2".to_string(), stored)]);

        let sets = enrich_sets(
            vec![set("s1", "1", "2"), set("s2", "3", "4")],
            &reports,
            &states,
            None,
            None,
        );

        assert_eq!(sets[0].status, SetStatus::Reported);
        assert_eq!(sets[0].report_status, Some(ReportStatus::Pending));
        assert_eq!(sets[1].best_of, 5);
        assert_eq!(sets[1].status, SetStatus::NotStarted);
    }

    #[test]
    fn test_enrich_filters_mine_and_status() {
        let mut report = sample_report();
        report.set_id = "s1".to_string();
        report.status = ReportStatus::Approved;
        let reports = HashMap::from([("s1".to_string(), report)]);
        let states = HashMap::new();

        let sets = vec![set("s1", "1", "2"), set("s2", "1", "4"), set("s3", "5", "6")];

        let mine = enrich_sets(sets.clone(), &reports, &states, Some(1), None);
        assert_eq!(
            mine.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["s1", "s2"]
        );

        let approved = enrich_sets(sets, &reports, &states, None, Some(SetStatus::Approved));
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, "s1");
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Some("1")));
        assert!(truthy(Some("true")));
        assert!(!truthy(Some("0")));
        assert!(!truthy(None));
    }
}
