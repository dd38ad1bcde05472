// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Set routes: detail, start, RPS and stage bans, drafts and report submission.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::set_state::{PhaseName, TransitionError, BEST_OF_OPTIONS, DEFAULT_BEST_OF};
use crate::models::{
    BanSummary, DraftView, Report, ReportParticipant, ReportStatus, ReportWithGames, RpsChoice,
    SetDraft, SetPhase, SetState, Side, Stage,
};
use crate::routes::ValidatedJson;
use crate::services::cache::keys;
use crate::services::reports::{to_games, validate_games, GamesPayload};
use crate::services::startgg::types::{SetDetail, SetStatus};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
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
        .route("/api/sets/{set_id}", get(get_set))
        .route("/api/sets/{set_id}/start", post(start_set))
        .route("/api/sets/{set_id}/submit", post(submit_report))
        .route("/api/sets/{set_id}/state", get(get_state))
        .route("/api/sets/{set_id}/rps", post(record_rps))
        .route("/api/sets/{set_id}/bans", post(record_ban))
        .route("/api/sets/{set_id}/draft", get(get_draft).post(save_draft))
}

fn now() -> String {
    format_utc_rfc3339(chrono::Utc::now())
}

/// Turn a missing-scope error from start.gg into a "log in again" hint.
pub(crate) fn reauth_on_scope_error(error: AppError, config: &Config) -> AppError {
    match error {
        AppError::StartggApi(message) if AppError::is_scope_message(&message) => {
            AppError::InsufficientScope {
                message,
                reauth_url: config.reauth_url(),
            }
        }
        other => other,
    }
}

/// Map a rejected ban/RPS move: playing out of turn is a 403, anything else a 422.
fn transition_error(error: TransitionError, set_id: &str, user_id: u64) -> AppError {
    if error.is_turn_violation() {
        tracing::warn!(set_id, user_id, error = %error, "Move out of turn");
        AppError::Forbidden(error.to_string())
    } else {
        AppError::Validation(vec![error.to_string()])
    }
}

/// Side played by the user in the set, or 403.
fn require_side(detail: &SetDetail, user_id: u64) -> Result<Side> {
    detail.side_of(user_id).ok_or_else(|| {
        tracing::warn!(set_id = %detail.id, user_id, "User not a participant of this set");
        AppError::Forbidden("User not a participant of this set".to_string())
    })
}

async fn stored_best_of(state: &AppState, set_id: &str) -> Result<u8> {
    Ok(state
        .db
        .get_set_state(set_id)
        .await?
        .map(|s| s.best_of)
        .unwrap_or(DEFAULT_BEST_OF))
}

/// Set state together with its ban progress.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SetStateResponse {
    #[serde(flatten)]
    pub state: SetState,
    pub summary: BanSummary,
}

impl SetStateResponse {
    fn new(state: SetState) -> Result<Self> {
        let machine = state
            .machine()
            .map_err(|e| AppError::Internal(e.into()))?;
        Ok(Self {
            summary: BanSummary::from_machine(state.phase, &machine),
            state,
        })
    }
}

// ─── Set Detail ──────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SetDetailResponse {
    #[serde(flatten)]
    pub set: SetDetail,
    pub ban_state: BanSummary,
    pub existing_report: Option<ReportWithGames>,
}

async fn get_set(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
) -> Result<Json<SetDetailResponse>> {
    let stored = state.db.get_set_state(&set_id).await?;
    let best_of = stored.as_ref().map_or(DEFAULT_BEST_OF, |s| s.best_of);

    let set = state
        .startgg
        .set_detail(auth.user_id, &set_id, best_of)
        .await
        .inspect_err(|e| tracing::error!(set_id = %set_id, error = %e, "Error fetching set detail"))?;

    let ban_state = match &stored {
        Some(s) => {
            let machine = s.machine().map_err(|e| AppError::Internal(e.into()))?;
            BanSummary::from_machine(s.phase, &machine)
        }
        None => BanSummary::from_machine(PhaseName::Rps, &SetPhase::new()),
    };

    // A set start.gg considers unstarted was reset; older reports no longer apply.
    let existing_report = if set.status == SetStatus::NotStarted {
        None
    } else {
        match state.db.latest_report_for_set(&set_id).await? {
            Some(report) => state.db.get_report_with_games(&report.id).await?,
            None => None,
        }
    };

    Ok(Json(SetDetailResponse {
        set,
        ban_state,
        existing_report,
    }))
}

// ─── Start ───────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StartPayload {
    #[serde(default)]
    best_of: Option<u8>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StartResponse {
    pub message: String,
    pub state: SetState,
}

/// Mark the set in progress on start.gg and open its RPS phase.
///
/// If start.gg reports the set as not started, everything stored locally for
/// it is discarded first (the set was reset after a rejected report).
async fn start_set(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
    body: Bytes,
) -> Result<Json<StartResponse>> {
    let payload: StartPayload = if body.iter().all(u8::is_ascii_whitespace) {
        StartPayload::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::Validation(vec![e.to_string()]))?
    };
    let best_of = payload.best_of.unwrap_or(DEFAULT_BEST_OF);
    if !BEST_OF_OPTIONS.contains(&best_of) {
        return Err(AppError::Validation(vec![
            "bestOf: must be 3 or 5".to_string(),
        ]));
    }

    let set = state
        .startgg
        .set_detail(auth.user_id, &set_id, best_of)
        .await?;

    let lock = state.set_lock(&set_id);
    let _guard = lock.lock().await;

    if set.status == SetStatus::NotStarted {
        let removed = state.db.reset_set(&set_id).await?;
        if removed > 0 {
            tracing::info!(set_id = %set_id, removed, "Cleared local data of unstarted set");
        }
    }

    state
        .startgg
        .mark_set_in_progress(auth.user_id, &set_id)
        .await
        .map_err(|e| {
            tracing::warn!(set_id = %set_id, user_id = auth.user_id, error = %e, "Failed to start set");
            reauth_on_scope_error(e, &state.config)
        })?;

    let now = now();
    let mut set_state = state
        .db
        .get_or_create_set_state(&set_id, best_of, &now)
        .await?;
    if set_state.best_of != best_of {
        set_state.best_of = best_of;
        set_state.updated_at = now;
        state.db.save_set_state(&set_state).await?;
    }

    if let Some(event_id) = &set.event_id {
        state.cache.invalidate_prefix(&keys::event_sets_prefix(event_id));
        tracing::info!(set_id = %set_id, event_id = %event_id, "Set caches invalidated after start");
    }

    Ok(Json(StartResponse {
        message: "Set marked as in progress".to_string(),
        state: set_state,
    }))
}

// ─── Submit ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmitResponse {
    pub message: String,
    pub report: ReportWithGames,
}

fn participant(detail: &SetDetail, side: Side) -> Result<ReportParticipant> {
    let slot = detail.side(side);
    let entrant_id = slot.entrant_id.clone().ok_or_else(|| {
        AppError::BadRequest(format!("Set has no {} entrant yet", side.as_str()))
    })?;
    Ok(ReportParticipant {
        entrant_id,
        name: slot.name.clone(),
    })
}

/// Submit a competitor's game-by-game result for review.
async fn submit_report(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<GamesPayload>,
) -> Result<(StatusCode, Json<SubmitResponse>)> {
    if let Some(report_id) = state.db.pending_report_id(&set_id).await? {
        return Err(AppError::Conflict {
            message: "A pending report already exists for this set".to_string(),
            report_id,
        });
    }

    let best_of = stored_best_of(&state, &set_id).await?;
    let set = state
        .startgg
        .set_detail(auth.user_id, &set_id, best_of)
        .await?;

    if !set.is_participant(auth.user_id) {
        tracing::warn!(
            set_id = %set_id,
            user_id = auth.user_id,
            "User attempted to submit report for set they do not participate in"
        );
        return Err(AppError::Forbidden(
            "You can only submit reports for sets you participate in".to_string(),
        ));
    }

    let errors = validate_games(&payload.games, best_of);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let submitted_by = state
        .db
        .get_user(auth.user_id)
        .await?
        .map(|u| u.name)
        .unwrap_or_else(|| format!("user_{}", auth.user_id));

    let event_id = set.event_id.clone().unwrap_or_else(|| {
        tracing::warn!(set_id = %set_id, "start.gg set has no event id");
        String::new()
    });

    let now = now();
    let mut report = Report {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: auth.user_id,
        submitted_by,
        event_id: event_id.clone(),
        event_name: set.event_name.clone(),
        set_id: set_id.clone(),
        round: set.round.clone(),
        best_of,
        p1: participant(&set, Side::P1)?,
        p2: participant(&set, Side::P2)?,
        score_p1: 0,
        score_p2: 0,
        status: ReportStatus::Pending,
        notes: payload.notes.filter(|n| !n.trim().is_empty()),
        rejection_reason: None,
        created_at: now.clone(),
        updated_at: now,
    };
    let games = report.set_games(to_games(&report.id, &payload.games));

    state.db.create_report(&report, &games).await?;

    state.cache.invalidate_prefix(&keys::event_sets_prefix(&event_id));

    tracing::info!(
        set_id = %set_id,
        report_id = %report.id,
        user_id = auth.user_id,
        score_p1 = report.score_p1,
        score_p2 = report.score_p2,
        "Report submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            message: "Report submitted successfully".to_string(),
            report: ReportWithGames { report, games },
        }),
    ))
}

// ─── RPS and Bans ────────────────────────────────────────────

async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(set_id): Path<String>,
) -> Result<Json<SetStateResponse>> {
    let lock = state.set_lock(&set_id);
    let _guard = lock.lock().await;

    let set_state = state
        .db
        .get_or_create_set_state(&set_id, DEFAULT_BEST_OF, &now())
        .await?;
    Ok(Json(SetStateResponse::new(set_state)?))
}

#[derive(Deserialize, Validate)]
struct RpsPayload {
    choice: RpsChoice,
}

/// Apply one move to the stored state machine of a set.
async fn apply_move<F>(state: &AppState, set_id: &str, user_id: u64, play: F) -> Result<SetState>
where
    F: FnOnce(SetPhase) -> std::result::Result<SetPhase, TransitionError>,
{
    let lock = state.set_lock(set_id);
    let _guard = lock.lock().await;

    let now = now();
    let mut set_state = state
        .db
        .get_or_create_set_state(set_id, DEFAULT_BEST_OF, &now)
        .await?;
    let machine = set_state
        .machine()
        .map_err(|e| AppError::Internal(e.into()))?;

    let next = play(machine).map_err(|e| transition_error(e, set_id, user_id))?;
    set_state.apply(next, &now);
    state.db.save_set_state(&set_state).await?;

    Ok(set_state)
}

async fn record_rps(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<RpsPayload>,
) -> Result<Json<SetStateResponse>> {
    let set = state
        .startgg
        .set_detail(auth.user_id, &set_id, DEFAULT_BEST_OF)
        .await?;
    let side = require_side(&set, auth.user_id)?;

    let set_state = apply_move(&state, &set_id, auth.user_id, |machine| {
        machine.throw(side, payload.choice)
    })
    .await?;

    tracing::info!(set_id = %set_id, side = side.as_str(), phase = ?set_state.phase, "RPS choice recorded");
    Ok(Json(SetStateResponse::new(set_state)?))
}

#[derive(Deserialize, Validate)]
struct BanPayload {
    #[validate(length(min = 1))]
    stage: String,
}

/// Ban a stage, or pick the final stage once all seven bans are in.
async fn record_ban(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<BanPayload>,
) -> Result<Json<SetStateResponse>> {
    let stage: Stage = payload
        .stage
        .parse()
        .map_err(|e: crate::models::stage::UnknownStage| AppError::Validation(vec![e.to_string()]))?;

    let set = state
        .startgg
        .set_detail(auth.user_id, &set_id, DEFAULT_BEST_OF)
        .await?;
    let side = require_side(&set, auth.user_id)?;

    let set_state = apply_move(&state, &set_id, auth.user_id, |machine| {
        machine.select_stage(side, stage)
    })
    .await?;

    tracing::info!(
        set_id = %set_id,
        side = side.as_str(),
        stage = stage.name(),
        bans = set_state.bans.len(),
        "Stage selection recorded"
    );
    Ok(Json(SetStateResponse::new(set_state)?))
}

// ─── Drafts ──────────────────────────────────────────────────

async fn get_draft(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
) -> Result<Json<Option<DraftView>>> {
    let draft = state
        .db
        .get_draft(&set_id, auth.user_id)
        .await?
        .map(DraftView::try_from)
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(draft))
}

#[derive(Deserialize, Validate)]
struct DraftPayload {
    data: serde_json::Value,
}

async fn save_draft(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(set_id): Path<String>,
    ValidatedJson(payload): ValidatedJson<DraftPayload>,
) -> Result<Json<DraftView>> {
    if !(payload.data.is_object() || payload.data.is_array()) {
        return Err(AppError::Validation(vec![
            "data: must be an object or array".to_string(),
        ]));
    }

    let draft = SetDraft {
        set_id: set_id.clone(),
        user_id: auth.user_id,
        data: payload.data.to_string(),
        updated_at: now(),
    };
    state.db.save_draft(&draft).await?;

    Ok(Json(DraftView {
        set_id,
        data: payload.data,
        updated_at: draft.updated_at,
    }))
}
