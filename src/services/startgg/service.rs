// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! High-level start.gg service with token management.

use super::client::{StartggClient, TokenResponse};
use super::queries;
use super::types::*;
use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{Role, User, UserTokens};
use crate::services::kms::{decrypt_token, encrypt_tokens};
use crate::services::KmsService;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

const REAUTHENTICATE: &str = "No valid access token available. Please re-authenticate.";

/// Cached access token with a known expiry.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<u64, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<u64, Arc<Mutex<()>>>>;

/// Result of handling the OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub user_id: u64,
    pub name: String,
}

/// Failure of the OAuth callback, by the step that failed.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Token exchange failed: {0}")]
    Exchange(AppError),
    #[error("Current user lookup failed: {0}")]
    Profile(AppError),
    #[error(transparent)]
    Storage(#[from] AppError),
}

impl OAuthError {
    /// `error` value sent back to the frontend.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            OAuthError::Exchange(_) => "token_exchange_failed",
            OAuthError::Profile(_) => "graphql_failed",
            OAuthError::Storage(_) => "server_error",
        }
    }

    /// Whether start.gg refused the code itself, so it must not be retried.
    pub fn code_rejected(&self) -> bool {
        match self {
            OAuthError::Exchange(AppError::StartggApi(msg)) => {
                msg.contains("revoked") || msg.contains("invalid")
            }
            _ => false,
        }
    }
}

/// New access token handed out by an explicit refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// High-level start.gg service.
///
/// Owns the token lifecycle for each user:
/// - Decrypting stored tokens on demand and caching the access token
/// - Refreshing ahead of expiry, serialized per user
/// - Retrying a rejected request once after a forced refresh
#[derive(Clone)]
pub struct StartggService {
    client: StartggClient,
    db: FirestoreDb,
    kms: KmsService,
    token_cache: TokenCache,
    refresh_locks: RefreshLocks,
    app_token: Option<String>,
}

fn parse_expiry(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl StartggService {
    pub fn new(
        config: &Config,
        db: FirestoreDb,
        kms: KmsService,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Self {
        Self {
            client: StartggClient::new(config),
            db,
            kms,
            token_cache,
            refresh_locks,
            app_token: config.startgg_app_token.clone(),
        }
    }

    /// Access tokens cached for this instance.
    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }

    fn lock_for(&self, user_id: u64) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn cached(&self, user_id: u64, now: DateTime<Utc>) -> Option<String> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        self.token_cache
            .get(&user_id)
            .filter(|c| now + margin < c.expires_at)
            .map(|c| c.access_token.clone())
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get an access token for the user, refreshing it if it is expiring.
    ///
    /// A token with no recorded expiry is treated as expiring. When the
    /// refresh fails but the old token has not actually expired yet, the old
    /// token is returned.
    pub async fn get_valid_access_token(&self, user_id: u64) -> Result<String, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(token) = self.cached(user_id, now) {
            return Ok(token);
        }

        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting
        if let Some(token) = self.cached(user_id, now) {
            return Ok(token);
        }

        let tokens = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::StartggApi(REAUTHENTICATE.to_string()))?;

        let access_token = decrypt_token(&self.kms, &tokens.access_token_encrypted, user_id).await?;
        let expires_at = parse_expiry(tokens.expires_at.as_deref());

        if let Some(expires_at) = expires_at {
            if now + margin < expires_at {
                self.token_cache.insert(
                    user_id,
                    CachedToken::new(access_token.clone(), expires_at),
                );
                return Ok(access_token);
            }
        }

        let hard_expired = expires_at.is_some_and(|at| at <= now);

        let refreshed = match &tokens.refresh_token_encrypted {
            Some(encrypted) => {
                tracing::info!(user_id, "Access token expiring, refreshing");
                self.refresh_and_store(user_id, &tokens, encrypted).await
            }
            None => Err(AppError::StartggApi("No refresh token stored".to_string())),
        };

        match refreshed {
            Ok(outcome) => Ok(outcome.access_token),
            Err(e) if !hard_expired => {
                tracing::warn!(
                    user_id,
                    error = %e,
                    "Token refresh failed, using current token until it expires"
                );
                Ok(access_token)
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token refresh failed and token expired");
                Err(AppError::StartggApi(REAUTHENTICATE.to_string()))
            }
        }
    }

    /// Refresh the user's token now, regardless of its expiry.
    pub async fn force_refresh(&self, user_id: u64) -> Result<RefreshOutcome, AppError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let tokens = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::StartggApi(REAUTHENTICATE.to_string()))?;

        let encrypted = tokens
            .refresh_token_encrypted
            .clone()
            .ok_or_else(|| AppError::StartggApi("No refresh token stored".to_string()))?;

        self.refresh_and_store(user_id, &tokens, &encrypted).await
    }

    /// Exchange the stored refresh token, then encrypt and persist the result.
    /// Caller must hold the user's refresh lock.
    async fn refresh_and_store(
        &self,
        user_id: u64,
        current: &UserTokens,
        refresh_encrypted: &str,
    ) -> Result<RefreshOutcome, AppError> {
        let refresh_token = decrypt_token(&self.kms, refresh_encrypted, user_id).await?;

        // If another instance already used this refresh token, start.gg
        // rejects it; pick up the tokens that instance stored.
        let response = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(AppError::StartggApi(ref msg)) if msg.contains("invalid_grant") => {
                tracing::info!(user_id, "Refresh token already used, reloading stored tokens");
                return self.reload_if_rotated(user_id, current).await;
            }
            Err(e) => return Err(e),
        };

        let outcome = self.store_tokens(user_id, &response, Some(current)).await?;
        tracing::info!(user_id, "Token refreshed");
        Ok(outcome)
    }

    async fn reload_if_rotated(
        &self,
        user_id: u64,
        previous: &UserTokens,
    ) -> Result<RefreshOutcome, AppError> {
        let tokens = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::StartggApi(REAUTHENTICATE.to_string()))?;

        if tokens.access_token_encrypted == previous.access_token_encrypted {
            return Err(AppError::StartggApi("invalid_grant".to_string()));
        }

        let access_token = decrypt_token(&self.kms, &tokens.access_token_encrypted, user_id).await?;
        let expires_at = parse_expiry(tokens.expires_at.as_deref());
        if let Some(expires_at) = expires_at {
            self.token_cache.insert(
                user_id,
                CachedToken::new(access_token.clone(), expires_at),
            );
        }
        Ok(RefreshOutcome {
            access_token,
            expires_at,
        })
    }

    /// Encrypt and persist a token response. A missing refresh token or
    /// lifetime keeps the previously stored value.
    async fn store_tokens(
        &self,
        user_id: u64,
        response: &TokenResponse,
        previous: Option<&UserTokens>,
    ) -> Result<RefreshOutcome, AppError> {
        let (access_enc, refresh_enc) = encrypt_tokens(
            &self.kms,
            &response.access_token,
            response.refresh_token.as_deref(),
            user_id,
        )
        .await?;

        let expires_at = match response.expires_in {
            Some(secs) => Some(Utc::now() + Duration::seconds(secs)),
            None => previous.and_then(|p| parse_expiry(p.expires_at.as_deref())),
        };

        let scopes = match response.scopes() {
            s if !s.is_empty() => s,
            _ => previous.map(|p| p.scopes.clone()).unwrap_or_default(),
        };

        let tokens = UserTokens {
            access_token_encrypted: access_enc,
            refresh_token_encrypted: refresh_enc
                .or_else(|| previous.and_then(|p| p.refresh_token_encrypted.clone())),
            expires_at: expires_at.map(format_utc_rfc3339),
            scopes,
        };
        self.db.set_tokens(user_id, &tokens).await?;

        match expires_at {
            Some(expires_at) => {
                self.token_cache.insert(
                    user_id,
                    CachedToken::new(response.access_token.clone(), expires_at),
                );
            }
            None => {
                self.token_cache.remove(&user_id);
            }
        }

        Ok(RefreshOutcome {
            access_token: response.access_token.clone(),
            expires_at,
        })
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Exchange the code, identify the user and store profile and tokens.
    ///
    /// An existing user keeps their local role.
    pub async fn handle_oauth_callback(&self, code: &str) -> Result<OAuthResult, OAuthError> {
        let response = self
            .client
            .exchange_code(code)
            .await
            .map_err(OAuthError::Exchange)?;

        let data: CurrentUserData = self
            .client
            .query(&response.access_token, queries::CURRENT_USER, json!({}))
            .await
            .map_err(OAuthError::Profile)?;
        let current = data.current_user.ok_or_else(|| {
            OAuthError::Profile(AppError::StartggApi(
                "start.gg returned no current user".to_string(),
            ))
        })?;

        let user_id: u64 = current.id.as_str().parse().map_err(|_| {
            OAuthError::Profile(AppError::StartggApi(format!(
                "Unexpected start.gg user id: {}",
                current.id
            )))
        })?;
        let name = current.display_name();
        let now = format_utc_rfc3339(Utc::now());

        let existing = self.db.get_user(user_id).await?;
        let user = User {
            startgg_user_id: user_id,
            name: name.clone(),
            email: current.email.clone(),
            role: existing.as_ref().map(|u| u.role).unwrap_or(Role::Competitor),
            created_at: existing
                .as_ref()
                .map(|u| u.created_at.clone())
                .unwrap_or_else(|| now.clone()),
            last_active: now,
        };
        self.db.upsert_user(&user).await?;

        self.token_cache.remove(&user_id);
        self.store_tokens(user_id, &response, None).await?;

        tracing::info!(user_id, name = %name, "OAuth callback handled, user and tokens stored");

        Ok(OAuthResult { user_id, name })
    }

    // ─── Query Plumbing ──────────────────────────────────────────────────────

    /// Run a query as the user, retrying once after a rejected token.
    pub async fn query<T: DeserializeOwned>(
        &self,
        user_id: u64,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, AppError> {
        let token = self.get_valid_access_token(user_id).await?;
        self.client
            .query_with_refresh(&token, query, variables, || async move {
                tracing::warn!(user_id, "start.gg rejected access token, refreshing once");
                self.token_cache.remove(&user_id);
                self.force_refresh(user_id).await.map(|r| r.access_token)
            })
            .await
    }

    /// Run a query with the application token. `None` when no app token is configured.
    async fn app_query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<Option<T>, AppError> {
        let Some(token) = &self.app_token else {
            tracing::debug!("No start.gg app token configured");
            return Ok(None);
        };
        self.client.query(token, query, variables).await.map(Some)
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Active and upcoming offline Smash Ultimate events of the user.
    pub async fn user_events(&self, user_id: u64) -> Result<Vec<EventSummary>, AppError> {
        let data: UserTournamentsData = self
            .query(
                user_id,
                queries::ALL_TOURNAMENTS,
                json!({ "page": 1, "perPage": queries::PAGE_SIZE }),
            )
            .await?;
        Ok(select_user_events(
            data.into_tournaments(),
            Utc::now().timestamp(),
        ))
    }

    /// Ids of the tournaments in the user's own list.
    pub async fn user_tournament_ids(&self, user_id: u64) -> Result<Vec<String>, AppError> {
        let data: UserTournamentsData = self
            .query(
                user_id,
                queries::CHECK_USER_TOURNAMENTS,
                json!({ "perPage": queries::PAGE_SIZE }),
            )
            .await?;
        Ok(data
            .into_tournaments()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect())
    }

    /// Event details; `isAdmin` means owner or the tournament is in the user's list.
    pub async fn event(&self, user_id: u64, event_id: &str) -> Result<EventDetail, AppError> {
        let data: EventDetailData = self
            .query(user_id, queries::EVENT_DETAIL, json!({ "id": event_id }))
            .await?;
        let event = data
            .event
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        let mut is_admin = event.owner_id().as_deref() == Some(user_id.to_string().as_str());

        if !is_admin {
            if let Some(tournament_id) = event.tournament_id() {
                match self.user_tournament_ids(user_id).await {
                    Ok(ids) => is_admin = ids.contains(&tournament_id),
                    Err(e) => {
                        tracing::error!(event_id, error = %e, "Error checking user tournaments")
                    }
                }
            }
        }

        tracing::info!(event_id, user_id, is_admin, "Event admin check");
        Ok(event.into_detail(is_admin))
    }

    /// Not-started and in-progress sets of an event, without TBD sets.
    pub async fn event_sets(
        &self,
        user_id: u64,
        event_id: &str,
        best_of: u8,
    ) -> Result<Vec<SetSummary>, AppError> {
        let data: EventSetsData = self
            .query(
                user_id,
                &queries::event_sets(),
                json!({
                    "eventId": event_id,
                    "page": 1,
                    "perPage": queries::PAGE_SIZE,
                    "filters": { "state": [1, 2] },
                }),
            )
            .await?;

        if data.event.is_none() {
            return Err(AppError::NotFound("Event not found".to_string()));
        }
        Ok(collect_event_sets(data, event_id, best_of))
    }

    pub async fn set_detail(
        &self,
        user_id: u64,
        set_id: &str,
        best_of: u8,
    ) -> Result<SetDetail, AppError> {
        let data: SetDetailData = self
            .query(user_id, &queries::set_detail(), json!({ "setId": set_id }))
            .await?;
        data.set
            .map(|set| set.into_detail(best_of))
            .ok_or_else(|| AppError::NotFound("Set not found".to_string()))
    }

    pub async fn mark_set_in_progress(&self, user_id: u64, set_id: &str) -> Result<(), AppError> {
        let data: MarkSetInProgressData = self
            .query(
                user_id,
                queries::MARK_SET_IN_PROGRESS,
                json!({ "setId": set_id }),
            )
            .await
            .map_err(|e| mutation_failure(MARK_IN_PROGRESS_FAILED, e))?;
        mutation_result(MARK_IN_PROGRESS_FAILED, data.mark_set_in_progress)
            .inspect_err(|_| tracing::warn!(set_id, "markSetInProgress returned an empty result"))
    }

    /// Report a bracket set with per-game data.
    pub async fn report_set(
        &self,
        user_id: u64,
        set_id: &str,
        winner_id: &str,
        game_data: &[GameDataInput],
    ) -> Result<(), AppError> {
        let data: ReportBracketSetData = self
            .query(
                user_id,
                queries::REPORT_BRACKET_SET,
                json!({
                    "setId": set_id,
                    "winnerId": winner_id,
                    "gameData": game_data,
                }),
            )
            .await
            .map_err(|e| mutation_failure(REPORT_SET_FAILED, e))?;
        mutation_result(REPORT_SET_FAILED, data.report_bracket_set)
            .inspect_err(|_| tracing::warn!(set_id, "reportBracketSet returned an empty result"))
    }

    // ─── Tournament Admins ───────────────────────────────────────────────────

    /// Owner and admins with the application token, trying the normalized
    /// slug before the raw one. Falls back to admin participants when the
    /// `admins` list is empty.
    pub async fn tournament_admins_via_app(
        &self,
        slug: &str,
    ) -> Result<Option<TournamentAdmins>, AppError> {
        if self.app_token.is_none() {
            return Ok(None);
        }

        for candidate in slug_candidates(slug) {
            let data: Option<TournamentAdminsData> = self
                .app_query(queries::TOURNAMENT_ADMINS, json!({ "slug": candidate }))
                .await?;
            let Some(node) = data.and_then(|d| d.tournament) else {
                continue;
            };

            let mut admins = TournamentAdmins::from_admins(node);

            if admins.admin_user_ids.is_empty() {
                let fallback: Option<TournamentAdminParticipantsData> = self
                    .app_query(
                        queries::TOURNAMENT_PARTICIPANTS_ADMINS,
                        json!({ "slug": candidate, "page": 1, "perPage": queries::PAGE_SIZE }),
                    )
                    .await?;
                if let Some(node) = fallback.and_then(|d| d.tournament) {
                    let participants = TournamentAdmins::from_participants(node);
                    admins.admin_user_ids = participants.admin_user_ids;
                    admins.owner_id = admins.owner_id.or(participants.owner_id);
                }
            }

            tracing::info!(
                slug = %candidate,
                owner_id = ?admins.owner_id,
                admin_count = admins.admin_user_ids.len(),
                "start.gg app admin lookup"
            );

            if !admins.is_empty() {
                return Ok(Some(admins));
            }
        }

        Ok(None)
    }

    /// Owner and admins using the user's own token.
    pub async fn tournament_admins_via_user(
        &self,
        user_id: u64,
        slug: &str,
    ) -> Result<TournamentAdmins, AppError> {
        let mut admins = TournamentAdmins::default();
        for candidate in slug_candidates(slug) {
            let data: TournamentAdminsData = self
                .query(
                    user_id,
                    queries::TOURNAMENT_ADMINS_VIA_USER,
                    json!({ "slug": candidate }),
                )
                .await?;
            if let Some(node) = data.tournament {
                admins = TournamentAdmins::from_admins(node);
            }
            tracing::info!(
                slug = %candidate,
                user_id,
                owner_id = ?admins.owner_id,
                admin_count = admins.admin_user_ids.len(),
                "start.gg user admin lookup"
            );
            if !admins.is_empty() {
                break;
            }
        }
        Ok(admins)
    }
}

const MARK_IN_PROGRESS_FAILED: &str = "Failed to mark set in progress";
const REPORT_SET_FAILED: &str = "Failed to report set";

/// Put the failed action in front of start.gg's message.
fn mutation_failure(action: &str, error: AppError) -> AppError {
    match error {
        AppError::StartggApi(message) => AppError::StartggApi(format!("{}: {}", action, message)),
        other => other,
    }
}

/// A mutation answered with `null` and no `errors` entry.
fn mutation_result(action: &str, result: Option<serde_json::Value>) -> Result<(), AppError> {
    match result {
        Some(v) if !v.is_null() => Ok(()),
        _ => Err(AppError::StartggApi(format!(
            "{}: start.gg returned an empty result",
            action
        ))),
    }
}

/// Normalized slug first, then the raw one if it differs.
fn slug_candidates(slug: &str) -> Vec<String> {
    let normalized = normalize_slug(slug);
    let mut candidates = Vec::new();
    if !normalized.is_empty() {
        candidates.push(normalized);
    }
    if !slug.is_empty() && !candidates.iter().any(|c| c == slug) {
        candidates.push(slug.to_string());
    }
    candidates
}
