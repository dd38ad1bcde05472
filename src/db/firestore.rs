// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and their encrypted start.gg tokens
//! - Reports with their games, plus the per-set pending marker
//! - Set ban state and report drafts

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Game, Report, ReportStatus, ReportWithGames, SetDraft, SetState, User, UserTokens};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Points at the pending report of a set while it awaits review.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingMarker {
    set_id: String,
    report_id: String,
    created_at: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::Database(e.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: for<'de> Deserialize<'de> + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(db_err)
    }

    async fn put_doc<T>(&self, collection: &str, id: &str, doc: &T) -> Result<(), AppError>
    where
        T: Serialize + for<'de> Deserialize<'de> + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their start.gg user ID.
    pub async fn get_user(&self, user_id: u64) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, &user_id.to_string()).await
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.put_doc(collections::USERS, &user.startgg_user_id.to_string(), user)
            .await
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get encrypted tokens for a user.
    pub async fn get_tokens(&self, user_id: u64) -> Result<Option<UserTokens>, AppError> {
        self.get_doc(collections::TOKENS, &user_id.to_string()).await
    }

    /// Store encrypted tokens for a user.
    pub async fn set_tokens(&self, user_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        self.put_doc(collections::TOKENS, &user_id.to_string(), tokens)
            .await
    }

    // ─── Report Operations ───────────────────────────────────────

    pub async fn get_report(&self, report_id: &str) -> Result<Option<Report>, AppError> {
        self.get_doc(collections::REPORTS, report_id).await
    }

    /// Games of a report, in game order.
    pub async fn get_games(&self, report_id: &str) -> Result<Vec<Game>, AppError> {
        let mut games: Vec<Game> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::GAMES)
            .filter(|q| q.for_all([q.field("reportId").eq(report_id)]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;
        games.sort_by_key(|g| g.index);
        Ok(games)
    }

    pub async fn get_report_with_games(
        &self,
        report_id: &str,
    ) -> Result<Option<ReportWithGames>, AppError> {
        let Some(report) = self.get_report(report_id).await? else {
            return Ok(None);
        };
        let games = self.get_games(report_id).await?;
        Ok(Some(ReportWithGames { report, games }))
    }

    /// Id of the pending report of a set, if any.
    pub async fn pending_report_id(&self, set_id: &str) -> Result<Option<String>, AppError> {
        let marker: Option<PendingMarker> = self.get_doc(collections::PENDING_SETS, set_id).await?;
        Ok(marker.map(|m| m.report_id))
    }

    fn pending_conflict(report_id: String) -> AppError {
        AppError::Conflict {
            message: "A report is already pending for this set".to_string(),
            report_id,
        }
    }

    /// Store a new pending report with its games.
    ///
    /// The report, its games and the set's pending marker are written in one
    /// transaction. The marker is created with an existence precondition, so
    /// a second pending report for the same set fails with `Conflict`.
    pub async fn create_report(&self, report: &Report, games: &[Game]) -> Result<(), AppError> {
        if let Some(existing) = self.pending_report_id(&report.set_id).await? {
            return Err(Self::pending_conflict(existing));
        }

        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let marker = PendingMarker {
            set_id: report.set_id.clone(),
            report_id: report.id.clone(),
            created_at: report.created_at.clone(),
        };

        client
            .fluent()
            .update()
            .in_col(collections::PENDING_SETS)
            .precondition(firestore::FirestoreWritePrecondition::Exists(false))
            .document_id(&report.set_id)
            .object(&marker)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add marker to transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::REPORTS)
            .document_id(&report.id)
            .object(report)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add report to transaction: {}", e)))?;

        for game in games {
            client
                .fluent()
                .update()
                .in_col(collections::GAMES)
                .document_id(game.doc_id())
                .object(game)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add game to transaction: {}", e))
                })?;
        }

        if let Err(e) = transaction.commit().await {
            // Lost a race with another submission for the same set
            if let Some(existing) = self.pending_report_id(&report.set_id).await? {
                return Err(Self::pending_conflict(existing));
            }
            return Err(AppError::Database(format!("Transaction commit failed: {}", e)));
        }

        tracing::info!(
            report_id = %report.id,
            set_id = %report.set_id,
            games = games.len(),
            "Report stored"
        );
        Ok(())
    }

    /// Replace the games of a report after an edit and put it back into review.
    ///
    /// Fails with `Conflict` if another report of the same set is pending.
    pub async fn update_report_games(
        &self,
        report: &Report,
        games: &[Game],
    ) -> Result<(), AppError> {
        if let Some(existing) = self.pending_report_id(&report.set_id).await? {
            if existing != report.id {
                return Err(Self::pending_conflict(existing));
            }
        }

        let old_games = self.get_games(&report.id).await?;
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let new_ids: Vec<String> = games.iter().map(Game::doc_id).collect();
        for old in old_games.iter().filter(|g| !new_ids.contains(&g.doc_id())) {
            client
                .fluent()
                .delete()
                .from(collections::GAMES)
                .document_id(old.doc_id())
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add game deletion to transaction: {}", e))
                })?;
        }

        for game in games {
            client
                .fluent()
                .update()
                .in_col(collections::GAMES)
                .document_id(game.doc_id())
                .object(game)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add game to transaction: {}", e))
                })?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::REPORTS)
            .document_id(&report.id)
            .object(report)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add report to transaction: {}", e)))?;

        let marker = PendingMarker {
            set_id: report.set_id.clone(),
            report_id: report.id.clone(),
            created_at: report.updated_at.clone(),
        };
        client
            .fluent()
            .update()
            .in_col(collections::PENDING_SETS)
            .document_id(&report.set_id)
            .object(&marker)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add marker to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(report_id = %report.id, games = games.len(), "Report games replaced");
        Ok(())
    }

    /// Persist an approved or rejected report and release the set's marker.
    pub async fn finish_review(&self, report: &Report) -> Result<(), AppError> {
        let client = self.get_client()?;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::REPORTS)
            .document_id(&report.id)
            .object(report)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add report to transaction: {}", e)))?;

        if self.pending_report_id(&report.set_id).await?.as_deref() == Some(report.id.as_str()) {
            client
                .fluent()
                .delete()
                .from(collections::PENDING_SETS)
                .document_id(&report.set_id)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add marker deletion to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(report_id = %report.id, status = report.status.as_str(), "Report reviewed");
        Ok(())
    }

    /// Reports of an event, newest first, optionally filtered by status.
    pub async fn list_reports(
        &self,
        event_id: &str,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>, AppError> {
        let mut reports: Vec<Report> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::REPORTS)
            .filter(|q| {
                q.for_all([
                    q.field("eventId").eq(event_id),
                    status.and_then(|s| q.field("status").eq(s.as_str())),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(db_err)?;
        // Sorted here to avoid a composite index on (eventId, createdAt)
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    /// All reports of a set, newest first.
    pub async fn reports_for_set(&self, set_id: &str) -> Result<Vec<Report>, AppError> {
        let mut reports: Vec<Report> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::REPORTS)
            .filter(|q| q.for_all([q.field("setId").eq(set_id)]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    pub async fn latest_report_for_set(&self, set_id: &str) -> Result<Option<Report>, AppError> {
        Ok(self.reports_for_set(set_id).await?.into_iter().next())
    }

    /// Latest report per set, for the sets that have one.
    pub async fn latest_reports_for_sets(
        &self,
        set_ids: &[String],
    ) -> Result<HashMap<String, Report>, AppError> {
        let results = stream::iter(set_ids.to_vec())
            .map(|set_id| async move {
                let latest = self.latest_report_for_set(&set_id).await?;
                Ok::<_, AppError>(latest.map(|r| (set_id, r)))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<_, AppError>>>()
            .await;

        let mut out = HashMap::new();
        for result in results {
            if let Some((set_id, report)) = result? {
                out.insert(set_id, report);
            }
        }
        Ok(out)
    }

    // ─── Set State Operations ────────────────────────────────────

    pub async fn get_set_state(&self, set_id: &str) -> Result<Option<SetState>, AppError> {
        self.get_doc(collections::SET_STATES, set_id).await
    }

    pub async fn save_set_state(&self, state: &SetState) -> Result<(), AppError> {
        self.put_doc(collections::SET_STATES, &state.set_id, state)
            .await
    }

    /// Stored state, or a fresh one in the RPS phase (which is then stored).
    pub async fn get_or_create_set_state(
        &self,
        set_id: &str,
        best_of: u8,
        now: &str,
    ) -> Result<SetState, AppError> {
        if let Some(state) = self.get_set_state(set_id).await? {
            return Ok(state);
        }
        let state = SetState::new(set_id, best_of, now);
        self.save_set_state(&state).await?;
        Ok(state)
    }

    /// Stored states for the given sets, keyed by set id.
    pub async fn set_states_for(
        &self,
        set_ids: &[String],
    ) -> Result<HashMap<String, SetState>, AppError> {
        let results = stream::iter(set_ids.to_vec())
            .map(|set_id| async move { self.get_set_state(&set_id).await })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<SetState>, AppError>>>()
            .await;

        let mut out = HashMap::new();
        for result in results {
            if let Some(state) = result? {
                out.insert(state.set_id.clone(), state);
            }
        }
        Ok(out)
    }

    // ─── Draft Operations ────────────────────────────────────────

    pub async fn get_draft(&self, set_id: &str, user_id: u64) -> Result<Option<SetDraft>, AppError> {
        self.get_doc(collections::SET_DRAFTS, &SetDraft::doc_id(set_id, user_id))
            .await
    }

    pub async fn save_draft(&self, draft: &SetDraft) -> Result<(), AppError> {
        self.put_doc(
            collections::SET_DRAFTS,
            &SetDraft::doc_id(&draft.set_id, draft.user_id),
            draft,
        )
        .await
    }

    // ─── Set Reset ───────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete(&self, docs: &[(&'static str, String)]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in docs.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for (collection, doc_id) in chunk {
                client
                    .fluent()
                    .delete()
                    .from(*collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Delete all local data of a set: reports, their games, drafts, ban
    /// state and the pending marker.
    ///
    /// Returns the number of documents deleted.
    pub async fn reset_set(&self, set_id: &str) -> Result<usize, AppError> {
        let mut docs: Vec<(&'static str, String)> = Vec::new();

        for report in self.reports_for_set(set_id).await? {
            for game in self.get_games(&report.id).await? {
                docs.push((collections::GAMES, game.doc_id()));
            }
            docs.push((collections::REPORTS, report.id));
        }

        let drafts: Vec<SetDraft> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SET_DRAFTS)
            .filter(|q| q.for_all([q.field("set_id").eq(set_id)]))
            .obj()
            .query()
            .await
            .map_err(db_err)?;
        for draft in drafts {
            docs.push((collections::SET_DRAFTS, SetDraft::doc_id(&draft.set_id, draft.user_id)));
        }

        docs.push((collections::SET_STATES, set_id.to_string()));
        docs.push((collections::PENDING_SETS, set_id.to_string()));

        let count = docs.len();
        self.batch_delete(&docs).await?;

        tracing::info!(set_id, deleted = count, "Local set data reset");
        Ok(count)
    }
}
