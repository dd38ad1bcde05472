// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! start.gg manager: set reporting for offline Smash Ultimate brackets
//!
//! This crate provides the backend API that lets competitors run stage bans
//! and submit set results, and lets tournament admins review those reports
//! before they are sent to start.gg.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use dashmap::DashMap;
use db::FirestoreDb;
use services::{ResponseCache, StartggService};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// Per-set locks serializing RPS and ban updates within this instance.
pub type SetLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// OAuth codes already redeemed, with the time they were first seen.
pub type UsedOAuthCodes = Arc<DashMap<String, Instant>>;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub startgg: StartggService,
    pub cache: ResponseCache,
    pub used_oauth_codes: UsedOAuthCodes,
    pub set_locks: SetLocks,
}

impl AppState {
    /// Lock guarding the stored state of one set.
    pub fn set_lock(&self, set_id: &str) -> Arc<Mutex<()>> {
        self.set_locks
            .entry(set_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
