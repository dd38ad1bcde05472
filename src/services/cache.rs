// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived read-through cache for start.gg responses.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// TTL for per-user event lists and event summaries.
pub const EVENT_TTL: Duration = Duration::from_secs(5 * 60);
/// TTL for set listings, which change as sets are played.
pub const SETS_TTL: Duration = Duration::from_secs(2 * 60);

/// Expired entries are swept whenever the map grows to a multiple of this.
const SWEEP_EVERY: usize = 256;

#[derive(Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Keyed JSON cache with per-entry expiry, shared across requests.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let hit = self.entries.get(key)?;
        if hit.expires_at > Instant::now() {
            return Some(hit.value.clone());
        }
        drop(hit);
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: serde_json::Value, ttl: Duration) {
        let len = self.entries.len();
        if len > 0 && len % SWEEP_EVERY == 0 {
            self.sweep_expired();
        }
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Return the cached value for `key`, or compute and store it.
    ///
    /// Errors are returned to the caller and never cached.
    pub async fn get_or_try_insert<F, Fut, E>(
        &self,
        key: &str,
        ttl: Duration,
        load: F,
    ) -> Result<serde_json::Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value, E>>,
    {
        if let Some(value) = self.get(key) {
            tracing::debug!(key, "cache hit");
            return Ok(value);
        }
        let value = load().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Drop every expired entry, read or not.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        tracing::debug!(
            removed = before.saturating_sub(self.entries.len()),
            "Swept expired cache entries"
        );
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache keys, shared so writers invalidate exactly what readers fill.
pub mod keys {
    pub fn user_events(user_id: u64) -> String {
        format!("user_{}_events", user_id)
    }

    pub fn event(event_id: &str, user_id: u64) -> String {
        format!("event_{}_user_{}", event_id, user_id)
    }

    /// Prefix covering every set listing of an event.
    pub fn event_sets_prefix(event_id: &str) -> String {
        format!("event_{}_sets_", event_id)
    }

    pub fn event_sets(event_id: &str, mine_for: Option<u64>, status: Option<&str>) -> String {
        let scope = match mine_for {
            Some(user_id) => format!("user_{}", user_id),
            None => "all".to_string(),
        };
        match status {
            Some(status) => format!("{}{}_status_{}", event_sets_prefix(event_id), scope, status),
            None => format!("{}{}", event_sets_prefix(event_id), scope),
        }
    }
}
