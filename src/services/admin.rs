// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tournament admin resolution.
//!
//! start.gg does not reliably expose admin membership to user-scoped tokens,
//! so a user counts as an event admin when any one of these holds:
//! - they own the tournament
//! - they are in the tournament's admin list (app token, then user token)
//! - the tournament shows up in their own tournament list

use crate::services::startgg::types::TournamentAdmins;
use crate::services::startgg::StartggService;

/// Everything learned about a user's standing in one tournament.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminSignals {
    pub owner_ids: Vec<String>,
    pub admin_ids: Vec<String>,
    pub in_user_tournaments: bool,
}

impl AdminSignals {
    pub fn add(&mut self, admins: TournamentAdmins) {
        if let Some(owner) = admins.owner_id {
            if !self.owner_ids.contains(&owner) {
                self.owner_ids.push(owner);
            }
        }
        for id in admins.admin_user_ids {
            if !self.admin_ids.contains(&id) {
                self.admin_ids.push(id);
            }
        }
    }

    pub fn grants(&self, user_id: u64) -> bool {
        let user_id = user_id.to_string();
        self.in_user_tournaments
            || self.owner_ids.contains(&user_id)
            || self.admin_ids.contains(&user_id)
    }
}

/// Outcome of an admin check for one event.
#[derive(Debug, Clone)]
pub struct AdminResolution {
    pub is_admin: bool,
    pub signals: AdminSignals,
}

/// Decide whether `user_id` administers the event whose tournament is `slug`.
///
/// Sources are consulted cheapest-first and the first positive answer wins.
/// Lookup failures count as "no signal" and are only logged.
pub async fn resolve_event_admin(
    startgg: &StartggService,
    user_id: u64,
    event_id: &str,
    slug: &str,
) -> AdminResolution {
    let mut signals = AdminSignals::default();

    match startgg.tournament_admins_via_app(slug).await {
        Ok(Some(admins)) => signals.add(admins),
        Ok(None) => {}
        Err(e) => tracing::warn!(event_id, slug, error = %e, "App-token admin lookup failed"),
    }
    if signals.grants(user_id) {
        return AdminResolution {
            is_admin: true,
            signals,
        };
    }

    match startgg.event(user_id, event_id).await {
        Ok(event) => {
            signals.in_user_tournaments = event.is_admin;
            if let Some(owner) = event.tournament_owner_id {
                signals.add(TournamentAdmins {
                    owner_id: Some(owner),
                    admin_user_ids: Vec::new(),
                });
            }
        }
        Err(e) => tracing::warn!(event_id, slug, error = %e, "Event admin flag lookup failed"),
    }
    if signals.grants(user_id) {
        return AdminResolution {
            is_admin: true,
            signals,
        };
    }

    match startgg.tournament_admins_via_user(user_id, slug).await {
        Ok(admins) => signals.add(admins),
        Err(e) => tracing::warn!(event_id, slug, error = %e, "User-token admin lookup failed"),
    }

    AdminResolution {
        is_admin: signals.grants(user_id),
        signals,
    }
}
