// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! start.gg response shapes and the app-facing DTOs they are mapped into.

use crate::models::{ReportStatus, Side};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Super Smash Bros. Ultimate videogame id on start.gg.
pub const SMASH_ULTIMATE_ID: &str = "1386";

// ─── Scalars ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum IdInner {
    Number(serde_json::Number),
    String(String),
}

impl From<IdInner> for Id {
    fn from(inner: IdInner) -> Self {
        Self(match inner {
            IdInner::Number(n) => n.to_string(),
            IdInner::String(s) => s,
        })
    }
}

/// start.gg `ID`, which the API returns as either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "IdInner", into = "String")]
pub struct Id(pub String);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Id> for String {
    fn from(Id(s): Id) -> Self {
        s
    }
}

impl Id {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdOnly {
    pub id: Option<Id>,
}

fn id_of(node: &Option<IdOnly>) -> Option<String> {
    node.as_ref()
        .and_then(|n| n.id.as_ref())
        .map(|id| id.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

// ─── Current user ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserData {
    pub current_user: Option<CurrentUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub id: Id,
    pub email: Option<String>,
    pub player: Option<Player>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub gamer_tag: Option<String>,
}

impl CurrentUser {
    /// Display name: gamerTag, or `user_{id}` when there is none.
    pub fn display_name(&self) -> String {
        self.player
            .as_ref()
            .and_then(|p| p.gamer_tag.as_deref())
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("user_{}", self.id))
    }
}

// ─── Tournaments and events ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTournamentsData {
    pub current_user: Option<UserTournaments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserTournaments {
    pub tournaments: Option<Connection<TournamentNode>>,
}

impl UserTournamentsData {
    pub fn into_tournaments(self) -> Vec<TournamentNode> {
        self.current_user
            .and_then(|u| u.tournaments)
            .unwrap_or_default()
            .nodes
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentNode {
    pub id: Id,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub start_at: Option<i64>,
    pub end_at: Option<i64>,
    #[serde(default)]
    pub events: Option<Vec<EventNode>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNode {
    pub id: Id,
    pub name: Option<String>,
    pub start_at: Option<i64>,
    pub is_online: Option<bool>,
    /// `ActivityState`; older responses use the numeric form.
    pub state: Option<serde_json::Value>,
    pub videogame: Option<IdOnly>,
}

impl EventNode {
    fn is_running(&self) -> bool {
        match &self.state {
            Some(serde_json::Value::Number(n)) => n.as_i64() == Some(2),
            Some(serde_json::Value::String(s)) => s == "ACTIVE",
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Upcoming,
}

/// Event card on the competitor dashboard.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: String,
    pub name: String,
    pub game: String,
    pub tournament_name: Option<String>,
    pub tournament_slug: Option<String>,
    pub start_at: Option<i64>,
    pub status: EventStatus,
}

/// Offline Smash Ultimate events from the user's tournaments that are running
/// or have not started yet, without duplicates, earliest first.
pub fn select_user_events(tournaments: Vec<TournamentNode>, now: i64) -> Vec<EventSummary> {
    let mut events: Vec<EventSummary> = Vec::new();

    for tournament in tournaments {
        for event in tournament.events.clone().unwrap_or_default() {
            if events.iter().any(|e| e.id == event.id.as_str()) {
                continue;
            }
            if event.is_online.unwrap_or(false) {
                continue;
            }
            let is_ultimate = event
                .videogame
                .as_ref()
                .and_then(|v| v.id.as_ref())
                .is_some_and(|id| id.as_str() == SMASH_ULTIMATE_ID);
            if !is_ultimate {
                continue;
            }

            let start_at = event.start_at.or(tournament.start_at);
            let in_window = match (start_at, tournament.end_at) {
                (Some(start), Some(end)) => start <= now && now < end,
                _ => false,
            };
            let is_active = event.is_running() || in_window;
            let is_upcoming = start_at.is_some_and(|start| start > now);

            let status = if is_active {
                EventStatus::Active
            } else if is_upcoming {
                EventStatus::Upcoming
            } else {
                continue;
            };

            events.push(EventSummary {
                id: event.id.to_string(),
                name: event.name.clone().unwrap_or_default(),
                game: "smash_ultimate".to_string(),
                tournament_name: tournament.name.clone(),
                tournament_slug: tournament.slug.clone(),
                start_at,
                status,
            });
        }
    }

    events.sort_by_key(|e| e.start_at.unwrap_or(0));
    events
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventDetailData {
    pub event: Option<EventDetailNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetailNode {
    pub id: Id,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub start_at: Option<i64>,
    pub tournament: Option<TournamentRef>,
    pub user_entrant: Option<IdOnly>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentRef {
    pub id: Option<Id>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub owner: Option<IdOnly>,
}

/// Event page header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub id: String,
    pub name: String,
    pub game: String,
    pub tournament_id: Option<String>,
    pub tournament_name: Option<String>,
    pub tournament_slug: Option<String>,
    pub tournament_owner_id: Option<String>,
    pub start_at: Option<i64>,
    /// Owner of the tournament, or the tournament is in the user's own list
    pub is_admin: bool,
    pub user_entrant_id: Option<String>,
}

impl EventDetailNode {
    pub fn tournament_id(&self) -> Option<String> {
        self.tournament
            .as_ref()
            .and_then(|t| t.id.as_ref())
            .map(|id| id.to_string())
    }

    pub fn owner_id(&self) -> Option<String> {
        self.tournament.as_ref().and_then(|t| id_of(&t.owner))
    }

    pub fn into_detail(self, is_admin: bool) -> EventDetail {
        let tournament_id = self.tournament_id();
        let tournament_owner_id = self.owner_id();
        let (tournament_name, tournament_slug) = match self.tournament {
            Some(t) => (t.name, t.slug),
            None => (None, None),
        };
        EventDetail {
            id: self.id.to_string(),
            name: self.name.unwrap_or_default(),
            game: "smash_ultimate".to_string(),
            tournament_id,
            tournament_name,
            tournament_slug,
            tournament_owner_id,
            start_at: self.start_at,
            is_admin,
            user_entrant_id: id_of(&self.user_entrant),
        }
    }
}

// ─── Sets ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct EventSetsData {
    pub event: Option<EventSetsNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSetsNode {
    pub id: Option<Id>,
    pub name: Option<String>,
    #[serde(default)]
    pub phases: Option<Vec<PhaseNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseNode {
    pub sets: Option<Connection<SetNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetDetailData {
    pub set: Option<SetNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNode {
    pub id: Id,
    pub full_round_text: Option<String>,
    pub round: Option<i64>,
    pub state: Option<i64>,
    pub event: Option<SetEventRef>,
    #[serde(default)]
    pub slots: Option<Vec<SlotNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetEventRef {
    pub id: Option<Id>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotNode {
    pub entrant: Option<EntrantNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntrantNode {
    pub id: Option<Id>,
    pub name: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<ParticipantNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantNode {
    pub id: Option<Id>,
    pub user: Option<IdOnly>,
}

/// App-level set status. The first three come from start.gg; the rest
/// reflect the latest local report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    NotStarted,
    InProgress,
    Completed,
    Reported,
    Approved,
    Rejected,
}

impl SetStatus {
    /// Map a start.gg set state (1/2/3). Anything else counts as not started.
    pub fn from_startgg(state: Option<i64>) -> Self {
        match state {
            Some(2) => SetStatus::InProgress,
            Some(3) => SetStatus::Completed,
            _ => SetStatus::NotStarted,
        }
    }

    pub fn from_report(status: ReportStatus) -> Self {
        match status {
            ReportStatus::Pending => SetStatus::Reported,
            ReportStatus::Approved => SetStatus::Approved,
            ReportStatus::Rejected => SetStatus::Rejected,
        }
    }

    pub const ALL: [SetStatus; 6] = [
        SetStatus::NotStarted,
        SetStatus::InProgress,
        SetStatus::Completed,
        SetStatus::Reported,
        SetStatus::Approved,
        SetStatus::Rejected,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SetStatus::NotStarted => "not_started",
            SetStatus::InProgress => "in_progress",
            SetStatus::Completed => "completed",
            SetStatus::Reported => "reported",
            SetStatus::Approved => "approved",
            SetStatus::Rejected => "rejected",
        }
    }
}

/// One entrant slot of a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SetSide {
    /// start.gg user id of the entrant's first participant
    pub user_id: Option<String>,
    pub participant_id: Option<String>,
    pub entrant_id: Option<String>,
    pub name: String,
}

pub const TBD: &str = "TBD";

impl SetSide {
    fn from_slot(slot: Option<&SlotNode>) -> Self {
        let entrant = slot.and_then(|s| s.entrant.as_ref());
        let participant = entrant
            .and_then(|e| e.participants.as_ref())
            .and_then(|p| p.first());

        Self {
            user_id: participant.and_then(|p| id_of(&p.user)),
            participant_id: participant
                .and_then(|p| p.id.as_ref())
                .map(|id| id.to_string()),
            entrant_id: entrant.and_then(|e| e.id.as_ref()).map(|id| id.to_string()),
            name: entrant
                .and_then(|e| e.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| TBD.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        self.name != TBD
    }

    /// Whether `user_id` is this side's start.gg user.
    pub fn is_user(&self, user_id: u64) -> bool {
        self.user_id.as_deref() == Some(user_id.to_string().as_str())
    }

    /// Looser participant match used when accepting reports: the id may be
    /// the user, participant or entrant id.
    pub fn has_id(&self, id: u64) -> bool {
        let id = id.to_string();
        [&self.user_id, &self.participant_id, &self.entrant_id]
            .into_iter()
            .any(|candidate| candidate.as_deref() == Some(id.as_str()))
    }
}

/// A set as listed on the event page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SetSummary {
    pub id: String,
    pub event_id: String,
    pub round: String,
    pub best_of: u8,
    pub p1: SetSide,
    pub p2: SetSide,
    pub status: SetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_status: Option<ReportStatus>,
}

impl SetSummary {
    pub fn involves_user(&self, user_id: u64) -> bool {
        self.p1.is_user(user_id) || self.p2.is_user(user_id)
    }
}

/// A single set with event context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SetDetail {
    pub id: String,
    pub event_id: Option<String>,
    pub event_name: String,
    pub round: String,
    pub best_of: u8,
    pub p1: SetSide,
    pub p2: SetSide,
    pub status: SetStatus,
}

impl SetDetail {
    /// Side played by the given start.gg user, matched on user id only.
    pub fn side_of(&self, user_id: u64) -> Option<Side> {
        if self.p1.is_user(user_id) {
            Some(Side::P1)
        } else if self.p2.is_user(user_id) {
            Some(Side::P2)
        } else {
            None
        }
    }

    pub fn is_participant(&self, user_id: u64) -> bool {
        self.p1.has_id(user_id) || self.p2.has_id(user_id)
    }

    pub fn side(&self, side: Side) -> &SetSide {
        match side {
            Side::P1 => &self.p1,
            Side::P2 => &self.p2,
        }
    }
}

fn round_label(set: &SetNode) -> String {
    set.full_round_text
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| format!("Round {}", set.round.unwrap_or_default()))
}

impl SetNode {
    fn sides(&self) -> (SetSide, SetSide) {
        let slots = self.slots.as_deref().unwrap_or_default();
        (
            SetSide::from_slot(slots.first()),
            SetSide::from_slot(slots.get(1)),
        )
    }

    pub fn into_summary(self, event_id: &str, best_of: u8) -> SetSummary {
        let (p1, p2) = self.sides();
        SetSummary {
            round: round_label(&self),
            id: self.id.to_string(),
            event_id: event_id.to_string(),
            best_of,
            p1,
            p2,
            status: SetStatus::from_startgg(self.state),
            report_status: None,
        }
    }

    pub fn into_detail(self, best_of: u8) -> SetDetail {
        let (p1, p2) = self.sides();
        let (event_id, event_name) = match &self.event {
            Some(e) => (
                e.id.as_ref().map(|id| id.to_string()),
                e.name.clone().unwrap_or_else(|| "Unknown Event".to_string()),
            ),
            None => (None, "Unknown Event".to_string()),
        };
        SetDetail {
            round: round_label(&self),
            id: self.id.to_string(),
            event_id,
            event_name,
            best_of,
            p1,
            p2,
            status: SetStatus::from_startgg(self.state),
        }
    }
}

/// Flatten sets across phases, dropping sets that still wait for an entrant.
pub fn collect_event_sets(data: EventSetsData, event_id: &str, best_of: u8) -> Vec<SetSummary> {
    data.event
        .and_then(|e| e.phases)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|phase| phase.sets.unwrap_or_default().nodes)
        .map(|set| set.into_summary(event_id, best_of))
        .filter(|set| set.p1.is_known() && set.p2.is_known())
        .collect()
}

// ─── Tournament admins ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentAdminsData {
    pub tournament: Option<TournamentAdminsNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentAdminsNode {
    pub owner: Option<IdOnly>,
    #[serde(default)]
    pub admins: Option<Vec<AdminNode>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminNode {
    pub id: Option<Id>,
    pub user: Option<IdOnly>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentAdminParticipantsData {
    pub tournament: Option<TournamentAdminParticipantsNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentAdminParticipantsNode {
    pub owner: Option<IdOnly>,
    pub participants: Option<Connection<ParticipantNode>>,
}

/// Owner and admin user ids of a tournament.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TournamentAdmins {
    pub owner_id: Option<String>,
    pub admin_user_ids: Vec<String>,
}

impl TournamentAdmins {
    /// From the `admins` list. Entries carry either a nested user or a bare id.
    pub fn from_admins(node: TournamentAdminsNode) -> Self {
        Self {
            owner_id: id_of(&node.owner),
            admin_user_ids: node
                .admins
                .unwrap_or_default()
                .into_iter()
                .filter_map(|a| id_of(&a.user).or_else(|| a.id.map(|id| id.to_string())))
                .collect(),
        }
    }

    pub fn from_participants(node: TournamentAdminParticipantsNode) -> Self {
        Self {
            owner_id: id_of(&node.owner),
            admin_user_ids: node
                .participants
                .unwrap_or_default()
                .nodes
                .into_iter()
                .filter_map(|p| id_of(&p.user))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owner_id.is_none() && self.admin_user_ids.is_empty()
    }
}

/// Strip a leading `tournament/` from a tournament slug.
pub fn normalize_slug(slug: &str) -> String {
    slug.strip_prefix("tournament/")
        .unwrap_or(slug)
        .trim_start_matches('/')
        .to_string()
}

// ─── Mutations ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSetInProgressData {
    pub mark_set_in_progress: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBracketSetData {
    pub report_bracket_set: Option<serde_json::Value>,
}

/// `BracketSetGameDataInput`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDataInput {
    pub winner_id: String,
    pub game_num: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selections: Option<Vec<SelectionInput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrant1_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrant2_score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionInput {
    pub entrant_id: String,
    pub character_id: u32,
}
