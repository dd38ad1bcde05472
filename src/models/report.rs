// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Set result reports and their games.

use super::{Side, Stage};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Review status of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReportStatus::Pending),
            "approved" => Some(ReportStatus::Approved),
            "rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }
}

/// An entrant as recorded on a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ReportParticipant {
    pub entrant_id: String,
    pub name: String,
}

/// One game of a reported set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub report_id: String,
    /// 1-based game number
    pub index: u32,
    pub stage: Option<Stage>,
    pub winner: Side,
    /// Remaining stocks; `None` when unknown
    pub stocks_p1: Option<u8>,
    pub stocks_p2: Option<u8>,
    /// Fighter slugs
    pub character_p1: Option<String>,
    pub character_p2: Option<String>,
}

impl Game {
    /// Firestore document id (games are unique per report and index).
    pub fn doc_id(&self) -> String {
        format!("{}_{}", self.report_id, self.index)
    }
}

/// Count games won by each side.
pub fn tally(games: &[Game]) -> (u32, u32) {
    games.iter().fold((0, 0), |(p1, p2), g| match g.winner {
        Side::P1 => (p1 + 1, p2),
        Side::P2 => (p1, p2 + 1),
    })
}

/// Rejected lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Report is not pending")]
    NotPending,
    #[error("Report is not editable")]
    NotEditable,
}

/// Reported result of a set (stored in Firestore, keyed by `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    /// start.gg user id of the submitter
    pub user_id: u64,
    pub submitted_by: String,
    pub event_id: String,
    pub event_name: String,
    pub set_id: String,
    pub round: String,
    pub best_of: u8,
    pub p1: ReportParticipant,
    pub p2: ReportParticipant,
    pub score_p1: u32,
    pub score_p2: u32,
    pub status: ReportStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Report {
    /// Set the games of this report, keeping the scores in step with them.
    ///
    /// Returns the games with `report_id` filled in.
    pub fn set_games(&mut self, mut games: Vec<Game>) -> Vec<Game> {
        for game in &mut games {
            game.report_id = self.id.clone();
        }
        games.sort_by_key(|g| g.index);
        let (p1, p2) = tally(&games);
        self.score_p1 = p1;
        self.score_p2 = p2;
        games
    }

    /// Entrant id of the side with more game wins (P2 on a tie).
    pub fn winner_entrant_id(&self) -> &str {
        if self.score_p1 > self.score_p2 {
            &self.p1.entrant_id
        } else {
            &self.p2.entrant_id
        }
    }

    pub fn approve(&mut self, now: &str) -> Result<(), LifecycleError> {
        if self.status != ReportStatus::Pending {
            return Err(LifecycleError::NotPending);
        }
        self.status = ReportStatus::Approved;
        self.rejection_reason = None;
        self.updated_at = now.to_string();
        Ok(())
    }

    pub fn reject(&mut self, reason: &str, now: &str) -> Result<(), LifecycleError> {
        if self.status != ReportStatus::Pending {
            return Err(LifecycleError::NotPending);
        }
        self.status = ReportStatus::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.updated_at = now.to_string();
        Ok(())
    }

    /// Put a pending or rejected report back into review after an edit.
    pub fn reopen(&mut self, now: &str) -> Result<(), LifecycleError> {
        if self.status == ReportStatus::Approved {
            return Err(LifecycleError::NotEditable);
        }
        self.status = ReportStatus::Pending;
        self.rejection_reason = None;
        self.updated_at = now.to_string();
        Ok(())
    }
}

/// Report with its games, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReportWithGames {
    #[serde(flatten)]
    pub report: Report,
    pub games: Vec<Game>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_report() -> Report {
        Report {
            id: "r1".to_string(),
            user_id: 42,
            submitted_by: "Player".to_string(),
            event_id: "100".to_string(),
            event_name: "Ultimate Singles".to_string(),
            set_id: "555".to_string(),
            round: "Winners Round 1".to_string(),
            best_of: 3,
            p1: ReportParticipant {
                entrant_id: "11".to_string(),
                name: "Alpha".to_string(),
            },
            p2: ReportParticipant {
                entrant_id: "22".to_string(),
                name: "Beta".to_string(),
            },
            score_p1: 0,
            score_p2: 0,
            status: ReportStatus::Pending,
            notes: None,
            rejection_reason: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    pub(crate) fn game(index: u32, winner: Side) -> Game {
        Game {
            report_id: String::new(),
            index,
            stage: Some(Stage::Battlefield),
            winner,
            stocks_p1: None,
            stocks_p2: None,
            character_p1: Some("mario".to_string()),
            character_p2: Some("fox".to_string()),
        }
    }

    #[test]
    fn test_scores_follow_games() {
        let mut report = sample_report();
        let games = report.set_games(vec![game(2, Side::P1), game(1, Side::P1)]);

        assert_eq!((report.score_p1, report.score_p2), (2, 0));
        assert_eq!(games[0].index, 1);
        assert!(games.iter().all(|g| g.report_id == "r1"));
        assert_eq!(games[1].doc_id(), "r1_2");
        assert_eq!(report.winner_entrant_id(), "11");

        report.set_games(vec![game(1, Side::P2), game(2, Side::P1), game(3, Side::P2)]);
        assert_eq!((report.score_p1, report.score_p2), (1, 2));
        assert_eq!(report.winner_entrant_id(), "22");
    }

    #[test]
    fn test_approve_only_pending() {
        let mut report = sample_report();
        report.rejection_reason = Some("stale".to_string());
        report.approve("t1").unwrap();
        assert_eq!(report.status, ReportStatus::Approved);
        assert_eq!(report.rejection_reason, None);

        assert_eq!(report.approve("t2"), Err(LifecycleError::NotPending));
        assert_eq!(report.reject("nope", "t2"), Err(LifecycleError::NotPending));
        assert_eq!(report.reopen("t2"), Err(LifecycleError::NotEditable));
    }

    #[test]
    fn test_reject_then_reopen() {
        let mut report = sample_report();
        report.reject("Wrong character in game 2", "t1").unwrap();
        assert_eq!(report.status, ReportStatus::Rejected);
        assert_eq!(
            report.rejection_reason.as_deref(),
            Some("Wrong character in game 2")
        );

        report.reopen("t2").unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.rejection_reason, None);
        assert_eq!(report.updated_at, "t2");
    }

    #[test]
    fn test_serialized_shape() {
        let mut report = sample_report();
        report.set_games(vec![game(1, Side::P1), game(2, Side::P1)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["scoreP1"], 2);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["p1"]["entrantId"], "11");
    }
}
