// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-set pre-game state: rock-paper-scissors, stage bans and the final pick.
//!
//! Ban order is fixed: P1 bans 3 stages, P2 bans 4, then P1 picks the final
//! stage from the two that remain. [`SetPhase`] holds the live state machine;
//! [`SetState`] is the flat record stored in Firestore and returned to the
//! frontend.

use super::{Side, Stage};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Bans P1 makes before P2 starts banning.
pub const P1_BANS: usize = 3;
/// Bans P2 makes after P1.
pub const P2_BANS: usize = 4;
/// Total bans before the final pick.
pub const TOTAL_BANS: usize = P1_BANS + P2_BANS;

/// Allowed best-of formats.
pub const BEST_OF_OPTIONS: [u8; 2] = [3, 5];
pub const DEFAULT_BEST_OF: u8 = 3;

/// Games a side must win to take a best-of-`best_of` set.
pub fn wins_needed(best_of: u8) -> u8 {
    best_of / 2 + 1
}

/// A rock-paper-scissors throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum RpsChoice {
    Rock,
    Paper,
    Scissors,
}

impl RpsChoice {
    pub fn beats(self, other: RpsChoice) -> bool {
        matches!(
            (self, other),
            (RpsChoice::Rock, RpsChoice::Scissors)
                | (RpsChoice::Paper, RpsChoice::Rock)
                | (RpsChoice::Scissors, RpsChoice::Paper)
        )
    }
}

/// Whose move it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// Waiting for one or both throws.
    Rps,
    Ban(Side),
    Pick(Side),
    /// Stage chosen; games can be played.
    Games,
}

impl Turn {
    /// Whose turn it is during banning, determined by the number of bans alone.
    pub fn for_ban_count(bans: usize) -> Turn {
        match bans {
            n if n < P1_BANS => Turn::Ban(Side::P1),
            n if n < TOTAL_BANS => Turn::Ban(Side::P2),
            _ => Turn::Pick(Side::P1),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Turn::Rps => "rps",
            Turn::Ban(Side::P1) => "ban_p1",
            Turn::Ban(Side::P2) => "ban_p2",
            Turn::Pick(Side::P1) => "pick_p1",
            Turn::Pick(Side::P2) => "pick_p2",
            Turn::Games => "games",
        }
    }
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Rock-paper-scissors already decided")]
    RpsClosed,
    #[error("Banning phase not active")]
    BanningNotActive,
    #[error("Final stage already selected")]
    FinalStageSelected,
    #[error("Stage already banned")]
    AlreadyBanned,
    #[error("Not your turn to ban")]
    NotYourTurnToBan,
    #[error("Not your turn to pick")]
    NotYourTurnToPick,
}

impl TransitionError {
    /// Turn-order violations are authorization failures; the rest are invalid input.
    pub fn is_turn_violation(&self) -> bool {
        matches!(
            self,
            TransitionError::NotYourTurnToBan | TransitionError::NotYourTurnToPick
        )
    }
}

/// The stage-selection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetPhase {
    Rps {
        p1: Option<RpsChoice>,
        p2: Option<RpsChoice>,
    },
    Banning {
        rps: (RpsChoice, RpsChoice),
        bans: Vec<Stage>,
    },
    Picked {
        rps: (RpsChoice, RpsChoice),
        bans: Vec<Stage>,
        final_stage: Stage,
    },
}

impl SetPhase {
    pub fn new() -> Self {
        SetPhase::Rps { p1: None, p2: None }
    }

    pub fn turn(&self) -> Turn {
        match self {
            SetPhase::Rps { .. } => Turn::Rps,
            SetPhase::Banning { bans, .. } => Turn::for_ban_count(bans.len()),
            SetPhase::Picked { .. } => Turn::Games,
        }
    }

    pub fn bans(&self) -> &[Stage] {
        match self {
            SetPhase::Rps { .. } => &[],
            SetPhase::Banning { bans, .. } | SetPhase::Picked { bans, .. } => bans,
        }
    }

    /// Record a throw. Banning starts once both sides have thrown.
    pub fn throw(self, side: Side, choice: RpsChoice) -> Result<SetPhase, TransitionError> {
        let SetPhase::Rps { mut p1, mut p2 } = self else {
            return Err(TransitionError::RpsClosed);
        };

        match side {
            Side::P1 => p1 = Some(choice),
            Side::P2 => p2 = Some(choice),
        }

        Ok(match (p1, p2) {
            (Some(a), Some(b)) => SetPhase::Banning {
                rps: (a, b),
                bans: Vec::new(),
            },
            _ => SetPhase::Rps { p1, p2 },
        })
    }

    /// Ban a stage, or pick the final stage once all bans are in.
    pub fn select_stage(self, side: Side, stage: Stage) -> Result<SetPhase, TransitionError> {
        let (rps, mut bans) = match self {
            SetPhase::Rps { .. } => return Err(TransitionError::BanningNotActive),
            SetPhase::Picked { .. } => return Err(TransitionError::FinalStageSelected),
            SetPhase::Banning { rps, bans } => (rps, bans),
        };

        if bans.contains(&stage) {
            return Err(TransitionError::AlreadyBanned);
        }

        match Turn::for_ban_count(bans.len()) {
            Turn::Ban(turn) if turn == side => {
                bans.push(stage);
                Ok(SetPhase::Banning { rps, bans })
            }
            Turn::Ban(_) => Err(TransitionError::NotYourTurnToBan),
            Turn::Pick(turn) if turn == side => Ok(SetPhase::Picked {
                rps,
                bans,
                final_stage: stage,
            }),
            _ => Err(TransitionError::NotYourTurnToPick),
        }
    }

    /// Stages still available to ban or pick.
    pub fn remaining_stages(&self) -> Vec<Stage> {
        let bans = self.bans();
        Stage::ALL
            .into_iter()
            .filter(|s| !bans.contains(s))
            .collect()
    }

    /// Side that won rock-paper-scissors, `None` while undecided or on a tie.
    pub fn rps_winner(&self) -> Option<Side> {
        let (a, b) = match self {
            SetPhase::Rps { .. } => return None,
            SetPhase::Banning { rps, .. } | SetPhase::Picked { rps, .. } => *rps,
        };
        if a.beats(b) {
            Some(Side::P1)
        } else if b.beats(a) {
            Some(Side::P2)
        } else {
            None
        }
    }
}

impl Default for SetPhase {
    fn default() -> Self {
        Self::new()
    }
}

/// Stored phase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum PhaseName {
    Rps,
    Banning,
    Picked,
}

/// Set state document (keyed by start.gg set id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SetState {
    pub set_id: String,
    pub phase: PhaseName,
    pub p1_choice: Option<RpsChoice>,
    pub p2_choice: Option<RpsChoice>,
    #[serde(default)]
    pub bans: Vec<Stage>,
    pub final_stage: Option<Stage>,
    pub best_of: u8,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored state that no sequence of legal moves could have produced.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Corrupt set state for {set_id}: {reason}")]
pub struct CorruptSetState {
    pub set_id: String,
    pub reason: &'static str,
}

impl SetState {
    pub fn new(set_id: &str, best_of: u8, now: &str) -> Self {
        Self {
            set_id: set_id.to_string(),
            phase: PhaseName::Rps,
            p1_choice: None,
            p2_choice: None,
            bans: Vec::new(),
            final_stage: None,
            best_of,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Rebuild the state machine from the stored fields.
    pub fn machine(&self) -> Result<SetPhase, CorruptSetState> {
        let corrupt = |reason| CorruptSetState {
            set_id: self.set_id.clone(),
            reason,
        };

        let mut seen = Vec::with_capacity(self.bans.len());
        for stage in &self.bans {
            if seen.contains(stage) {
                return Err(corrupt("duplicate ban"));
            }
            seen.push(*stage);
        }
        if self.bans.len() > TOTAL_BANS {
            return Err(corrupt("too many bans"));
        }

        match self.phase {
            PhaseName::Rps => {
                if !self.bans.is_empty() || self.final_stage.is_some() {
                    return Err(corrupt("stage data before banning"));
                }
                Ok(SetPhase::Rps {
                    p1: self.p1_choice,
                    p2: self.p2_choice,
                })
            }
            PhaseName::Banning | PhaseName::Picked => {
                let (Some(a), Some(b)) = (self.p1_choice, self.p2_choice) else {
                    return Err(corrupt("banning without both throws"));
                };
                match (self.phase, self.final_stage) {
                    (PhaseName::Banning, None) => Ok(SetPhase::Banning {
                        rps: (a, b),
                        bans: self.bans.clone(),
                    }),
                    (PhaseName::Picked, Some(final_stage))
                        if self.bans.len() == TOTAL_BANS && !self.bans.contains(&final_stage) =>
                    {
                        Ok(SetPhase::Picked {
                            rps: (a, b),
                            bans: self.bans.clone(),
                            final_stage,
                        })
                    }
                    _ => Err(corrupt("final stage does not match phase")),
                }
            }
        }
    }

    /// Write a new machine state back into the stored fields.
    pub fn apply(&mut self, phase: SetPhase, now: &str) {
        match phase {
            SetPhase::Rps { p1, p2 } => {
                self.phase = PhaseName::Rps;
                self.p1_choice = p1;
                self.p2_choice = p2;
                self.bans.clear();
                self.final_stage = None;
            }
            SetPhase::Banning { rps, bans } => {
                self.phase = PhaseName::Banning;
                self.p1_choice = Some(rps.0);
                self.p2_choice = Some(rps.1);
                self.bans = bans;
                self.final_stage = None;
            }
            SetPhase::Picked {
                rps,
                bans,
                final_stage,
            } => {
                self.phase = PhaseName::Picked;
                self.p1_choice = Some(rps.0);
                self.p2_choice = Some(rps.1);
                self.bans = bans;
                self.final_stage = Some(final_stage);
            }
        }
        self.updated_at = now.to_string();
    }
}

/// Ban progress as shown on the set detail page.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct BanSummary {
    pub phase: PhaseName,
    pub stages_banned: Vec<Stage>,
    pub remaining_stages: Vec<Stage>,
    pub current_turn: String,
    pub rps_winner: Option<Side>,
    pub final_stage: Option<Stage>,
}

impl BanSummary {
    pub fn from_machine(phase_name: PhaseName, machine: &SetPhase) -> Self {
        Self {
            phase: phase_name,
            stages_banned: machine.bans().to_vec(),
            remaining_stages: machine.remaining_stages(),
            current_turn: machine.turn().label().to_string(),
            rps_winner: machine.rps_winner(),
            final_stage: match machine {
                SetPhase::Picked { final_stage, .. } => Some(*final_stage),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn banning() -> SetPhase {
        SetPhase::new()
            .throw(Side::P1, RpsChoice::Rock)
            .unwrap()
            .throw(Side::P2, RpsChoice::Scissors)
            .unwrap()
    }

    /// Apply the first `n` stages of the pool as bans in legal order.
    fn after_bans(n: usize) -> SetPhase {
        let mut phase = banning();
        for (i, stage) in Stage::ALL.into_iter().take(n).enumerate() {
            let side = if i < P1_BANS { Side::P1 } else { Side::P2 };
            phase = phase.select_stage(side, stage).unwrap();
        }
        phase
    }

    #[test]
    fn test_rps_moves_to_banning_after_both_throws() {
        let phase = SetPhase::new().throw(Side::P2, RpsChoice::Paper).unwrap();
        assert_eq!(phase.turn(), Turn::Rps);

        // A side may change its throw until the other side has thrown
        let phase = phase.throw(Side::P2, RpsChoice::Rock).unwrap();
        let phase = phase.throw(Side::P1, RpsChoice::Paper).unwrap();
        assert_eq!(phase.turn(), Turn::Ban(Side::P1));
        assert_eq!(phase.rps_winner(), Some(Side::P1));

        assert_eq!(
            phase.throw(Side::P1, RpsChoice::Rock),
            Err(TransitionError::RpsClosed)
        );
    }

    #[test]
    fn test_rps_tie_has_no_winner() {
        let phase = SetPhase::new()
            .throw(Side::P1, RpsChoice::Rock)
            .unwrap()
            .throw(Side::P2, RpsChoice::Rock)
            .unwrap();
        assert_eq!(phase.rps_winner(), None);
        assert_eq!(phase.turn(), Turn::Ban(Side::P1));
    }

    #[test]
    fn test_turn_depends_only_on_ban_count() {
        for n in 0..=TOTAL_BANS {
            let expected = if n < 3 {
                Turn::Ban(Side::P1)
            } else if n < 7 {
                Turn::Ban(Side::P2)
            } else {
                Turn::Pick(Side::P1)
            };
            assert_eq!(Turn::for_ban_count(n), expected, "bans = {}", n);
            assert_eq!(after_bans(n).turn(), expected, "bans = {}", n);
        }
    }

    #[test]
    fn test_wrong_side_cannot_ban() {
        assert_eq!(
            banning().select_stage(Side::P2, Stage::Battlefield),
            Err(TransitionError::NotYourTurnToBan)
        );
        assert_eq!(
            after_bans(3).select_stage(Side::P1, Stage::HollowBastion),
            Err(TransitionError::NotYourTurnToBan)
        );
    }

    #[test]
    fn test_duplicate_ban_rejected() {
        assert_eq!(
            after_bans(1).select_stage(Side::P1, Stage::ALL[0]),
            Err(TransitionError::AlreadyBanned)
        );
    }

    #[test]
    fn test_ban_before_rps_rejected() {
        assert_eq!(
            SetPhase::new().select_stage(Side::P1, Stage::Battlefield),
            Err(TransitionError::BanningNotActive)
        );
    }

    #[test]
    fn test_final_pick_rules() {
        let ready = after_bans(TOTAL_BANS);
        assert_eq!(ready.remaining_stages().len(), 2);

        // P2 may not pick
        assert_eq!(
            ready.clone().select_stage(Side::P2, Stage::HollowBastion),
            Err(TransitionError::NotYourTurnToPick)
        );
        // A banned stage may not be picked
        assert_eq!(
            ready.clone().select_stage(Side::P1, Stage::Battlefield),
            Err(TransitionError::AlreadyBanned)
        );

        let picked = ready
            .select_stage(Side::P1, Stage::KalosPokemonLeague)
            .unwrap();
        assert_eq!(picked.turn(), Turn::Games);

        // Nothing changes after the pick
        assert_eq!(
            picked.select_stage(Side::P1, Stage::HollowBastion),
            Err(TransitionError::FinalStageSelected)
        );
    }

    #[test]
    fn test_round_trip_through_stored_record() {
        let now = "2026-01-01T00:00:00Z";
        let mut state = SetState::new("123", 3, now);
        let phase = after_bans(TOTAL_BANS)
            .select_stage(Side::P1, Stage::HollowBastion)
            .unwrap();
        state.apply(phase.clone(), now);

        assert_eq!(state.phase, PhaseName::Picked);
        assert_eq!(state.final_stage, Some(Stage::HollowBastion));
        assert_eq!(state.machine().unwrap(), phase);
    }

    #[test]
    fn test_corrupt_records_rejected() {
        let now = "2026-01-01T00:00:00Z";
        let mut state = SetState::new("9", 3, now);
        state.phase = PhaseName::Banning;
        assert!(state.machine().is_err());

        state.p1_choice = Some(RpsChoice::Rock);
        state.p2_choice = Some(RpsChoice::Paper);
        state.bans = vec![Stage::Battlefield, Stage::Battlefield];
        assert!(state.machine().is_err());

        state.bans = vec![Stage::Battlefield];
        state.phase = PhaseName::Picked;
        state.final_stage = Some(Stage::Smashville);
        assert!(state.machine().is_err());
    }

    #[test]
    fn test_summary_labels() {
        let summary = BanSummary::from_machine(PhaseName::Banning, &after_bans(4));
        assert_eq!(summary.current_turn, "ban_p2");
        assert_eq!(summary.stages_banned.len(), 4);
        assert_eq!(summary.remaining_stages.len(), 5);
        assert_eq!(summary.rps_winner, Some(Side::P1));
    }

    #[test]
    fn test_wins_needed() {
        assert_eq!(wins_needed(3), 2);
        assert_eq!(wins_needed(5), 3);
    }
}
