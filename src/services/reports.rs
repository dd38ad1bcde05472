// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report submission rules and the start.gg payload built on approval.

use crate::models::set_state::wins_needed;
use crate::models::{character, Game, Report, Side, Stage};
use crate::services::startgg::types::{GameDataInput, SelectionInput};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

/// One game as submitted by a competitor or an admin edit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GameInput {
    #[validate(range(min = 1))]
    pub index: u32,
    pub stage: String,
    pub winner: Side,
    #[validate(range(max = 3))]
    pub stocks_p1: Option<u8>,
    #[validate(range(max = 3))]
    pub stocks_p2: Option<u8>,
    pub character_p1: Option<String>,
    pub character_p2: Option<String>,
}

/// Body of `POST /api/sets/{id}/submit` and `PUT /api/admin/reports/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GamesPayload {
    #[validate(length(min = 1), nested)]
    pub games: Vec<GameInput>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Check games against the set rules. Returns one message per problem.
///
/// Stocks are only checked when at least one side's count is given; a
/// missing count next to a given one is treated as invalid.
///
/// Games are stored one document per index, so indices must be distinct
/// and run from 1 to the number of games.
pub fn validate_games(games: &[GameInput], best_of: u8) -> Vec<String> {
    let mut errors = Vec::new();
    let needed = u32::from(wins_needed(best_of));
    let (mut score_p1, mut score_p2) = (0u32, 0u32);
    let mut seen = HashSet::with_capacity(games.len());

    for game in games {
        let i = game.index;

        if !seen.insert(i) {
            errors.push(format!("Game {}: duplicate game index", i));
        }

        if game.stage.parse::<Stage>().is_err() {
            errors.push(format!("Game {}: Invalid stage '{}'", i, game.stage));
        }

        if !has_text(&game.character_p1) || !has_text(&game.character_p2) {
            errors.push(format!("Game {}: Missing character selection", i));
        }

        let stocks_given = game.stocks_p1.is_some() || game.stocks_p2.is_some();
        let (winner_stocks, loser_stocks) = match game.winner {
            Side::P1 => {
                score_p1 += 1;
                (game.stocks_p1, game.stocks_p2)
            }
            Side::P2 => {
                score_p2 += 1;
                (game.stocks_p2, game.stocks_p1)
            }
        };

        if stocks_given {
            let (winner, loser) = match game.winner {
                Side::P1 => ("P1", "P2"),
                Side::P2 => ("P2", "P1"),
            };
            if loser_stocks != Some(0) {
                errors.push(format!(
                    "Game {}: {} must have 0 stocks when {} wins",
                    i, loser, winner
                ));
            }
            if !matches!(winner_stocks, Some(1..=3)) {
                errors.push(format!(
                    "Game {}: {} stocks must be between 1-3",
                    i, winner
                ));
            }
        }
    }

    let expected: HashSet<u32> = (1..).take(games.len()).collect();
    if seen.len() == games.len() && seen != expected {
        errors.push(format!("Games must be numbered 1 to {}", games.len()));
    }

    if score_p1 < needed && score_p2 < needed {
        errors.push(format!(
            "Not enough games won. Best of {} requires {} wins",
            best_of, needed
        ));
    }

    if games.len() > usize::from(best_of) {
        errors.push(format!(
            "Too many games. Best of {} allows maximum {} games",
            best_of, best_of
        ));
    }

    errors
}

/// Convert validated input into stored games for `report_id`.
pub fn to_games(report_id: &str, games: &[GameInput]) -> Vec<Game> {
    games
        .iter()
        .map(|g| Game {
            report_id: report_id.to_string(),
            index: g.index,
            stage: g.stage.parse().ok(),
            winner: g.winner,
            stocks_p1: g.stocks_p1,
            stocks_p2: g.stocks_p2,
            character_p1: g.character_p1.clone(),
            character_p2: g.character_p2.clone(),
        })
        .collect()
}

/// `gameData` for `reportBracketSet`.
///
/// Per-game entries carry stage, character selections and, when both are
/// known, stock counts. Without stored games the aggregate score is spelled
/// out as P1's wins followed by P2's; with no score at all a single game won
/// by the set winner is sent.
pub fn build_game_data(report: &Report, games: &[Game]) -> Vec<GameDataInput> {
    let entrant = |side: Side| match side {
        Side::P1 => report.p1.entrant_id.clone(),
        Side::P2 => report.p2.entrant_id.clone(),
    };

    let mut sorted: Vec<&Game> = games.iter().collect();
    sorted.sort_by_key(|g| g.index);

    let mut data: Vec<GameDataInput> = sorted
        .into_iter()
        .map(|game| {
            let selections = [
                (Side::P1, game.character_p1.as_deref()),
                (Side::P2, game.character_p2.as_deref()),
            ]
            .into_iter()
            .filter_map(|(side, slug)| {
                let character_id = character::startgg_character_id(slug?)?;
                Some(SelectionInput {
                    entrant_id: entrant(side),
                    character_id,
                })
            })
            .collect();

            let (entrant1_score, entrant2_score) = match (game.stocks_p1, game.stocks_p2) {
                (Some(p1), Some(p2)) => (Some(p1), Some(p2)),
                _ => (None, None),
            };

            GameDataInput {
                winner_id: entrant(game.winner),
                game_num: game.index,
                stage_id: game.stage.map(Stage::startgg_id),
                selections: Some(selections),
                entrant1_score,
                entrant2_score,
            }
        })
        .collect();

    if data.is_empty() {
        let aggregate = std::iter::repeat(Side::P1)
            .take(report.score_p1 as usize)
            .chain(std::iter::repeat(Side::P2).take(report.score_p2 as usize));
        data = aggregate
            .zip(1u32..)
            .map(|(side, game_num)| GameDataInput {
                winner_id: entrant(side),
                game_num,
                stage_id: None,
                selections: None,
                entrant1_score: None,
                entrant2_score: None,
            })
            .collect();
    }

    if data.is_empty() {
        data.push(GameDataInput {
            winner_id: report.winner_entrant_id().to_string(),
            game_num: 1,
            stage_id: None,
            selections: None,
            entrant1_score: None,
            entrant2_score: None,
        });
    }

    data
}

/// Flatten `validator` errors into `field: code` messages.
pub fn validation_messages(errors: &validator::ValidationErrors) -> Vec<String> {
    fn walk(prefix: &str, errors: &validator::ValidationErrors, out: &mut Vec<String>) {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{}.{}", prefix, field)
            };
            match kind {
                validator::ValidationErrorsKind::Field(errs) => {
                    for e in errs {
                        let detail = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        out.push(format!("{}: {}", path, detail));
                    }
                }
                validator::ValidationErrorsKind::Struct(inner) => walk(&path, inner, out),
                validator::ValidationErrorsKind::List(items) => {
                    for (idx, inner) in items {
                        walk(&format!("{}.{}", path, idx), inner, out);
                    }
                }
            }
        }
    }

    let mut out = Vec::new();
    walk("", errors, &mut out);
    out.sort();
    out
}
