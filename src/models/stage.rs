// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Legal stage list and start.gg stage ids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A stage from the tournament's legal stage list.
///
/// Serialized with its display name, which is also what clients send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Stage {
    #[serde(rename = "Battlefield")]
    Battlefield,
    #[serde(rename = "Small Battlefield")]
    SmallBattlefield,
    #[serde(rename = "Final Destination")]
    FinalDestination,
    #[serde(rename = "Smashville")]
    Smashville,
    #[serde(rename = "Pokemon Stadium 2")]
    PokemonStadium2,
    #[serde(rename = "Town and City")]
    TownAndCity,
    #[serde(rename = "Yoshi's Story")]
    YoshisStory,
    #[serde(rename = "Hollow Bastion")]
    HollowBastion,
    #[serde(rename = "Kalos Pokemon League")]
    KalosPokemonLeague,
}

impl Stage {
    /// Full stage pool, in display order.
    pub const ALL: [Stage; 9] = [
        Stage::Battlefield,
        Stage::SmallBattlefield,
        Stage::FinalDestination,
        Stage::Smashville,
        Stage::PokemonStadium2,
        Stage::TownAndCity,
        Stage::YoshisStory,
        Stage::HollowBastion,
        Stage::KalosPokemonLeague,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Battlefield => "Battlefield",
            Stage::SmallBattlefield => "Small Battlefield",
            Stage::FinalDestination => "Final Destination",
            Stage::Smashville => "Smashville",
            Stage::PokemonStadium2 => "Pokemon Stadium 2",
            Stage::TownAndCity => "Town and City",
            Stage::YoshisStory => "Yoshi's Story",
            Stage::HollowBastion => "Hollow Bastion",
            Stage::KalosPokemonLeague => "Kalos Pokemon League",
        }
    }

    /// start.gg stage id for Super Smash Bros. Ultimate.
    pub fn startgg_id(self) -> u32 {
        match self {
            Stage::Battlefield => 311,
            Stage::SmallBattlefield => 484,
            Stage::FinalDestination => 328,
            Stage::Smashville => 387,
            Stage::PokemonStadium2 => 378,
            Stage::TownAndCity => 397,
            Stage::YoshisStory => 407,
            Stage::HollowBastion => 513,
            Stage::KalosPokemonLeague => 348,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for a stage name outside the legal list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid stage '{0}'")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}
