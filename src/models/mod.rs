// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod character;
pub mod draft;
pub mod report;
pub mod set_state;
pub mod side;
pub mod stage;
pub mod user;

pub use draft::{DraftView, SetDraft};
pub use report::{Game, LifecycleError, Report, ReportParticipant, ReportStatus, ReportWithGames};
pub use set_state::{BanSummary, RpsChoice, SetPhase, SetState, Turn};
pub use side::Side;
pub use stage::Stage;
pub use user::{Role, User, UserProfile, UserTokens};
