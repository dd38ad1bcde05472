// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! start.gg integration: GraphQL client, token lifecycle and response mapping.

pub mod client;
pub mod queries;
pub mod service;
pub mod types;

pub use client::{StartggClient, TokenResponse};
pub use service::{CachedToken, OAuthError, OAuthResult, RefreshLocks, RefreshOutcome, StartggService, TokenCache};
