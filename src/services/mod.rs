// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod admin;
pub mod cache;
pub mod kms;
pub mod reports;
pub mod startgg;

pub use cache::ResponseCache;
pub use kms::KmsService;
pub use startgg::{OAuthResult, StartggService};
