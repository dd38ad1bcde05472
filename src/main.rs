// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! start.gg manager API server
//!
//! Runs stage bans and set reporting for offline Smash Ultimate brackets,
//! relaying admin-approved results to start.gg.

use startgg_manager::{
    config::Config,
    db::FirestoreDb,
    services::{KmsService, ResponseCache, StartggService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting start.gg manager API");

    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        "token-encryption",
    )
    .await?;
    tracing::info!("KMS service initialized");

    // Shared by every request served by this instance
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    let startgg = StartggService::new(&config, db.clone(), kms, token_cache, refresh_locks);
    if config.startgg_app_token.is_none() {
        tracing::warn!("STARTGG_APP_TOKEN not set; admin checks rely on user tokens only");
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        startgg,
        cache: ResponseCache::new(),
        used_oauth_codes: Arc::new(dashmap::DashMap::new()),
        set_locks: Arc::new(dashmap::DashMap::new()),
    });

    let app = startgg_manager::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("startgg_manager=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
