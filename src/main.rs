// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Portal engagement API server
//!
//! Serves the dashboard's daily reward claim and live to-do list.

use portal_engagement::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, ProfileStore},
    time_utils::system_clock,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        "Starting portal engagement API"
    );

    let store: Arc<dyn ProfileStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory profile store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Firestore => match FirestoreDb::new(&config.gcp_project_id).await {
            Ok(db) => Arc::new(db),
            Err(e) => {
                // Keep serving so the dashboard can show the feature-disabled state.
                tracing::error!(error = %e, "Firestore unavailable, engagement features disabled");
                Arc::new(FirestoreDb::new_offline())
            }
        },
    };

    let state = Arc::new(AppState::new(config.clone(), store, system_clock()));

    // Build router
    let app = portal_engagement::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("portal_engagement=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
