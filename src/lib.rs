// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Portal engagement backend.
//!
//! This crate provides the dashboard API for the customer portal: the
//! daily reward claim (coins and engagement score) and a live-synchronized
//! per-user to-do list, both backed by a document store.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ProfileStore;
use services::{EngagementService, ListSyncService};
use std::sync::Arc;
use std::time::Duration;
use time_utils::Clock;

/// Shared application state.
///
/// Built once at startup and handed to every request; nothing in the crate
/// reads session or store state from globals.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProfileStore>,
    pub engagement: EngagementService,
    pub lists: ListSyncService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn ProfileStore>, clock: Clock) -> Self {
        let engagement = EngagementService::new(store.clone(), clock);
        let lists = ListSyncService::new(
            store.clone(),
            Duration::from_secs(config.list_refresh_secs),
        );
        Self {
            config,
            store,
            engagement,
            lists,
        }
    }
}
