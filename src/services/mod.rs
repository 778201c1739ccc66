// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod engagement;
pub mod list_sync;

pub use engagement::{ClaimStatus, EngagementService};
pub use list_sync::{ListSubscription, ListSyncService, SubscriptionState};
