// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live, ordered view of a user's to-do list.
//!
//! Each subscription runs a background task that re-reads the whole list
//! whenever a change is signalled and delivers it as a complete snapshot.
//! Consumers replace their view wholesale; nothing is patched incrementally.
//!
//! Change signals come from:
//! - every successful mutation made through this service
//! - a periodic refresh, which picks up writes made by other instances
//!
//! Mutations never touch delivered snapshots. A failed write leaves every
//! view exactly as the store last reported it.

use crate::db::ProfileStore;
use crate::error::AppError;
use crate::models::todo::{normalize_text, MAX_TODO_TEXT_LEN};
use crate::models::{Identity, ListSnapshot, TodoItem};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Snapshots buffered per subscription before the producer waits.
const SNAPSHOT_BUFFER: usize = 8;

/// Shortest periodic refresh; `tokio::time::interval` rejects a zero period.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Live,
}

/// Session key for identities that carry no session ID.
const NO_SESSION: &str = "";

/// Per-identity change channel shared by all of that identity's subscriptions.
struct UserChannel {
    /// Bumped after every successful mutation
    changes: watch::Sender<u64>,
    /// Parent token per session, cancelled when that session signs out
    sessions: DashMap<String, CancellationToken>,
}

impl UserChannel {
    fn session_token(&self, session_id: &str) -> CancellationToken {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }
}

/// Maintains live list views and applies list mutations.
#[derive(Clone)]
pub struct ListSyncService {
    store: Arc<dyn ProfileStore>,
    channels: Arc<DashMap<String, Arc<UserChannel>>>,
    refresh_interval: Duration,
}

impl ListSyncService {
    /// Intervals below [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub fn new(store: Arc<dyn ProfileStore>, refresh_interval: Duration) -> Self {
        Self {
            store,
            channels: Arc::new(DashMap::new()),
            refresh_interval: refresh_interval.max(MIN_REFRESH_INTERVAL),
        }
    }

    /// Effective periodic refresh interval.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn channel(&self, uid: &str) -> Arc<UserChannel> {
        self.channels
            .entry(uid.to_string())
            .or_insert_with(|| {
                let (changes, _) = watch::channel(0);
                Arc::new(UserChannel {
                    changes,
                    sessions: DashMap::new(),
                })
            })
            .clone()
    }

    /// Wake every live subscription for `uid`.
    fn notify(&self, uid: &str) {
        if let Some(channel) = self.channels.get(uid) {
            channel.changes.send_modify(|v| *v = v.wrapping_add(1));
        }
    }

    /// Start a live view of the identity's list, newest first.
    ///
    /// The first snapshot is delivered as soon as the initial read completes.
    pub fn subscribe(&self, identity: &Identity) -> ListSubscription {
        let uid = identity.uid.clone();
        let channel = self.channel(&uid);
        let session_id = identity.session_id.as_deref().unwrap_or(NO_SESSION);
        let cancel = channel.session_token(session_id).child_token();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let (state_tx, state_rx) = watch::channel(SubscriptionState::Subscribing);

        let task = SubscriptionTask {
            store: self.store.clone(),
            uid: uid.clone(),
            changes: channel.changes.subscribe(),
            refresh_interval: self.refresh_interval,
            cancel: cancel.clone(),
            state: state_tx,
            snapshots: tx,
        };
        tokio::spawn(task.run());

        tracing::debug!(uid = %uid, "List subscription started");

        ListSubscription {
            uid,
            snapshots: rx,
            state: state_rx,
            cancel,
            latest: None,
        }
    }

    /// Tear down every subscription opened under the identity's session
    /// (sign-out). Other sessions of the same user stay live.
    pub fn close_session(&self, identity: &Identity) {
        let session_id = identity.session_id.as_deref().unwrap_or(NO_SESSION);
        let Some(channel) = self.channels.get(&identity.uid).map(|c| Arc::clone(c.value())) else {
            return;
        };
        if let Some((_, token)) = channel.sessions.remove(session_id) {
            token.cancel();
            tracing::debug!(uid = %identity.uid, session_id, "List subscriptions closed");
        }
    }

    /// One-off read of the current list.
    pub async fn snapshot(&self, identity: &Identity) -> Result<ListSnapshot, AppError> {
        let items = self.store.list_items(&identity.uid).await?;
        Ok(ListSnapshot { items, revision: 0 })
    }

    /// Add an item. Text that is empty after trimming is ignored (`Ok(None)`)
    /// without touching the store.
    pub async fn add_item(
        &self,
        identity: &Identity,
        text: &str,
    ) -> Result<Option<TodoItem>, AppError> {
        let Some(text) = normalize_text(text) else {
            tracing::debug!(uid = %identity.uid, "Ignoring empty list item");
            return Ok(None);
        };
        if text.chars().count() > MAX_TODO_TEXT_LEN {
            return Err(AppError::BadRequest(format!(
                "Item text exceeds {} characters",
                MAX_TODO_TEXT_LEN
            )));
        }

        let item = self
            .store
            .add_list_item(&identity.uid, text)
            .await
            .map_err(|e| {
                tracing::warn!(uid = %identity.uid, error = %e, "Failed to add list item");
                e
            })?;
        self.notify(&identity.uid);
        Ok(Some(item))
    }

    /// Flip an item's completion flag from `current_completed`.
    pub async fn toggle_item(
        &self,
        identity: &Identity,
        item_id: &str,
        current_completed: bool,
    ) -> Result<(), AppError> {
        self.store
            .update_list_item(&identity.uid, item_id, !current_completed)
            .await
            .map_err(|e| {
                tracing::warn!(uid = %identity.uid, item_id, error = %e, "Failed to toggle list item");
                e
            })?;
        self.notify(&identity.uid);
        Ok(())
    }

    pub async fn delete_item(&self, identity: &Identity, item_id: &str) -> Result<(), AppError> {
        self.store
            .delete_list_item(&identity.uid, item_id)
            .await
            .map_err(|e| {
                tracing::warn!(uid = %identity.uid, item_id, error = %e, "Failed to delete list item");
                e
            })?;
        self.notify(&identity.uid);
        Ok(())
    }
}

/// Background producer for one subscription.
struct SubscriptionTask {
    store: Arc<dyn ProfileStore>,
    uid: String,
    changes: watch::Receiver<u64>,
    refresh_interval: Duration,
    cancel: CancellationToken,
    state: watch::Sender<SubscriptionState>,
    snapshots: mpsc::Sender<ListSnapshot>,
}

impl SubscriptionTask {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut revision = 0u64;
        let mut last_items: Option<Vec<TodoItem>> = None;

        loop {
            // The first tick completes immediately and performs the initial read.
            let forced = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = self.changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    true
                }
                _ = ticker.tick() => false,
            };

            let items = match self.store.list_items(&self.uid).await {
                Ok(items) => items,
                Err(e) => {
                    // Stay live; the next signal or tick retries the read.
                    tracing::warn!(uid = %self.uid, error = %e, "List refresh failed");
                    continue;
                }
            };

            // Periodic refreshes only publish when something actually changed.
            if !forced && last_items.as_ref() == Some(&items) {
                continue;
            }

            revision += 1;
            last_items = Some(items.clone());
            let snapshot = ListSnapshot { items, revision };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                sent = self.snapshots.send(snapshot) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
            self.state.send_replace(SubscriptionState::Live);
        }

        self.state.send_replace(SubscriptionState::Unsubscribed);
        tracing::debug!(uid = %self.uid, revision, "List subscription ended");
    }
}

/// Consumer side of a live list view.
///
/// Dropping the subscription tears it down.
pub struct ListSubscription {
    uid: String,
    snapshots: mpsc::Receiver<ListSnapshot>,
    state: watch::Receiver<SubscriptionState>,
    cancel: CancellationToken,
    latest: Option<ListSnapshot>,
}

impl ListSubscription {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn state(&self) -> SubscriptionState {
        if self.cancel.is_cancelled() {
            return SubscriptionState::Unsubscribed;
        }
        *self.state.borrow()
    }

    /// Most recent snapshot delivered through [`ListSubscription::next`].
    pub fn latest(&self) -> Option<&ListSnapshot> {
        self.latest.as_ref()
    }

    /// Wait for the next snapshot. Returns `None` once unsubscribed.
    pub async fn next(&mut self) -> Option<ListSnapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let snapshot = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            snapshot = self.snapshots.recv() => snapshot,
        }?;
        self.latest = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Stop further snapshots. Safe to call any number of times.
    pub fn unsubscribe(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.snapshots.close();
        tracing::debug!(uid = %self.uid, "List subscription cancelled");
    }
}

impl Drop for ListSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
