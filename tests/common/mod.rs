// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use portal_engagement::config::Config;
use portal_engagement::db::{ClaimWrite, FirestoreDb, MemoryStore, ProfileStore};
use portal_engagement::error::AppError;
use portal_engagement::models::{ProfilePatch, RewardState, TodoItem, UserProfile};
use portal_engagement::routes::create_router;
use portal_engagement::time_utils::Clock;
use portal_engagement::AppState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection against the emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Generate a unique uid for test isolation.
#[allow(dead_code)]
pub fn unique_uid(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Settable clock shared between a service and its store.
#[allow(dead_code)]
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

/// In-memory store with write counters, injectable failures and a claim gate.
#[allow(dead_code)]
pub struct ScriptedStore {
    inner: MemoryStore,
    pub claim_writes: AtomicUsize,
    pub item_writes: AtomicUsize,
    pub list_reads: AtomicUsize,
    pub fail_claims: AtomicBool,
    pub fail_item_writes: AtomicBool,
    pub fail_reads: AtomicBool,
    /// When set, `apply_claim` waits for a permit before writing.
    claim_gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl ScriptedStore {
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: MemoryStore::with_clock(clock),
            claim_writes: AtomicUsize::new(0),
            item_writes: AtomicUsize::new(0),
            list_reads: AtomicUsize::new(0),
            fail_claims: AtomicBool::new(false),
            fail_item_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            claim_gate: None,
        }
    }

    /// Store whose claims block until the returned semaphore gets a permit.
    pub fn gated(clock: Clock) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut store = Self::new(clock);
        store.claim_gate = Some(gate.clone());
        (store, gate)
    }

    pub fn claim_write_count(&self) -> usize {
        self.claim_writes.load(Ordering::SeqCst)
    }

    pub fn item_write_count(&self) -> usize {
        self.item_writes.load(Ordering::SeqCst)
    }

    pub fn list_read_count(&self) -> usize {
        self.list_reads.load(Ordering::SeqCst)
    }

    fn transient(&self, flag: &AtomicBool, what: &str) -> Result<(), AppError> {
        if flag.load(Ordering::SeqCst) {
            return Err(AppError::Database(format!("injected {} failure", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for ScriptedStore {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.transient(&self.fail_reads, "read")?;
        self.inner.get_profile(uid).await
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<UserProfile, AppError> {
        self.inner.create_profile(profile).await
    }

    async fn update_profile(&self, uid: &str, patch: &ProfilePatch) -> Result<(), AppError> {
        self.inner.update_profile(uid, patch).await
    }

    async fn apply_claim(&self, uid: &str, claim: &ClaimWrite) -> Result<RewardState, AppError> {
        self.claim_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.claim_gate {
            gate.acquire().await.unwrap().forget();
        }
        self.transient(&self.fail_claims, "claim")?;
        self.inner.apply_claim(uid, claim).await
    }

    async fn list_items(&self, owner_id: &str) -> Result<Vec<TodoItem>, AppError> {
        self.list_reads.fetch_add(1, Ordering::SeqCst);
        self.transient(&self.fail_reads, "read")?;
        self.inner.list_items(owner_id).await
    }

    async fn add_list_item(&self, owner_id: &str, text: &str) -> Result<TodoItem, AppError> {
        self.item_writes.fetch_add(1, Ordering::SeqCst);
        self.transient(&self.fail_item_writes, "add")?;
        self.inner.add_list_item(owner_id, text).await
    }

    async fn update_list_item(
        &self,
        owner_id: &str,
        item_id: &str,
        completed: bool,
    ) -> Result<(), AppError> {
        self.item_writes.fetch_add(1, Ordering::SeqCst);
        self.transient(&self.fail_item_writes, "update")?;
        self.inner
            .update_list_item(owner_id, item_id, completed)
            .await
    }

    async fn delete_list_item(&self, owner_id: &str, item_id: &str) -> Result<(), AppError> {
        self.item_writes.fetch_add(1, Ordering::SeqCst);
        self.transient(&self.fail_item_writes, "delete")?;
        self.inner.delete_list_item(owner_id, item_id).await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.inner.health_check().await
    }
}

/// Create a test app over the given store and clock.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(store: Arc<dyn ProfileStore>, clock: Clock) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::test_default(), store, clock));
    (create_router(state.clone()), state)
}
