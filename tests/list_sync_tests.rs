// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live list subscriptions and list mutations.

use chrono::{Duration, TimeZone, Utc};
use portal_engagement::models::{Identity, ListSnapshot};
use portal_engagement::services::list_sync::MIN_REFRESH_INTERVAL;
use portal_engagement::services::{ListSubscription, ListSyncService, SubscriptionState};
use std::sync::atomic::Ordering;
use std::sync::Arc;

mod common;
use common::{ManualClock, ScriptedStore};

const WAIT: std::time::Duration = std::time::Duration::from_secs(2);
const QUIET: std::time::Duration = std::time::Duration::from_millis(150);

fn setup() -> (Arc<ScriptedStore>, ListSyncService, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
    let store = Arc::new(ScriptedStore::new(clock.clock()));
    let service = ListSyncService::new(store.clone(), std::time::Duration::from_secs(30));
    (store, service, clock)
}

async fn next_snapshot(subscription: &mut ListSubscription) -> ListSnapshot {
    tokio::time::timeout(WAIT, subscription.next())
        .await
        .expect("timed out waiting for snapshot")
        .expect("subscription ended unexpectedly")
}

fn texts(snapshot: &ListSnapshot) -> Vec<&str> {
    snapshot.items.iter().map(|i| i.text.as_str()).collect()
}

#[tokio::test]
async fn test_initial_snapshot_then_live() {
    let (_store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");

    let mut subscription = service.subscribe(&identity);
    assert_eq!(subscription.state(), SubscriptionState::Subscribing);

    let first = next_snapshot(&mut subscription).await;
    assert!(first.items.is_empty());
    assert_eq!(first.revision, 1);

    // State flips to Live right after the first delivery.
    tokio::task::yield_now().await;
    assert_eq!(subscription.state(), SubscriptionState::Live);
}

#[tokio::test]
async fn test_snapshots_are_newest_first() {
    let (_store, service, clock) = setup();
    let identity = Identity::from_uid("u1");

    for text in ["t1", "t2", "t3"] {
        service.add_item(&identity, text).await.unwrap();
        clock.advance(Duration::seconds(1));
    }

    let mut subscription = service.subscribe(&identity);
    let snapshot = next_snapshot(&mut subscription).await;

    assert_eq!(texts(&snapshot), ["t3", "t2", "t1"]);
    assert!(snapshot
        .items
        .windows(2)
        .all(|w| w[0].created_at > w[1].created_at));
}

#[tokio::test]
async fn test_mutations_arrive_as_full_snapshots() {
    let (_store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");
    let mut subscription = service.subscribe(&identity);
    next_snapshot(&mut subscription).await;

    let item = service
        .add_item(&identity, "  box of screws  ")
        .await
        .unwrap()
        .expect("item should be created");
    assert_eq!(item.text, "box of screws");
    assert!(!item.completed);

    let added = next_snapshot(&mut subscription).await;
    assert_eq!(texts(&added), ["box of screws"]);

    service.toggle_item(&identity, &item.id, false).await.unwrap();
    let toggled = next_snapshot(&mut subscription).await;
    assert!(toggled.items[0].completed);
    assert!(toggled.revision > added.revision);

    service.delete_item(&identity, &item.id).await.unwrap();
    let deleted = next_snapshot(&mut subscription).await;
    assert!(deleted.items.is_empty());
    assert_eq!(subscription.latest(), Some(&deleted));
}

#[tokio::test]
async fn test_blank_text_is_silently_ignored() {
    let (store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");

    let result = service.add_item(&identity, "   ").await;

    assert!(matches!(result, Ok(None)));
    assert_eq!(store.item_write_count(), 0);
}

#[tokio::test]
async fn test_overlong_text_rejected() {
    let (store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");

    let text = "x".repeat(501);
    assert!(service.add_item(&identity, &text).await.is_err());
    assert_eq!(store.item_write_count(), 0);
}

#[tokio::test]
async fn test_failed_delete_leaves_snapshot_untouched() {
    let (store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");
    let keep = service.add_item(&identity, "lumber").await.unwrap().unwrap();

    let mut subscription = service.subscribe(&identity);
    let before = next_snapshot(&mut subscription).await;
    assert_eq!(texts(&before), ["lumber"]);

    store.fail_item_writes.store(true, Ordering::SeqCst);
    let err = service.delete_item(&identity, &keep.id).await.unwrap_err();
    assert!(err.is_retryable());

    assert_eq!(subscription.latest(), Some(&before));
    assert!(
        tokio::time::timeout(QUIET, subscription.next()).await.is_err(),
        "no snapshot should follow a failed write"
    );
    assert_eq!(subscription.latest(), Some(&before));

    // Retrying after recovery succeeds.
    store.fail_item_writes.store(false, Ordering::SeqCst);
    service.delete_item(&identity, &keep.id).await.unwrap();
    assert!(next_snapshot(&mut subscription).await.items.is_empty());
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent_and_final() {
    let (_store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");
    let mut subscription = service.subscribe(&identity);
    next_snapshot(&mut subscription).await;

    subscription.unsubscribe();
    subscription.unsubscribe();
    assert_eq!(subscription.state(), SubscriptionState::Unsubscribed);

    service.add_item(&identity, "after teardown").await.unwrap();
    let next = tokio::time::timeout(WAIT, subscription.next())
        .await
        .expect("next() should return promptly after unsubscribe");
    assert!(next.is_none());
}

#[tokio::test]
async fn test_sign_out_closes_only_that_session() {
    let (_store, service, _clock) = setup();
    let laptop = Identity::from_uid("alice").in_session("laptop");
    let phone = Identity::from_uid("alice").in_session("phone");
    let bob = Identity::from_uid("bob").in_session("desk");

    let mut laptop_sub = service.subscribe(&laptop);
    let mut phone_sub = service.subscribe(&phone);
    let mut bob_sub = service.subscribe(&bob);
    next_snapshot(&mut laptop_sub).await;
    next_snapshot(&mut phone_sub).await;
    next_snapshot(&mut bob_sub).await;

    service.close_session(&laptop);
    service.close_session(&laptop);

    assert_eq!(laptop_sub.state(), SubscriptionState::Unsubscribed);
    assert!(laptop_sub.next().await.is_none());

    // The phone keeps receiving the shared list.
    service.add_item(&phone, "hammer").await.unwrap();
    assert_eq!(texts(&next_snapshot(&mut phone_sub).await), ["hammer"]);
    assert_ne!(phone_sub.state(), SubscriptionState::Unsubscribed);
    assert!(tokio::time::timeout(QUIET, bob_sub.next()).await.is_err());

    // Signing in again on the laptop gets a working subscription.
    let mut laptop_again = service.subscribe(&laptop);
    assert_eq!(texts(&next_snapshot(&mut laptop_again).await), ["hammer"]);
}

#[test]
fn test_zero_refresh_interval_is_clamped() {
    let clock = ManualClock::new(Utc::now());
    let store = Arc::new(ScriptedStore::new(clock.clock()));
    let service = ListSyncService::new(store, std::time::Duration::ZERO);
    assert_eq!(service.refresh_interval(), MIN_REFRESH_INTERVAL);
}

#[tokio::test]
async fn test_zero_refresh_interval_still_delivers() {
    let clock = ManualClock::new(Utc::now());
    let store = Arc::new(ScriptedStore::new(clock.clock()));
    let service = ListSyncService::new(store, std::time::Duration::ZERO);
    let mut subscription = service.subscribe(&Identity::from_uid("u1"));
    assert!(next_snapshot(&mut subscription).await.items.is_empty());
}

#[tokio::test]
async fn test_subscriptions_are_scoped_to_identity() {
    let (_store, service, _clock) = setup();
    let alice = Identity::from_uid("alice");
    let bob = Identity::from_uid("bob");

    let mut bob_sub = service.subscribe(&bob);
    next_snapshot(&mut bob_sub).await;

    let item = service.add_item(&alice, "alice only").await.unwrap().unwrap();
    assert!(tokio::time::timeout(QUIET, bob_sub.next()).await.is_err());

    assert!(service.delete_item(&bob, &item.id).await.is_err());
    assert_eq!(service.snapshot(&alice).await.unwrap().items.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_picks_up_external_writes() {
    let (store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");
    let mut subscription = service.subscribe(&identity);
    next_snapshot(&mut subscription).await;

    // Written straight to the store, as another instance would.
    use portal_engagement::db::ProfileStore;
    store.add_list_item("u1", "from elsewhere").await.unwrap();

    tokio::time::advance(std::time::Duration::from_secs(31)).await;
    let refreshed = next_snapshot(&mut subscription).await;
    assert_eq!(texts(&refreshed), ["from elsewhere"]);
}

#[tokio::test]
async fn test_store_errors_keep_subscription_live() {
    let (store, service, _clock) = setup();
    let identity = Identity::from_uid("u1");
    let mut subscription = service.subscribe(&identity);
    next_snapshot(&mut subscription).await;

    store.fail_reads.store(true, Ordering::SeqCst);
    service.add_item(&identity, "nails").await.unwrap();
    assert!(tokio::time::timeout(QUIET, subscription.next()).await.is_err());
    assert_ne!(subscription.state(), SubscriptionState::Unsubscribed);

    store.fail_reads.store(false, Ordering::SeqCst);
    service.add_item(&identity, "glue").await.unwrap();
    assert_eq!(
        texts(&next_snapshot(&mut subscription).await),
        ["glue", "nails"]
    );
}
