// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listener lifecycle tests against the fault-injecting store.

use std::sync::Arc;

use chatline_core::{ChatlineError, SessionId, SessionStore, VisitorId};
use chatline_sync::ListenerManager;
use chatline_test_utils::{FlakyStore, RecordingObserver, TestHarness};

async fn session(store: &FlakyStore, visitor: &str) -> SessionId {
    store
        .inner()
        .create_or_get_session(&VisitorId::from(visitor), "Visitor")
        .await
        .unwrap()
        .session_id
}

/// Two tabs subscribing at the same time share one remote subscription.
#[tokio::test]
async fn concurrent_subscribes_open_one_subscription() {
    let store = Arc::new(FlakyStore::new());
    let sid = session(&store, "v1").await;
    store.set_yielding(true);
    let observer = Arc::new(RecordingObserver::new());
    let listeners = ListenerManager::new(store.clone(), observer.clone());

    let (first, second) = tokio::join!(listeners.subscribe(&sid), listeners.subscribe(&sid));
    let (first, second) = (first.unwrap(), second.unwrap());

    assert!(first.same_as(&second));
    assert_eq!(store.subscribe_count(), 1);
    assert_eq!(store.inner().subscriber_count(&sid), 1);
    assert_eq!(listeners.live_count(), 1);
    assert_eq!(observer.snapshot_count(), 1);
}

/// Unsubscribing while the connect is in flight tears the late subscription down.
#[tokio::test]
async fn late_connect_after_unsubscribe_is_torn_down() {
    let store = Arc::new(FlakyStore::new());
    let sid = session(&store, "v1").await;
    store.set_yielding(true);
    let observer = Arc::new(RecordingObserver::new());
    let listeners = ListenerManager::new(store.clone(), observer.clone());

    let (subscription, removed) = tokio::join!(listeners.subscribe(&sid), async {
        listeners.unsubscribe(&sid)
    });

    assert!(removed);
    let subscription = subscription.unwrap();
    assert!(!subscription.is_active());
    assert_eq!(store.inner().subscriber_count(&sid), 0);
    assert_eq!(listeners.live_count(), 0);
    assert_eq!(observer.snapshot_count(), 0);
}

/// A failed subscribe leaves no entry behind, so a later call can retry.
#[tokio::test]
async fn failed_subscribe_can_be_retried() {
    let store = Arc::new(FlakyStore::new());
    let sid = session(&store, "v1").await;
    let listeners = ListenerManager::new(store.clone(), Arc::new(RecordingObserver::new()));

    store.fail_subscribes(true);
    let err = listeners.subscribe(&sid).await.unwrap_err();
    assert!(matches!(err, ChatlineError::RemoteUnavailable { .. }));
    assert!(!listeners.is_subscribed(&sid));

    store.fail_subscribes(false);
    listeners.subscribe(&sid).await.unwrap();
    assert!(listeners.is_subscribed(&sid));
    assert_eq!(store.subscribe_count(), 2);
}

/// Activating twice keeps a single subscription; a dropped connection is
/// recovered by the next activation.
#[tokio::test]
async fn client_keeps_one_subscription_and_recovers_from_drop() {
    let harness = TestHarness::builder()
        .with_visitor_id("visitor-d")
        .build()
        .unwrap();
    harness.activate().await.unwrap();
    harness.activate().await.unwrap();
    let sid = harness.session_id().unwrap();
    assert_eq!(harness.store.subscribe_count(), 1);
    assert_eq!(harness.client.listeners().live_count(), 1);

    harness.operator_reply("hello").await.unwrap();
    assert_eq!(harness.client.merged_messages().len(), 1);

    assert_eq!(harness.store.drop_subscriptions(&sid), 1);
    assert!(!harness.client.listeners().is_subscribed(&sid));
    assert!(harness.client.merged_messages().is_empty());

    harness.activate().await.unwrap();
    assert!(harness.client.listeners().is_subscribed(&sid));
    assert_eq!(harness.store.subscribe_count(), 2);
    assert_eq!(harness.client.merged_messages().len(), 1);
}

/// Activation survives a subscribe failure; sends still work.
#[tokio::test]
async fn activation_tolerates_subscribe_failure() {
    let harness = TestHarness::builder().build().unwrap();
    harness.store.fail_subscribes(true);
    harness.activate().await.unwrap();
    assert_eq!(harness.client.listeners().live_count(), 0);

    let receipt = harness.client.send("still here", None).await.unwrap();
    assert!(receipt.message.is_some());
    // no snapshot arrives, so the pending copy is what the view shows
    assert!(harness.client.merged_messages()[0].is_pending());
}

/// Session creation failures propagate and leave no active session.
#[tokio::test]
async fn session_failure_is_not_papered_over() {
    let harness = TestHarness::builder().build().unwrap();
    harness.store.fail_session_creation(true);
    let err = harness.activate().await.unwrap_err();
    assert!(matches!(err, ChatlineError::RemoteUnavailable { .. }));
    assert!(harness.client.current_session().is_none());
    assert!(!harness.client.is_loading());
}

#[tokio::test]
async fn shutdown_releases_everything() {
    let harness = TestHarness::builder().build().unwrap();
    harness.activate().await.unwrap();
    let sid = harness.session_id().unwrap();
    harness.client.shutdown();
    assert!(harness.client.current_session().is_none());
    assert_eq!(harness.store.inner().subscriber_count(&sid), 0);
    assert_eq!(harness.client.listeners().live_count(), 0);
}
