// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for optimistic sends and reconciliation through `ChatClient`.

use std::collections::HashSet;

use chatline_core::{ChatlineError, DeliveryStatus, MediaBlob, MediaType, Message, Sender};
use chatline_test_utils::TestHarness;

async fn active_harness() -> TestHarness {
    let harness = TestHarness::builder()
        .with_visitor_id("visitor-a")
        .build()
        .unwrap();
    harness.activate().await.unwrap();
    harness
}

/// Polls the merged view until `ready` holds, yielding between checks.
async fn wait_for_view(harness: &TestHarness, ready: impl Fn(&[Message]) -> bool) -> Vec<Message> {
    loop {
        let view = harness.client.merged_messages();
        if ready(&view) {
            return view;
        }
        tokio::task::yield_now().await;
    }
}

/// A send shows up as pending at once and is replaced by the confirmed copy.
#[tokio::test]
async fn send_is_pending_then_confirmed_without_duplicate() {
    let harness = active_harness().await;
    harness.store.pause_appends();

    let (receipt, during) = tokio::join!(harness.client.send("Hello", None), async {
        let view = wait_for_view(&harness, |view| !view.is_empty()).await;
        assert!(harness.client.is_sending());
        harness.store.resume_appends();
        view
    });

    assert_eq!(during.len(), 1);
    assert_eq!(during[0].sender, Sender::Visitor);
    assert_eq!(during[0].text.as_deref(), Some("Hello"));
    assert_eq!(during[0].delivery_status, Some(DeliveryStatus::Pending));

    let receipt = receipt.unwrap();
    assert_eq!(receipt.status, DeliveryStatus::Confirmed);
    let stored = receipt.message.unwrap();

    let after = harness.client.merged_messages();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, stored.id);
    assert_eq!(after[0].text.as_deref(), Some("Hello"));
    assert!(!after[0].is_pending());
    assert!(!harness.client.is_sending());
}

/// A rejected append leaves the message visible and flagged, without an error.
#[tokio::test]
async fn failed_append_keeps_message_flagged() {
    let harness = active_harness().await;
    harness.store.fail_appends(true);

    let receipt = harness.client.send("Hello", None).await.unwrap();
    assert_eq!(receipt.status, DeliveryStatus::Failed);
    assert!(receipt.error.unwrap().contains("append"));

    let view = harness.client.merged_messages();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].delivery_status, Some(DeliveryStatus::Failed));
    assert_eq!(view[0].client_request_id, Some(receipt.client_request_id));
    assert!(harness.stored_messages().await.unwrap().is_empty());
}

/// Retry removes the failed copy and sends again under a new request id.
#[tokio::test]
async fn retry_replaces_failed_entry() {
    let harness = active_harness().await;
    harness.store.fail_next_appends(1);
    let failed = harness.client.send("Hello", None).await.unwrap();
    assert_eq!(failed.status, DeliveryStatus::Failed);

    let retried = harness.client.retry(&failed.client_request_id).await.unwrap();
    assert_eq!(retried.status, DeliveryStatus::Confirmed);
    assert_ne!(retried.client_request_id, failed.client_request_id);

    let view = harness.client.merged_messages();
    assert_eq!(view.len(), 1);
    assert!(!view[0].is_failed());
    assert_eq!(view[0].client_request_id, Some(retried.client_request_id));

    let again = harness.client.retry(&failed.client_request_id).await.unwrap_err();
    assert!(matches!(again, ChatlineError::UnknownRequest { .. }));
}

/// Many sends interleaved with operator replies never show a request id twice
/// and leave nothing pending once every append is confirmed.
#[tokio::test]
async fn interleaved_traffic_has_unique_request_ids() {
    let harness = active_harness().await;
    harness.store.set_yielding(true);

    for round in 0..5 {
        let first = format!("first {round}");
        let second = format!("second {round}");
        let reply_text = format!("reply {round}");
        let (a, b, reply) = tokio::join!(
            harness.client.send(&first, None),
            harness.client.send(&second, None),
            harness.operator_reply(&reply_text),
        );
        a.unwrap();
        b.unwrap();
        reply.unwrap();

        let view = harness.client.merged_messages();
        let mut seen = HashSet::new();
        for message in &view {
            if let Some(crid) = &message.client_request_id {
                assert!(seen.insert(crid.clone()), "duplicate {crid} in round {round}");
            }
        }
        for pair in view.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    let view = harness.client.merged_messages();
    assert_eq!(view.len(), 15);
    assert!(view.iter().all(|m| !m.is_pending()));
}

/// A send that fails after deactivation still flags its entry, so the
/// message can be retried once the session is active again.
#[tokio::test]
async fn failure_after_deactivate_stays_retryable() {
    let harness = active_harness().await;
    harness.store.pause_appends();
    harness.store.fail_appends(true);

    let (receipt, _) = tokio::join!(harness.client.send("Hello", None), async {
        while !harness.client.is_sending() {
            tokio::task::yield_now().await;
        }
        harness.client.deactivate();
        harness.store.resume_appends();
    });

    let receipt = receipt.unwrap();
    assert!(receipt.stale);
    assert_eq!(receipt.status, DeliveryStatus::Failed);

    harness.store.fail_appends(false);
    harness.activate().await.unwrap();
    let view = harness.client.merged_messages();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].delivery_status, Some(DeliveryStatus::Failed));

    let retried = harness.client.retry(&receipt.client_request_id).await.unwrap();
    assert_eq!(retried.status, DeliveryStatus::Confirmed);
    let view = harness.client.merged_messages();
    assert_eq!(view.len(), 1);
    assert!(!view[0].is_pending());
    assert_eq!(view[0].text.as_deref(), Some("Hello"));
}

#[tokio::test]
async fn media_send_is_confirmed_with_url() {
    let harness = active_harness().await;
    let blob = MediaBlob::new("photo.jpg", "image/jpeg", vec![0xff, 0xd8, 0xff]);
    let receipt = harness.client.send("", Some(blob)).await.unwrap();
    assert_eq!(receipt.status, DeliveryStatus::Confirmed);

    let view = harness.client.merged_messages();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].media_type, Some(MediaType::Image));
    assert!(view[0].media_url.as_deref().unwrap().contains("chat_media/visitor-a/"));
    assert_eq!(view[0].summary(), "[image]");
}

#[tokio::test]
async fn invalid_input_is_rejected_without_store_calls() {
    let harness = active_harness().await;
    let empty = harness.client.send("  ", None).await.unwrap_err();
    assert!(matches!(empty, ChatlineError::EmptyMessage));

    let blob = MediaBlob::new("huge.gif", "image/gif", vec![0; 11 * 1024 * 1024]);
    let oversized = harness.client.send("look", Some(blob)).await.unwrap_err();
    assert!(matches!(oversized, ChatlineError::InvalidMedia { .. }));

    assert_eq!(harness.store.append_count(), 0);
    assert!(harness.client.merged_messages().is_empty());
}

#[tokio::test]
async fn send_without_session_fails() {
    let harness = TestHarness::builder().build().unwrap();
    let err = harness.client.send("Hello", None).await.unwrap_err();
    assert!(matches!(err, ChatlineError::NoActiveSession));
}

/// Operator replies raise the unread count until the visitor reads them.
#[tokio::test]
async fn mark_read_flips_operator_messages() {
    let harness = active_harness().await;
    let mut changes = harness.client.changes();
    harness.operator_reply("Hi, how can we help?").await.unwrap();
    assert!(changes.has_changed().unwrap());

    let sid = harness.session_id().unwrap();
    assert_eq!(harness.store.inner().session(&sid).unwrap().unread_count, 1);

    harness.client.mark_read().await.unwrap();
    assert_eq!(harness.store.inner().session(&sid).unwrap().unread_count, 0);
    assert!(harness.client.merged_messages()[0].read);
}

/// The session record summarises the latest message.
#[tokio::test]
async fn session_summary_tracks_last_message() {
    let harness = active_harness().await;
    harness.client.send("Do you have gems?", None).await.unwrap();
    let sid = harness.session_id().unwrap();
    let session = harness.store.inner().session(&sid).unwrap();
    assert_eq!(session.last_message_summary.as_deref(), Some("Do you have gems?"));
    assert_eq!(session.display_name, "Visitor visito");
}
