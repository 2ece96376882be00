// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merges confirmed store snapshots with local pending messages.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, warn};

use chatline_core::{ChatlineError, ClientRequestId, Message, MessageId, MessagesObserver, SessionId};

use crate::pending::PendingSet;

/// Builds the merged view from a confirmed list and pending messages.
///
/// Pending entries already represented in `confirmed` (same client request id
/// or same id) are dropped, confirmed entries win every id collision, each
/// client request id appears at most once, and the result is ordered by
/// timestamp with ties broken by id.
pub fn reconcile(confirmed: &[Message], pending: &[Message]) -> Vec<Message> {
    let mut ordered_confirmed: Vec<&Message> = confirmed.iter().collect();
    ordered_confirmed.sort_by(|a, b| Message::chronological(a, b));

    let mut seen_ids: HashSet<&MessageId> = HashSet::new();
    let mut seen_crids: HashSet<&ClientRequestId> = HashSet::new();
    let mut merged = Vec::with_capacity(confirmed.len() + pending.len());

    for message in ordered_confirmed.into_iter().chain(pending.iter()) {
        if seen_ids.contains(&message.id) {
            continue;
        }
        if let Some(crid) = message.client_request_id.as_ref()
            && !seen_crids.insert(crid)
        {
            continue;
        }
        seen_ids.insert(&message.id);
        merged.push(message.clone());
    }

    merged.sort_by(Message::chronological);
    merged
}

/// Snapshot observer that keeps the latest confirmed list per session and
/// publishes a change counter whenever the merged view may have changed.
pub struct Reconciler {
    pending: PendingSet,
    confirmed: Mutex<HashMap<SessionId, Vec<Message>>>,
    changes: watch::Sender<u64>,
}

impl Reconciler {
    pub fn new(pending: PendingSet) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            pending,
            confirmed: Mutex::new(HashMap::new()),
            changes,
        }
    }

    fn confirmed_lock(&self) -> MutexGuard<'_, HashMap<SessionId, Vec<Message>>> {
        match self.confirmed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Merged view for a session: confirmed snapshot plus pending messages.
    pub fn merged(&self, session_id: &SessionId) -> Vec<Message> {
        let confirmed = self
            .confirmed_lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        let pending = self.pending.snapshot(session_id);
        reconcile(&confirmed, &pending)
    }

    /// Latest confirmed snapshot, `None` until the first delivery.
    pub fn confirmed(&self, session_id: &SessionId) -> Option<Vec<Message>> {
        self.confirmed_lock().get(session_id).cloned()
    }

    /// Drops the confirmed snapshot of a session.
    pub fn forget(&self, session_id: &SessionId) {
        if self.confirmed_lock().remove(session_id).is_some() {
            self.notify();
        }
    }

    /// Signals that the merged view may have changed.
    pub fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }
}

impl MessagesObserver for Reconciler {
    fn on_messages_changed(&self, session_id: &SessionId, messages: &[Message]) {
        let mut snapshot = messages.to_vec();
        snapshot.sort_by(Message::chronological);
        let promoted = self.pending.prune_confirmed(session_id, &snapshot);
        let count = snapshot.len();
        self.confirmed_lock().insert(session_id.clone(), snapshot);
        debug!(session_id = %session_id, confirmed = count, promoted, "snapshot reconciled");
        self.notify();
    }

    fn on_subscription_error(&self, session_id: &SessionId, error: &ChatlineError) {
        warn!(session_id = %session_id, error = %error, "subscription error; confirmed view reset");
        self.forget(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::{DeliveryStatus, Sender};
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use tracing_test::traced_test;

    fn at(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn confirmed(id: &str, crid: Option<&str>, secs: i64) -> Message {
        Message {
            id: MessageId::from(id),
            sender: Sender::Visitor,
            text: Some(format!("text {id}")),
            media_url: None,
            media_type: None,
            timestamp: at(secs),
            read: false,
            client_request_id: crid.map(ClientRequestId::from),
            delivery_status: None,
            action_links: Vec::new(),
        }
    }

    fn pending(crid: &str, secs: i64) -> Message {
        Message {
            id: MessageId(format!("local-{crid}")),
            client_request_id: Some(ClientRequestId::from(crid)),
            delivery_status: Some(DeliveryStatus::Pending),
            ..confirmed("x", None, secs)
        }
    }

    #[test]
    fn confirmed_copy_replaces_pending() {
        let merged = reconcile(&[confirmed("m1", Some("r1"), 5)], &[pending("r1", 4)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, MessageId::from("m1"));
        assert!(!merged[0].is_pending());
    }

    #[test]
    fn unmatched_pending_is_kept_in_time_order() {
        let merged = reconcile(
            &[confirmed("m1", None, 1), confirmed("m2", None, 10)],
            &[pending("r1", 5)],
        );
        let ids: Vec<_> = merged.iter().map(|m| m.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["m1", "local-r1", "m2"]);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let merged = reconcile(&[confirmed("b", None, 1), confirmed("a", None, 1)], &[]);
        assert_eq!(merged[0].id, MessageId::from("a"));
    }

    #[test]
    fn duplicate_confirmed_ids_collapse() {
        let merged = reconcile(&[confirmed("m1", None, 1), confirmed("m1", None, 1)], &[]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn snapshot_prunes_pending_and_bumps_version() {
        let set = PendingSet::new();
        let sid = SessionId::from("s");
        set.insert(&sid, pending("r1", 1), None);
        let reconciler = Reconciler::new(set.clone());
        let before = reconciler.version();

        reconciler.on_messages_changed(&sid, &[confirmed("m1", Some("r1"), 2)]);

        assert!(set.is_empty(&sid));
        assert_eq!(reconciler.merged(&sid).len(), 1);
        assert!(reconciler.version() > before);
    }

    #[traced_test]
    #[test]
    fn subscription_error_resets_confirmed_view() {
        let set = PendingSet::new();
        let sid = SessionId::from("s");
        let reconciler = Reconciler::new(set.clone());
        reconciler.on_messages_changed(&sid, &[confirmed("m1", None, 1)]);
        set.insert(&sid, pending("r2", 2), None);

        let error = ChatlineError::remote("subscribe", "connection reset");
        reconciler.on_subscription_error(&sid, &error);

        assert!(reconciler.confirmed(&sid).is_none());
        let merged = reconciler.merged(&sid);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_pending());
        assert!(logs_contain("subscription error"));
    }

    fn arb_message(pending_side: bool) -> impl Strategy<Value = Message> {
        (0u8..6, proptest::option::of(0u8..6), 0i64..20).prop_map(move |(id, crid, secs)| {
            if pending_side {
                pending(&format!("r{}", crid.unwrap_or(id)), secs)
            } else {
                confirmed(&format!("m{id}"), crid.map(|c| format!("r{c}")).as_deref(), secs)
            }
        })
    }

    proptest! {
        #[test]
        fn merged_view_has_unique_request_ids(
            confirmed in proptest::collection::vec(arb_message(false), 0..12),
            pending in proptest::collection::vec(arb_message(true), 0..12),
        ) {
            let merged = reconcile(&confirmed, &pending);
            let mut seen = HashSet::new();
            for message in &merged {
                if let Some(crid) = &message.client_request_id {
                    prop_assert!(seen.insert(crid.clone()), "duplicate request id {crid}");
                }
            }
        }

        #[test]
        fn merged_view_is_time_ordered(
            confirmed in proptest::collection::vec(arb_message(false), 0..12),
            pending in proptest::collection::vec(arb_message(true), 0..12),
        ) {
            let merged = reconcile(&confirmed, &pending);
            for pair in merged.windows(2) {
                prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            }
        }

        #[test]
        fn confirmed_request_ids_hide_pending(
            confirmed in proptest::collection::vec(arb_message(false), 0..12),
            pending in proptest::collection::vec(arb_message(true), 0..12),
        ) {
            let merged = reconcile(&confirmed, &pending);
            let confirmed_crids: HashSet<_> = confirmed
                .iter()
                .filter_map(|m| m.client_request_id.clone())
                .collect();
            for message in merged.iter().filter(|m| m.is_pending()) {
                let crid = message.client_request_id.clone().unwrap();
                prop_assert!(!confirmed_crids.contains(&crid));
            }
        }
    }
}
