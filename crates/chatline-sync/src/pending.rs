// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local pending messages and short-lived greeting leases.
//!
//! All operations are single non-suspending critical sections, so a
//! check-and-insert can never interleave with another task.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use chatline_core::{ClientRequestId, DeliveryStatus, MediaBlob, Message, MessageId, SessionId};

use crate::greeting::GreetingCategory;

/// A locally-originated message plus the media needed to resend it.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub message: Message,
    pub media: Option<MediaBlob>,
}

impl PendingEntry {
    pub fn client_request_id(&self) -> Option<&ClientRequestId> {
        self.message.client_request_id.as_ref()
    }
}

/// Key of a greeting lease: one per session and category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseKey {
    pub session_id: SessionId,
    pub category: GreetingCategory,
}

impl LeaseKey {
    pub fn new(session_id: &SessionId, category: GreetingCategory) -> Self {
        Self {
            session_id: session_id.clone(),
            category,
        }
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.category)
    }
}

struct Lease {
    token: u64,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SessionId, Vec<PendingEntry>>,
    leases: HashMap<LeaseKey, Lease>,
    next_token: u64,
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Pending-message buffer per session, shared by the send pipeline, the
/// reconciler and the greeting engine. Clones share state.
#[derive(Clone, Default)]
pub struct PendingSet {
    inner: Arc<Mutex<Inner>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    /// Publishes a pending message, replacing any entry with the same
    /// client request id.
    pub fn insert(&self, session_id: &SessionId, message: Message, media: Option<MediaBlob>) {
        let mut inner = self.lock();
        let entries = inner.entries.entry(session_id.clone()).or_default();
        if let Some(crid) = message.client_request_id.as_ref() {
            entries.retain(|e| e.client_request_id() != Some(crid));
        }
        entries.push(PendingEntry { message, media });
    }

    /// Flags the entry as failed in place. Returns false if it is gone,
    /// e.g. because the confirmed copy already arrived.
    pub fn mark_failed(&self, session_id: &SessionId, crid: &ClientRequestId) -> bool {
        let mut inner = self.lock();
        let Some(entry) = inner
            .entries
            .get_mut(session_id)
            .and_then(|entries| entries.iter_mut().find(|e| e.client_request_id() == Some(crid)))
        else {
            return false;
        };
        entry.message.delivery_status = Some(DeliveryStatus::Failed);
        true
    }

    /// Drops entries whose client request id or id appears in `confirmed`.
    /// Returns the number of entries removed.
    pub fn prune_confirmed(&self, session_id: &SessionId, confirmed: &[Message]) -> usize {
        let ids: HashSet<&MessageId> = confirmed.iter().map(|m| &m.id).collect();
        let crids: HashSet<&ClientRequestId> = confirmed
            .iter()
            .filter_map(|m| m.client_request_id.as_ref())
            .collect();

        let mut inner = self.lock();
        let Some(entries) = inner.entries.get_mut(session_id) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|e| {
            !ids.contains(&e.message.id)
                && !e.client_request_id().is_some_and(|c| crids.contains(c))
        });
        let removed = before - entries.len();
        if entries.is_empty() {
            inner.entries.remove(session_id);
        }
        removed
    }

    /// Current pending messages of a session.
    pub fn snapshot(&self, session_id: &SessionId) -> Vec<Message> {
        self.lock()
            .entries
            .get(session_id)
            .map(|entries| entries.iter().map(|e| e.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Removes and returns a failed entry. Entries still in flight are left alone.
    pub fn take_failed(&self, session_id: &SessionId, crid: &ClientRequestId) -> Option<PendingEntry> {
        let mut inner = self.lock();
        let entries = inner.entries.get_mut(session_id)?;
        let index = entries
            .iter()
            .position(|e| e.client_request_id() == Some(crid) && e.message.is_failed())?;
        Some(entries.remove(index))
    }

    pub fn len(&self, session_id: &SessionId) -> usize {
        self.lock().entries.get(session_id).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self, session_id: &SessionId) -> bool {
        self.len(session_id) == 0
    }

    /// Claims `key` for `ttl` unless a live lease already holds it.
    ///
    /// The lease is released when the guard drops or when it expires.
    pub fn try_acquire(&self, key: LeaseKey, ttl: Duration) -> Option<LeaseGuard> {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner
            .leases
            .get(&key)
            .is_some_and(|lease| lease.expires_at > now)
        {
            return None;
        }
        inner.next_token += 1;
        let token = inner.next_token;
        inner.leases.insert(
            key.clone(),
            Lease {
                token,
                expires_at: now + ttl,
            },
        );
        Some(LeaseGuard {
            owner: Arc::downgrade(&self.inner),
            key,
            token,
        })
    }

    pub fn is_leased(&self, key: &LeaseKey) -> bool {
        let now = Instant::now();
        self.lock()
            .leases
            .get(key)
            .is_some_and(|lease| lease.expires_at > now)
    }
}

/// Held lease; releases on drop unless it expired and was re-acquired.
pub struct LeaseGuard {
    owner: Weak<Mutex<Inner>>,
    key: LeaseKey,
    token: u64,
}

impl LeaseGuard {
    pub fn key(&self) -> &LeaseKey {
        &self.key
    }
}

impl fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseGuard").field("key", &self.key).finish()
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(inner) = self.owner.upgrade() else {
            return;
        };
        let mut inner = lock_inner(&inner);
        if inner
            .leases
            .get(&self.key)
            .is_some_and(|lease| lease.token == self.token)
        {
            inner.leases.remove(&self.key);
        }
    }
}
