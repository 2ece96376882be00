// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fault-injecting store for deterministic failure and interleaving tests.
//!
//! `FlakyStore` wraps a [`MemoryStore`] and implements the session and message
//! store traits on top of it. Each operation can be switched to fail, every
//! call is counted, and optional yield points suspend the caller once before
//! the store is touched so concurrent tasks interleave at the await.
//! Appends can also be paused outright until the test releases them, and a
//! single list can be held after reading so it answers with an old snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use chatline_config::model::StoreConfig;
use chatline_core::{
    Adapter, AdapterType, ChatSession, ChatlineError, HealthStatus, MediaBlob, Message,
    MessagePayload, MessageStore, MessagesObserver, SessionId, SessionStore, Subscription,
    VisitorId,
};
use chatline_storage::MemoryStore;

#[derive(Default)]
struct Counter(AtomicUsize);

impl Counter {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A store wrapper with switchable failures and call counters.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    yielding: AtomicBool,
    appends_paused: watch::Sender<bool>,
    hold_next_list: AtomicBool,
    list_held: watch::Sender<bool>,
    fail_appends: AtomicBool,
    fail_next_appends: AtomicUsize,
    fail_lists: AtomicBool,
    fail_sessions: AtomicBool,
    fail_subscribes: AtomicBool,
    appends: Counter,
    lists: Counter,
    subscribes: Counter,
    sessions: Counter,
}

impl FlakyStore {
    /// Create a healthy store over a fresh [`MemoryStore`].
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new(&StoreConfig::default())))
    }

    pub fn with_store(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            yielding: AtomicBool::new(false),
            appends_paused: watch::Sender::new(false),
            hold_next_list: AtomicBool::new(false),
            list_held: watch::Sender::new(false),
            fail_appends: AtomicBool::new(false),
            fail_next_appends: AtomicUsize::new(0),
            fail_lists: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
            fail_subscribes: AtomicBool::new(false),
            appends: Counter::default(),
            lists: Counter::default(),
            subscribes: Counter::default(),
            sessions: Counter::default(),
        }
    }

    /// The wrapped store; calls on it bypass failures and counters.
    pub fn inner(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Suspend once at the start of every operation.
    pub fn set_yielding(&self, yielding: bool) {
        self.yielding.store(yielding, Ordering::SeqCst);
    }

    /// Hold every append at its start until [`resume_appends`](Self::resume_appends).
    pub fn pause_appends(&self) {
        self.appends_paused.send_replace(true);
    }

    pub fn resume_appends(&self) {
        self.appends_paused.send_replace(false);
    }

    /// The next list reads its snapshot, then waits for
    /// [`release_held_list`](Self::release_held_list) before answering.
    pub fn hold_next_list(&self) {
        self.list_held.send_replace(true);
        self.hold_next_list.store(true, Ordering::SeqCst);
    }

    pub fn release_held_list(&self) {
        self.list_held.send_replace(false);
    }

    /// Fail every append (text and media) until switched off.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Fail only the next `count` appends.
    pub fn fail_next_appends(&self, count: usize) {
        self.fail_next_appends.store(count, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_session_creation(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribes(&self, fail: bool) {
        self.fail_subscribes.store(fail, Ordering::SeqCst);
    }

    /// Drop every live subscription of a session, as a lost connection would.
    pub fn drop_subscriptions(&self, session_id: &SessionId) -> usize {
        self.inner.drop_subscriptions(session_id, "connection lost")
    }

    /// Append calls received, including failed ones.
    pub fn append_count(&self) -> usize {
        self.appends.get()
    }

    pub fn list_count(&self) -> usize {
        self.lists.get()
    }

    /// Remote subscribe calls received, including failed ones.
    pub fn subscribe_count(&self) -> usize {
        self.subscribes.get()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.get()
    }

    async fn checkpoint(&self) {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    async fn append_gate(&self) {
        let mut paused = self.appends_paused.subscribe();
        // sender is owned by self and never closed
        let _ = paused.wait_for(|paused| !*paused).await;
    }

    async fn list_gate(&self) {
        if !self.hold_next_list.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut held = self.list_held.subscribe();
        let _ = held.wait_for(|held| !*held).await;
    }

    fn append_should_fail(&self) -> bool {
        if self.fail_appends.load(Ordering::SeqCst) {
            return true;
        }
        self.fail_next_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn injected(operation: &str) -> ChatlineError {
    tracing::debug!(operation, "injecting store failure");
    ChatlineError::remote(operation, format!("injected {operation} failure"))
}

#[async_trait]
impl Adapter for FlakyStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::MessageStore
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        if self.fail_appends.load(Ordering::SeqCst) || self.fail_lists.load(Ordering::SeqCst) {
            Ok(HealthStatus::Degraded("failures injected".to_string()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn create_or_get_session(
        &self,
        visitor_id: &VisitorId,
        display_name: &str,
    ) -> Result<ChatSession, ChatlineError> {
        self.sessions.bump();
        self.checkpoint().await;
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(injected("create_or_get_session"));
        }
        self.inner.create_or_get_session(visitor_id, display_name).await
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn append(
        &self,
        session_id: &SessionId,
        payload: MessagePayload,
    ) -> Result<Message, ChatlineError> {
        self.appends.bump();
        self.checkpoint().await;
        self.append_gate().await;
        if self.append_should_fail() {
            return Err(injected("append"));
        }
        self.inner.append(session_id, payload).await
    }

    async fn append_with_media(
        &self,
        session_id: &SessionId,
        payload: MessagePayload,
        blob: MediaBlob,
    ) -> Result<Message, ChatlineError> {
        self.appends.bump();
        self.checkpoint().await;
        self.append_gate().await;
        if self.append_should_fail() {
            return Err(injected("append_with_media"));
        }
        self.inner.append_with_media(session_id, payload, blob).await
    }

    async fn list(&self, session_id: &SessionId) -> Result<Vec<Message>, ChatlineError> {
        self.lists.bump();
        self.checkpoint().await;
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        let messages = self.inner.list(session_id).await;
        self.list_gate().await;
        messages
    }

    async fn subscribe(
        &self,
        session_id: &SessionId,
        observer: Arc<dyn MessagesObserver>,
    ) -> Result<Subscription, ChatlineError> {
        self.subscribes.bump();
        self.checkpoint().await;
        if self.fail_subscribes.load(Ordering::SeqCst) {
            return Err(injected("subscribe"));
        }
        self.inner.subscribe(session_id, observer).await
    }

    async fn mark_read(&self, session_id: &SessionId) -> Result<(), ChatlineError> {
        self.checkpoint().await;
        self.inner.mark_read(session_id).await
    }
}
