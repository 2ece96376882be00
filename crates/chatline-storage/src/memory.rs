// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementation of the session and message store traits.
//!
//! Behaves like a real-time document store: ids and timestamps are assigned
//! here, and every change fans the full ordered message list out to all
//! subscribers of the session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use chatline_config::model::StoreConfig;
use chatline_core::{
    Adapter, AdapterType, BlobStore, ChatSession, ChatlineError, HealthStatus, MediaBlob, Message,
    MessageId, MessagePayload, MessageStore, MessagesObserver, Sender, SessionId, SessionStore,
    Subscription, VisitorId,
};

use crate::blob::MemoryBlobStore;

struct Subscriber {
    id: u64,
    observer: Arc<dyn MessagesObserver>,
    handle: Subscription,
}

#[derive(Default)]
struct StoreState {
    sessions: HashMap<SessionId, ChatSession>,
    messages: HashMap<SessionId, Vec<Message>>,
    subscribers: HashMap<SessionId, Vec<Subscriber>>,
    next_subscriber_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl StoreState {
    /// Store clock: wall time, bumped so that timestamps strictly increase.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    /// Snapshot and observers to notify after a change, taken under the lock.
    fn fanout(&self, session_id: &SessionId) -> (Vec<Message>, Vec<Arc<dyn MessagesObserver>>) {
        let snapshot = self.messages.get(session_id).cloned().unwrap_or_default();
        let observers = self
            .subscribers
            .get(session_id)
            .map(|subs| subs.iter().map(|s| s.observer.clone()).collect())
            .unwrap_or_default();
        (snapshot, observers)
    }
}

/// In-memory chat store with real-time snapshot delivery.
///
/// Observers are called synchronously after the store lock is released, so
/// they may call back into the store.
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    blobs: Arc<dyn BlobStore>,
}

impl MemoryStore {
    /// Create a store whose media uploads go to a [`MemoryBlobStore`].
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_blob_store(Arc::new(MemoryBlobStore::new(&config.media_base_url)))
    }

    /// Create a store that uploads media to the given blob store.
    pub fn with_blob_store(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            blobs,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        lock_state(&self.state)
    }

    /// Number of live subscriptions for a session.
    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.lock()
            .subscribers
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Current session record, if it exists.
    pub fn session(&self, session_id: &SessionId) -> Option<ChatSession> {
        self.lock().sessions.get(session_id).cloned()
    }

    /// Drops every subscription of a session as if the connection was lost.
    ///
    /// Observers receive `on_subscription_error` and no further snapshots.
    /// Returns the number of subscriptions dropped.
    pub fn drop_subscriptions(&self, session_id: &SessionId, reason: &str) -> usize {
        let dropped = self
            .lock()
            .subscribers
            .remove(session_id)
            .unwrap_or_default();
        let error = ChatlineError::remote("subscribe", reason.to_string());
        for subscriber in &dropped {
            subscriber.handle.mark_closed();
            subscriber.observer.on_subscription_error(session_id, &error);
        }
        if !dropped.is_empty() {
            warn!(session_id = %session_id, count = dropped.len(), reason, "subscriptions dropped");
        }
        dropped.len()
    }

    fn notify(session_id: &SessionId, snapshot: &[Message], observers: &[Arc<dyn MessagesObserver>]) {
        for observer in observers {
            observer.on_messages_changed(session_id, snapshot);
        }
    }
}

fn lock_state(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Content-store path for a media upload: keyed by session and upload time.
pub fn media_path(session_id: &SessionId, at: DateTime<Utc>, file_name: &str) -> String {
    let safe_name: String = file_name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
        .collect();
    format!(
        "chat_media/{}/{}_{}",
        session_id,
        at.timestamp_millis(),
        safe_name
    )
}

#[async_trait]
impl Adapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::MessageStore
    }

    async fn health_check(&self) -> Result<HealthStatus, ChatlineError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_or_get_session(
        &self,
        visitor_id: &VisitorId,
        display_name: &str,
    ) -> Result<ChatSession, ChatlineError> {
        let session_id = SessionId::from(visitor_id);
        let mut state = self.lock();
        if let Some(existing) = state.sessions.get(&session_id) {
            return Ok(existing.clone());
        }
        let now = state.next_timestamp();
        let session = ChatSession {
            session_id: session_id.clone(),
            display_name: display_name.to_string(),
            created_at: now,
            updated_at: now,
            last_message_summary: None,
            unread_count: 0,
        };
        state.sessions.insert(session_id.clone(), session.clone());
        state.messages.entry(session_id.clone()).or_default();
        info!(session_id = %session_id, "session created");
        Ok(session)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        session_id: &SessionId,
        payload: MessagePayload,
    ) -> Result<Message, ChatlineError> {
        let (message, snapshot, observers) = {
            let mut state = self.lock();
            if !state.sessions.contains_key(session_id) {
                return Err(ChatlineError::SessionNotFound {
                    session_id: session_id.to_string(),
                });
            }
            let timestamp = state.next_timestamp();
            let message = Message {
                id: MessageId(uuid::Uuid::new_v4().to_string()),
                sender: payload.sender,
                text: payload.text,
                media_url: payload.media_url,
                media_type: payload.media_type,
                timestamp,
                read: false,
                client_request_id: payload.client_request_id,
                delivery_status: None,
                action_links: payload.action_links,
            };
            state
                .messages
                .entry(session_id.clone())
                .or_default()
                .push(message.clone());
            if let Some(session) = state.sessions.get_mut(session_id) {
                session.updated_at = timestamp;
                session.last_message_summary = Some(message.summary());
                if message.sender == Sender::Operator {
                    session.unread_count += 1;
                }
            }
            let (snapshot, observers) = state.fanout(session_id);
            (message, snapshot, observers)
        };

        debug!(
            session_id = %session_id,
            message_id = %message.id,
            subscribers = observers.len(),
            "message appended"
        );
        Self::notify(session_id, &snapshot, &observers);
        Ok(message)
    }

    async fn append_with_media(
        &self,
        session_id: &SessionId,
        mut payload: MessagePayload,
        blob: MediaBlob,
    ) -> Result<Message, ChatlineError> {
        if !self.lock().sessions.contains_key(session_id) {
            return Err(ChatlineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        let path = media_path(session_id, Utc::now(), &blob.file_name);
        let url = self.blobs.upload(&path, &blob).await?;
        payload.media_url = Some(url);
        if payload.media_type.is_none() {
            payload.media_type = blob.media_type();
        }
        self.append(session_id, payload).await
    }

    async fn list(&self, session_id: &SessionId) -> Result<Vec<Message>, ChatlineError> {
        let state = self.lock();
        if !state.sessions.contains_key(session_id) {
            return Err(ChatlineError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        let mut messages = state.messages.get(session_id).cloned().unwrap_or_default();
        messages.sort_by(Message::chronological);
        Ok(messages)
    }

    async fn subscribe(
        &self,
        session_id: &SessionId,
        observer: Arc<dyn MessagesObserver>,
    ) -> Result<Subscription, ChatlineError> {
        let (handle, snapshot) = {
            let mut state = self.lock();
            if !state.sessions.contains_key(session_id) {
                return Err(ChatlineError::SessionNotFound {
                    session_id: session_id.to_string(),
                });
            }
            state.next_subscriber_id += 1;
            let id = state.next_subscriber_id;
            let weak: Weak<Mutex<StoreState>> = Arc::downgrade(&self.state);
            let key = session_id.clone();
            let handle = Subscription::new(move || {
                if let Some(state) = weak.upgrade() {
                    let mut state = lock_state(&state);
                    if let Some(subs) = state.subscribers.get_mut(&key) {
                        subs.retain(|s| s.id != id);
                    }
                    debug!(session_id = %key, subscriber = id, "subscription closed");
                }
            });
            state
                .subscribers
                .entry(session_id.clone())
                .or_default()
                .push(Subscriber {
                    id,
                    observer: observer.clone(),
                    handle: handle.clone(),
                });
            let snapshot = state.messages.get(session_id).cloned().unwrap_or_default();
            (handle, snapshot)
        };

        debug!(session_id = %session_id, "subscription opened");
        observer.on_messages_changed(session_id, &snapshot);
        Ok(handle)
    }

    async fn mark_read(&self, session_id: &SessionId) -> Result<(), ChatlineError> {
        let (snapshot, observers) = {
            let mut state = self.lock();
            let Some(session) = state.sessions.get_mut(session_id) else {
                return Err(ChatlineError::SessionNotFound {
                    session_id: session_id.to_string(),
                });
            };
            session.unread_count = 0;
            let mut changed = false;
            if let Some(messages) = state.messages.get_mut(session_id) {
                for message in messages.iter_mut() {
                    if message.sender == Sender::Operator && !message.read {
                        message.read = true;
                        changed = true;
                    }
                }
            }
            if !changed {
                return Ok(());
            }
            state.fanout(session_id)
        };
        Self::notify(session_id, &snapshot, &observers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        snapshots: Mutex<Vec<Vec<Message>>>,
        errors: Mutex<Vec<String>>,
    }

    impl MessagesObserver for Recorder {
        fn on_messages_changed(&self, _session_id: &SessionId, messages: &[Message]) {
            self.snapshots.lock().unwrap().push(messages.to_vec());
        }

        fn on_subscription_error(&self, _session_id: &SessionId, error: &ChatlineError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(&StoreConfig::default())
    }

    async fn session(store: &MemoryStore, id: &str) -> SessionId {
        store
            .create_or_get_session(&VisitorId::from(id), "Visitor")
            .await
            .unwrap()
            .session_id
    }

    #[tokio::test]
    async fn create_or_get_returns_existing_session() {
        let store = store();
        let first = store
            .create_or_get_session(&VisitorId::from("v1"), "Visitor v1")
            .await
            .unwrap();
        let second = store
            .create_or_get_session(&VisitorId::from("v1"), "Someone else")
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.display_name, "Visitor v1");
        assert_eq!(second.unread_count, 0);
    }

    #[tokio::test]
    async fn append_assigns_increasing_timestamps() {
        let store = store();
        let sid = session(&store, "v1").await;
        let a = store
            .append(&sid, MessagePayload::text(Sender::Visitor, "one"))
            .await
            .unwrap();
        let b = store
            .append(&sid, MessagePayload::text(Sender::Visitor, "two"))
            .await
            .unwrap();
        assert!(a.timestamp < b.timestamp);
        assert_ne!(a.id, b.id);

        let listed = store.list(&sid).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|m| m.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn append_to_unknown_session_fails() {
        let store = store();
        let err = store
            .append(&SessionId::from("nope"), MessagePayload::text(Sender::Visitor, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatlineError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn operator_messages_bump_unread_until_marked_read() {
        let store = store();
        let sid = session(&store, "v1").await;
        store
            .append(&sid, MessagePayload::text(Sender::Operator, "hello"))
            .await
            .unwrap();
        store
            .append(&sid, MessagePayload::text(Sender::Visitor, "hi"))
            .await
            .unwrap();
        let record = store.session(&sid).unwrap();
        assert_eq!(record.unread_count, 1);
        assert_eq!(record.last_message_summary.as_deref(), Some("hi"));

        store.mark_read(&sid).await.unwrap();
        assert_eq!(store.session(&sid).unwrap().unread_count, 0);
        let listed = store.list(&sid).await.unwrap();
        assert!(listed[0].read);
        assert!(!listed[1].read);
    }

    #[tokio::test]
    async fn subscribers_get_initial_and_full_snapshots() {
        let store = store();
        let sid = session(&store, "v1").await;
        store
            .append(&sid, MessagePayload::text(Sender::Operator, "welcome"))
            .await
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let handle = store.subscribe(&sid, recorder.clone()).await.unwrap();
        store
            .append(&sid, MessagePayload::text(Sender::Visitor, "hi"))
            .await
            .unwrap();

        {
            let snapshots = recorder.snapshots.lock().unwrap();
            assert_eq!(snapshots.len(), 2);
            assert_eq!(snapshots[0].len(), 1);
            assert_eq!(snapshots[1].len(), 2);
        }

        handle.unsubscribe();
        assert_eq!(store.subscriber_count(&sid), 0);
        store
            .append(&sid, MessagePayload::text(Sender::Visitor, "again"))
            .await
            .unwrap();
        assert_eq!(recorder.snapshots.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn dropped_subscriptions_notify_error_once() {
        let store = store();
        let sid = session(&store, "v1").await;
        let recorder = Arc::new(Recorder::default());
        let handle = store.subscribe(&sid, recorder.clone()).await.unwrap();

        assert_eq!(store.drop_subscriptions(&sid, "network lost"), 1);
        assert!(!handle.is_active());
        assert_eq!(recorder.errors.lock().unwrap().len(), 1);
        assert_eq!(store.drop_subscriptions(&sid, "again"), 0);
    }

    #[tokio::test]
    async fn media_is_uploaded_under_session_path() {
        let blobs = Arc::new(MemoryBlobStore::new("memory://media"));
        let store = MemoryStore::with_blob_store(blobs.clone());
        let sid = session(&store, "v1").await;
        let payload = MessagePayload {
            sender: Sender::Visitor,
            text: None,
            media_url: None,
            media_type: None,
            client_request_id: None,
            action_links: Vec::new(),
        };
        let message = store
            .append_with_media(&sid, payload, MediaBlob::new("cat pic.png", "image/png", vec![1, 2]))
            .await
            .unwrap();

        let url = message.media_url.unwrap();
        assert!(url.starts_with("memory://media/chat_media/v1/"));
        assert!(url.ends_with("_cat_pic.png"));
        assert_eq!(message.media_type, Some(chatline_core::MediaType::Image));
        assert_eq!(blobs.len(), 1);
    }
}
