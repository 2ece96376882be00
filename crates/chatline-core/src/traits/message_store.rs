// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message store trait: append, list and snapshot subscriptions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChatlineError;
use crate::subscription::Subscription;
use crate::traits::adapter::Adapter;
use crate::traits::observer::MessagesObserver;
use crate::types::{MediaBlob, Message, MessagePayload, SessionId};

/// Adapter over the remote, authoritative message list of each session.
///
/// Ids and timestamps are always assigned by the store. Every list the store
/// hands out is ordered by [`Message::chronological`].
#[async_trait]
pub trait MessageStore: Adapter {
    /// Appends a message and returns the stored copy.
    async fn append(
        &self,
        session_id: &SessionId,
        payload: MessagePayload,
    ) -> Result<Message, ChatlineError>;

    /// Uploads `blob` to the content store under a session+timestamp-keyed
    /// path, then appends `payload` carrying the resulting URL.
    async fn append_with_media(
        &self,
        session_id: &SessionId,
        payload: MessagePayload,
        blob: MediaBlob,
    ) -> Result<Message, ChatlineError>;

    /// One-shot ordered fetch of the full message list.
    async fn list(&self, session_id: &SessionId) -> Result<Vec<Message>, ChatlineError>;

    /// Opens a real-time subscription.
    ///
    /// The observer receives the full ordered list on every change, starting
    /// with the current list.
    async fn subscribe(
        &self,
        session_id: &SessionId,
        observer: Arc<dyn MessagesObserver>,
    ) -> Result<Subscription, ChatlineError>;

    /// Flags every operator message as read and resets the unread counter.
    async fn mark_read(&self, session_id: &SessionId) -> Result<(), ChatlineError>;
}
