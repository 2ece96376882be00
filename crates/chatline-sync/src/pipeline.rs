// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optimistic send pipeline.
//!
//! A send is published to the pending set before the store is called, so the
//! merged view shows it immediately. The pending copy is only removed when a
//! snapshot delivers the confirmed message; a failed append flags it in place.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use chatline_config::model::MediaConfig;
use chatline_core::{
    ChatlineError, ClientRequestId, DeliveryStatus, MediaBlob, MediaType, Message, MessageId,
    MessagePayload, MessageStore, Sender, SessionId,
};

use crate::active::ActiveSession;
use crate::pending::PendingSet;
use crate::reconciler::Reconciler;

/// Allowed media types and size limits.
#[derive(Debug, Clone)]
pub struct MediaPolicy {
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
    pub allowed_image_types: Vec<String>,
    pub allowed_video_types: Vec<String>,
}

impl MediaPolicy {
    pub fn from_config(config: &MediaConfig) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            max_video_bytes: config.max_video_bytes,
            allowed_image_types: config.allowed_image_types.clone(),
            allowed_video_types: config.allowed_video_types.clone(),
        }
    }

    /// Checks a blob against the policy and returns its media kind.
    pub fn validate(&self, blob: &MediaBlob) -> Result<MediaType, ChatlineError> {
        let invalid = |reason: String| ChatlineError::InvalidMedia { reason };

        if blob.is_empty() {
            return Err(invalid(format!("`{}` is empty", blob.file_name)));
        }
        let content_type = blob.content_type.trim().to_ascii_lowercase();
        let Some(kind) = blob.media_type() else {
            return Err(invalid(format!(
                "`{content_type}` is neither an image nor a video"
            )));
        };
        let (allowed, limit) = match kind {
            MediaType::Image => (&self.allowed_image_types, self.max_image_bytes),
            MediaType::Video => (&self.allowed_video_types, self.max_video_bytes),
        };
        if !allowed.iter().any(|t| t.eq_ignore_ascii_case(&content_type)) {
            return Err(invalid(format!("{kind} type `{content_type}` is not allowed")));
        }
        if blob.len() as u64 > limit {
            return Err(invalid(format!(
                "{kind} is {} bytes, limit is {limit}",
                blob.len()
            )));
        }
        Ok(kind)
    }
}

/// Outcome of a send as seen by the caller.
///
/// Store failures are reported here with `status == Failed` rather than as
/// an `Err`; the pending message stays visible and flagged.
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub client_request_id: ClientRequestId,
    pub status: DeliveryStatus,
    /// The stored message when the append succeeded.
    pub message: Option<Message>,
    pub error: Option<String>,
    /// True when the session was deactivated before the store answered.
    pub stale: bool,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SendPipeline {
    store: Arc<dyn MessageStore>,
    pending: PendingSet,
    reconciler: Arc<Reconciler>,
    active: Arc<ActiveSession>,
    policy: MediaPolicy,
    in_flight: AtomicUsize,
}

impl SendPipeline {
    pub fn new(
        store: Arc<dyn MessageStore>,
        pending: PendingSet,
        reconciler: Arc<Reconciler>,
        active: Arc<ActiveSession>,
        policy: MediaPolicy,
    ) -> Self {
        Self {
            store,
            pending,
            reconciler,
            active,
            policy,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn policy(&self) -> &MediaPolicy {
        &self.policy
    }

    /// Sends a visitor message on the active session `session_id`.
    ///
    /// Validation errors are returned before anything becomes visible.
    pub async fn send(
        &self,
        session_id: &SessionId,
        text: &str,
        media: Option<MediaBlob>,
    ) -> Result<SendReceipt, ChatlineError> {
        let text = text.trim();
        if text.is_empty() && media.is_none() {
            return Err(ChatlineError::EmptyMessage);
        }
        let media_type = media
            .as_ref()
            .map(|blob| self.policy.validate(blob))
            .transpose()?;

        let token = self
            .active
            .token()
            .filter(|token| &token.session_id == session_id)
            .ok_or(ChatlineError::NoActiveSession)?;

        let _in_flight = InFlight::enter(&self.in_flight);
        let crid = ClientRequestId::new(uuid::Uuid::new_v4().to_string());
        let text = (!text.is_empty()).then(|| text.to_string());

        let local = Message {
            id: MessageId(format!("local-{crid}")),
            sender: Sender::Visitor,
            text: text.clone(),
            media_url: None,
            media_type,
            timestamp: Utc::now(),
            read: true,
            client_request_id: Some(crid.clone()),
            delivery_status: Some(DeliveryStatus::Pending),
            action_links: Vec::new(),
        };
        self.pending.insert(session_id, local, media.clone());
        self.reconciler.notify();
        debug!(session_id = %session_id, client_request_id = %crid, "pending message published");

        let payload = MessagePayload {
            sender: Sender::Visitor,
            text,
            media_url: None,
            media_type,
            client_request_id: Some(crid.clone()),
            action_links: Vec::new(),
        };
        let result = match media {
            Some(blob) => self.store.append_with_media(session_id, payload, blob).await,
            None => self.store.append(session_id, payload).await,
        };

        let stale = !self.active.is_current(&token);
        if stale {
            debug!(session_id = %session_id, client_request_id = %crid, "send completed after deactivation");
        }

        match result {
            Ok(message) => {
                info!(
                    session_id = %session_id,
                    client_request_id = %crid,
                    message_id = %message.id,
                    "message sent"
                );
                Ok(SendReceipt {
                    client_request_id: crid,
                    status: DeliveryStatus::Confirmed,
                    message: Some(message),
                    error: None,
                    stale,
                })
            }
            Err(err) => {
                warn!(
                    session_id = %session_id,
                    client_request_id = %crid,
                    error = %err,
                    "send failed"
                );
                // the entry is keyed by session and outlives deactivation, so it
                // is flagged even when the activation that sent it is gone
                if self.pending.mark_failed(session_id, &crid) {
                    self.reconciler.notify();
                }
                Ok(SendReceipt {
                    client_request_id: crid,
                    status: DeliveryStatus::Failed,
                    message: None,
                    error: Some(err.to_string()),
                    stale,
                })
            }
        }
    }

    /// Re-sends a failed message as a brand-new send with a fresh client
    /// request id. The failed entry is removed first.
    pub async fn retry(
        &self,
        session_id: &SessionId,
        client_request_id: &ClientRequestId,
    ) -> Result<SendReceipt, ChatlineError> {
        let entry = self
            .pending
            .take_failed(session_id, client_request_id)
            .ok_or_else(|| ChatlineError::UnknownRequest {
                client_request_id: client_request_id.to_string(),
            })?;
        self.reconciler.notify();
        debug!(session_id = %session_id, client_request_id = %client_request_id, "retrying failed send");
        let text = entry.message.text.unwrap_or_default();
        self.send(session_id, &text, entry.media).await
    }
}
