// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observer interface for full-snapshot subscription delivery.

use crate::error::ChatlineError;
use crate::types::{Message, SessionId};

/// Receives snapshot deliveries from a [`MessageStore`](crate::MessageStore)
/// subscription.
///
/// Callbacks run synchronously on the delivering task and must not block.
pub trait MessagesObserver: Send + Sync {
    /// Called with the complete ordered message list after every change.
    fn on_messages_changed(&self, session_id: &SessionId, messages: &[Message]);

    /// Called once when the store drops the subscription. No further
    /// snapshots follow.
    fn on_subscription_error(&self, session_id: &SessionId, error: &ChatlineError) {
        let _ = (session_id, error);
    }
}
