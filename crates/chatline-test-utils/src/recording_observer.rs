// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observer that records every snapshot and subscription error it receives.

use std::sync::Mutex;

use chatline_core::{ChatlineError, Message, MessagesObserver, SessionId};

#[derive(Default)]
pub struct RecordingObserver {
    snapshots: Mutex<Vec<(SessionId, Vec<Message>)>>,
    errors: Mutex<Vec<(SessionId, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot delivered so far, oldest first.
    pub fn snapshots(&self) -> Vec<(SessionId, Vec<Message>)> {
        self.snapshots.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_snapshot(&self) -> Option<Vec<Message>> {
        self.snapshots
            .lock()
            .ok()
            .and_then(|s| s.last().map(|(_, messages)| messages.clone()))
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn errors(&self) -> Vec<(SessionId, String)> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl MessagesObserver for RecordingObserver {
    fn on_messages_changed(&self, session_id: &SessionId, messages: &[Message]) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.push((session_id.clone(), messages.to_vec()));
        }
    }

    fn on_subscription_error(&self, session_id: &SessionId, error: &ChatlineError) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push((session_id.clone(), error.to_string()));
        }
    }
}
