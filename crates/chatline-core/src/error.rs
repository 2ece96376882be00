// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chatline sync core.

use thiserror::Error;

/// The primary error type used across all Chatline adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ChatlineError {
    /// Configuration errors surfaced at runtime (missing paths, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A remote store operation (append, list, subscribe, session lookup) failed.
    #[error("remote store unavailable during {operation}: {source}")]
    RemoteUnavailable {
        operation: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The store has no session with this id.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Durable client storage (visitor identity) failed.
    #[error("identity storage error: {source}")]
    IdentityStorage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Media attached to a send did not pass validation.
    #[error("invalid media: {reason}")]
    InvalidMedia { reason: String },

    /// A send carried neither text nor media.
    #[error("message has no text and no media")]
    EmptyMessage,

    /// The chat facade was used before a session was activated.
    #[error("no active chat session")]
    NoActiveSession,

    /// A retry referenced a request that is not a failed pending message.
    #[error("no failed message for client request {client_request_id}")]
    UnknownRequest { client_request_id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatlineError {
    /// Wraps a store failure for the named operation.
    pub fn remote(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ChatlineError::RemoteUnavailable {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Returns true for failures of the remote store.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ChatlineError::RemoteUnavailable { .. } | ChatlineError::SessionNotFound { .. }
        )
    }
}
