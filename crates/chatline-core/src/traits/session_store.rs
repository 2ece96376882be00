// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session store trait: one conversation record per visitor.

use async_trait::async_trait;

use crate::error::ChatlineError;
use crate::traits::adapter::Adapter;
use crate::types::{ChatSession, VisitorId};

/// Adapter over the remote collection of chat sessions.
#[async_trait]
pub trait SessionStore: Adapter {
    /// Returns the session keyed by `visitor_id`, creating it with zeroed
    /// counters if absent.
    ///
    /// Implementations must use create-if-absent-by-key semantics so that
    /// concurrent calls for the same visitor observe a single session.
    async fn create_or_get_session(
        &self,
        visitor_id: &VisitorId,
        display_name: &str,
    ) -> Result<ChatSession, ChatlineError>;
}
