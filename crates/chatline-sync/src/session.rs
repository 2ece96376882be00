// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lookup and creation.

use std::sync::Arc;

use tracing::{debug, warn};

use chatline_config::model::SessionConfig;
use chatline_core::{ChatSession, ChatlineError, SessionStore, VisitorId};

/// Display name for a new session: `"<prefix> <first 6 chars of id>"`.
pub fn display_name(prefix: &str, visitor_id: &VisitorId) -> String {
    let short: String = visitor_id.as_str().chars().take(6).collect();
    format!("{prefix} {short}")
}

/// Creates or fetches the single conversation of a visitor.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    display_name_prefix: String,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Self {
        Self {
            store,
            display_name_prefix: config.display_name_prefix.clone(),
        }
    }

    /// Looks up the session keyed by `visitor_id`, creating it if absent.
    ///
    /// Relies on the store's create-if-absent semantics; never builds a
    /// session locally when the store fails.
    pub async fn create_or_get_session(
        &self,
        visitor_id: &VisitorId,
    ) -> Result<ChatSession, ChatlineError> {
        let name = display_name(&self.display_name_prefix, visitor_id);
        match self.store.create_or_get_session(visitor_id, &name).await {
            Ok(session) => {
                debug!(session_id = %session.session_id, "session resolved");
                Ok(session)
            }
            Err(err) => {
                warn!(visitor_id = %visitor_id, error = %err, "session lookup failed");
                if err.is_remote() {
                    Err(err)
                } else {
                    Err(ChatlineError::remote("create_or_get_session", err))
                }
            }
        }
    }
}
