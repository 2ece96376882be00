// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracks which session is currently active.
//!
//! Every activation gets a fresh generation. Async work captures an
//! [`ActivationToken`] before suspending and checks it on completion, so
//! results that arrive after a deactivation (or a re-activation) are dropped.

use std::sync::{Mutex, MutexGuard};

use chatline_core::{ChatSession, SessionId};

/// Identity of one activation of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationToken {
    pub session_id: SessionId,
    generation: u64,
}

#[derive(Default)]
struct State {
    current: Option<(ChatSession, u64)>,
    next_generation: u64,
}

#[derive(Default)]
pub struct ActiveSession {
    state: Mutex<State>,
}

impl ActiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Makes `session` the active one, replacing any previous activation.
    pub fn activate(&self, session: ChatSession) -> ActivationToken {
        let mut state = self.lock();
        state.next_generation += 1;
        let generation = state.next_generation;
        let token = ActivationToken {
            session_id: session.session_id.clone(),
            generation,
        };
        state.current = Some((session, generation));
        token
    }

    /// Clears the active session, returning its id.
    pub fn deactivate(&self) -> Option<SessionId> {
        self.lock()
            .current
            .take()
            .map(|(session, _)| session.session_id)
    }

    pub fn current(&self) -> Option<ChatSession> {
        self.lock().current.as_ref().map(|(session, _)| session.clone())
    }

    pub fn token(&self) -> Option<ActivationToken> {
        self.lock()
            .current
            .as_ref()
            .map(|(session, generation)| ActivationToken {
                session_id: session.session_id.clone(),
                generation: *generation,
            })
    }

    /// True while the activation that produced `token` is still current.
    pub fn is_current(&self, token: &ActivationToken) -> bool {
        matches!(
            self.lock().current.as_ref(),
            Some((session, generation))
                if *generation == token.generation && session.session_id == token.session_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(id: &str) -> ChatSession {
        ChatSession {
            session_id: SessionId::from(id),
            display_name: format!("Visitor {id}"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_message_summary: None,
            unread_count: 0,
        }
    }

    #[test]
    fn token_goes_stale_after_deactivate() {
        let active = ActiveSession::new();
        let token = active.activate(session("s1"));
        assert!(active.is_current(&token));
        assert_eq!(active.deactivate(), Some(SessionId::from("s1")));
        assert!(!active.is_current(&token));
        assert!(active.current().is_none());
    }

    #[test]
    fn reactivation_invalidates_old_token() {
        let active = ActiveSession::new();
        let old = active.activate(session("s1"));
        let new = active.activate(session("s1"));
        assert!(!active.is_current(&old));
        assert!(active.is_current(&new));
        assert_eq!(active.token(), Some(new));
    }
}
