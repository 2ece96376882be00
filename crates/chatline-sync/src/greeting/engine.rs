// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent injection of the automated first message.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use chatline_config::model::GreetingConfig;
use chatline_core::{ChatlineError, Message, MessageStore};

use crate::active::{ActivationToken, ActiveSession};
use crate::pending::{LeaseGuard, LeaseKey, PendingSet};

use super::context::{GreetingCategory, GreetingContext};
use super::templates::{self, Greeting};
use super::{GreetingOutcome, GreetingState};

/// Chooses the greeting to send for `history`, if any.
///
/// An empty history or one without any greeting marker gets the generic
/// greeting. Otherwise a non-general context whose marker has not appeared
/// yet gets its contextual greeting.
pub fn decide(
    history: &[Message],
    context: Option<&GreetingContext>,
    support_name: &str,
) -> Option<Greeting> {
    let markers = templates::markers_in(history);
    if history.is_empty() || markers.is_empty() {
        return Some(templates::render_generic(support_name));
    }
    match context {
        Some(context)
            if context.category() != GreetingCategory::General
                && !markers.contains(&context.category()) =>
        {
            Some(templates::render(context, support_name))
        }
        _ => None,
    }
}

pub struct GreetingEngine {
    store: Arc<dyn MessageStore>,
    pending: PendingSet,
    active: Arc<ActiveSession>,
    enabled: bool,
    lease_ttl: Duration,
    support_name: String,
}

impl GreetingEngine {
    pub fn new(
        store: Arc<dyn MessageStore>,
        pending: PendingSet,
        active: Arc<ActiveSession>,
        config: &GreetingConfig,
    ) -> Self {
        Self {
            store,
            pending,
            active,
            enabled: config.enabled,
            lease_ttl: Duration::from_millis(config.lease_ttl_ms),
            support_name: config.support_name.clone(),
        }
    }

    /// Runs the greeting algorithm once for the activation behind `token`.
    ///
    /// A lease on `(session, requested category)` is taken before the first
    /// store call, so a concurrent invocation for the same key is a no-op.
    /// When history calls for a different category, its lease is taken too
    /// and history is read again: a greeting of that category may have been
    /// stored after the first read while its lease was held elsewhere.
    pub async fn run(
        &self,
        token: &ActivationToken,
        context: Option<&GreetingContext>,
    ) -> Result<GreetingOutcome, ChatlineError> {
        if !self.enabled {
            return Ok(GreetingOutcome::Disabled);
        }
        let session_id = &token.session_id;
        let requested = context
            .map(GreetingContext::category)
            .unwrap_or(GreetingCategory::General);

        let Some(_lease) = self.lease(token, requested) else {
            return Ok(GreetingOutcome::InProgress);
        };

        let Some(history) = self.current_history(token).await? else {
            return Ok(GreetingOutcome::Discarded);
        };
        let Some(mut greeting) = decide(&history, context, &self.support_name) else {
            return Ok(GreetingOutcome::AlreadyGreeted {
                state: GreetingState::from_history(&history),
            });
        };

        let _other_lease = if greeting.category != requested {
            let Some(lease) = self.lease(token, greeting.category) else {
                return Ok(GreetingOutcome::InProgress);
            };
            let Some(history) = self.current_history(token).await? else {
                return Ok(GreetingOutcome::Discarded);
            };
            // decide only yields the generic or the requested category, both leased now
            match decide(&history, context, &self.support_name) {
                Some(fresh) => greeting = fresh,
                None => {
                    return Ok(GreetingOutcome::AlreadyGreeted {
                        state: GreetingState::from_history(&history),
                    });
                }
            }
            Some(lease)
        } else {
            None
        };

        let category = greeting.category;
        let message = self.store.append(session_id, greeting.into_payload()).await?;
        if !self.active.is_current(token) {
            debug!(session_id = %session_id, category = %category, "greeting stored after deactivation");
            return Ok(GreetingOutcome::Discarded);
        }
        info!(session_id = %session_id, category = %category, message_id = %message.id, "greeting sent");
        Ok(GreetingOutcome::Sent { category, message })
    }

    fn lease(&self, token: &ActivationToken, category: GreetingCategory) -> Option<LeaseGuard> {
        let lease = self
            .pending
            .try_acquire(LeaseKey::new(&token.session_id, category), self.lease_ttl);
        if lease.is_none() {
            debug!(session_id = %token.session_id, category = %category, "greeting already in progress");
        }
        lease
    }

    /// Lists the session, or `None` if the activation went stale meanwhile.
    async fn current_history(
        &self,
        token: &ActivationToken,
    ) -> Result<Option<Vec<Message>>, ChatlineError> {
        let history = self.store.list(&token.session_id).await?;
        if !self.active.is_current(token) {
            debug!(session_id = %token.session_id, "stale greeting check discarded");
            return Ok(None);
        }
        Ok(Some(history))
    }
}
