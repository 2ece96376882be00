// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ChatClient`: the facade the UI drives.
//!
//! Wires the identity provider, session manager, listener registry,
//! reconciler, send pipeline and greeting engine around one active session.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use chatline_config::ChatlineConfig;
use chatline_core::{
    ChatSession, ChatlineError, ClientRequestId, IdentityStorage, MediaBlob, Message,
    MessageStore, SessionId, SessionStore,
};

use crate::active::ActiveSession;
use crate::greeting::{GreetingContext, GreetingEngine, GreetingOutcome};
use crate::identity::VisitorIdentityProvider;
use crate::listener::ListenerManager;
use crate::pending::PendingSet;
use crate::pipeline::{MediaPolicy, SendPipeline, SendReceipt};
use crate::reconciler::Reconciler;
use crate::session::SessionManager;

/// Store adapters a [`ChatClient`] runs against.
#[derive(Clone)]
pub struct ChatStores {
    pub sessions: Arc<dyn SessionStore>,
    pub messages: Arc<dyn MessageStore>,
    pub identity: Arc<dyn IdentityStorage>,
}

struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ChatClient {
    identity: VisitorIdentityProvider,
    sessions: SessionManager,
    messages: Arc<dyn MessageStore>,
    active: Arc<ActiveSession>,
    reconciler: Arc<Reconciler>,
    listeners: ListenerManager,
    pipeline: SendPipeline,
    greeting: GreetingEngine,
    loading: AtomicUsize,
}

impl ChatClient {
    pub fn new(config: &ChatlineConfig, stores: ChatStores) -> Self {
        let pending = PendingSet::new();
        let active = Arc::new(ActiveSession::new());
        let reconciler = Arc::new(Reconciler::new(pending.clone()));
        let listeners = ListenerManager::new(stores.messages.clone(), reconciler.clone());
        let pipeline = SendPipeline::new(
            stores.messages.clone(),
            pending.clone(),
            reconciler.clone(),
            active.clone(),
            MediaPolicy::from_config(&config.media),
        );
        let greeting = GreetingEngine::new(
            stores.messages.clone(),
            pending,
            active.clone(),
            &config.greeting,
        );

        Self {
            identity: VisitorIdentityProvider::from_config(stores.identity, &config.visitor),
            sessions: SessionManager::new(stores.sessions, &config.session),
            messages: stores.messages,
            active,
            reconciler,
            listeners,
            pipeline,
            greeting,
            loading: AtomicUsize::new(0),
        }
    }

    /// Resolves the visitor's session, makes it active, subscribes to it and
    /// runs the greeting engine once.
    ///
    /// Subscription and greeting failures are logged and do not fail the
    /// activation; the session stays usable for sends.
    pub async fn activate(
        &self,
        context: Option<GreetingContext>,
    ) -> Result<ChatSession, ChatlineError> {
        let _loading = Loading::enter(&self.loading);
        let visitor_id = self.identity.get_or_create_visitor_id()?;
        let session = self.sessions.create_or_get_session(&visitor_id).await?;

        let token = match self.active.token() {
            Some(token) if token.session_id == session.session_id => token,
            current => {
                if current.is_some() {
                    self.deactivate();
                }
                let token = self.active.activate(session.clone());
                info!(session_id = %session.session_id, "session activated");
                self.reconciler.notify();
                token
            }
        };

        if let Err(err) = self.listeners.subscribe(&session.session_id).await {
            warn!(session_id = %session.session_id, error = %err, "live updates unavailable");
        }

        match self.greeting.run(&token, context.as_ref()).await {
            Ok(outcome) => {
                debug!(session_id = %session.session_id, outcome = ?outcome, "greeting evaluated")
            }
            Err(err) => {
                warn!(session_id = %session.session_id, error = %err, "greeting failed")
            }
        }

        Ok(session)
    }

    /// Leaves the active session: tears down its subscription and makes
    /// in-flight completions stale. Pending messages are kept.
    pub fn deactivate(&self) -> Option<SessionId> {
        let session_id = self.active.deactivate()?;
        self.listeners.unsubscribe(&session_id);
        self.reconciler.forget(&session_id);
        self.reconciler.notify();
        info!(session_id = %session_id, "session deactivated");
        Some(session_id)
    }

    pub fn current_session(&self) -> Option<ChatSession> {
        self.active.current()
    }

    /// Confirmed and pending messages of the active session, merged.
    pub fn merged_messages(&self) -> Vec<Message> {
        match self.active.current() {
            Some(session) => self.reconciler.merged(&session.session_id),
            None => Vec::new(),
        }
    }

    fn active_session_id(&self) -> Result<SessionId, ChatlineError> {
        self.active
            .current()
            .map(|session| session.session_id)
            .ok_or(ChatlineError::NoActiveSession)
    }

    pub async fn send(
        &self,
        text: &str,
        media: Option<MediaBlob>,
    ) -> Result<SendReceipt, ChatlineError> {
        let session_id = self.active_session_id()?;
        self.pipeline.send(&session_id, text, media).await
    }

    /// Re-sends a failed message with a fresh client request id.
    pub async fn retry(
        &self,
        client_request_id: &ClientRequestId,
    ) -> Result<SendReceipt, ChatlineError> {
        let session_id = self.active_session_id()?;
        self.pipeline.retry(&session_id, client_request_id).await
    }

    /// Runs the greeting engine against the active session.
    pub async fn trigger_greeting(
        &self,
        context: Option<GreetingContext>,
    ) -> Result<GreetingOutcome, ChatlineError> {
        let token = self.active.token().ok_or(ChatlineError::NoActiveSession)?;
        let _loading = Loading::enter(&self.loading);
        self.greeting.run(&token, context.as_ref()).await
    }

    /// Marks operator messages of the active session as read.
    pub async fn mark_read(&self) -> Result<(), ChatlineError> {
        let session_id = self.active_session_id()?;
        self.messages.mark_read(&session_id).await
    }

    pub fn is_sending(&self) -> bool {
        self.pipeline.is_sending()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    /// Version counter bumped whenever the merged view may have changed.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.reconciler.changes()
    }

    pub fn listeners(&self) -> &ListenerManager {
        &self.listeners
    }

    /// Tears down every subscription and clears the active session.
    pub fn shutdown(&self) {
        self.active.deactivate();
        self.listeners.cleanup();
        self.reconciler.notify();
        info!("chat client shut down");
    }
}
