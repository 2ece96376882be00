// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end sync tests.
//!
//! `TestHarness` assembles a `ChatClient` over a [`FlakyStore`] and an
//! in-memory identity storage. Greetings are off unless the builder enables
//! them, so message-flow tests start from an empty conversation.

use std::sync::Arc;

use chatline_config::ChatlineConfig;
use chatline_core::{
    ChatSession, ChatlineError, IdentityStorage, Message, MessagePayload, MessageStore, Sender,
    SessionId,
};
use chatline_storage::MemoryIdentityStorage;
use chatline_sync::{ChatClient, ChatStores};

use crate::flaky_store::FlakyStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ChatlineConfig,
    store: Option<Arc<FlakyStore>>,
    visitor_id: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ChatlineConfig::default();
        config.greeting.enabled = false;
        Self {
            config,
            store: None,
            visitor_id: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: ChatlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the greeting engine on activation.
    pub fn with_greeting(mut self) -> Self {
        self.config.greeting.enabled = true;
        self
    }

    /// Share an existing store, e.g. between two harnesses.
    pub fn with_store(mut self, store: Arc<FlakyStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Pre-seed the persisted visitor id.
    pub fn with_visitor_id(mut self, visitor_id: impl Into<String>) -> Self {
        self.visitor_id = Some(visitor_id.into());
        self
    }

    pub fn build(self) -> Result<TestHarness, ChatlineError> {
        let store = self.store.unwrap_or_else(|| Arc::new(FlakyStore::new()));
        let identity = Arc::new(MemoryIdentityStorage::new());
        if let Some(visitor_id) = &self.visitor_id {
            identity.store(&self.config.visitor.storage_key, visitor_id)?;
        }

        let client = ChatClient::new(
            &self.config,
            ChatStores {
                sessions: store.clone(),
                messages: store.clone(),
                identity: identity.clone(),
            },
        );

        Ok(TestHarness {
            client,
            store,
            identity,
            config: self.config,
        })
    }
}

/// A `ChatClient` wired to a fault-injecting store.
pub struct TestHarness {
    pub client: ChatClient,
    /// The store behind the client; use `store.inner()` to act as the operator.
    pub store: Arc<FlakyStore>,
    pub identity: Arc<MemoryIdentityStorage>,
    pub config: ChatlineConfig,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Activate the visitor's session without a greeting context.
    pub async fn activate(&self) -> Result<ChatSession, ChatlineError> {
        self.client.activate(None).await
    }

    pub fn session_id(&self) -> Result<SessionId, ChatlineError> {
        self.client
            .current_session()
            .map(|session| session.session_id)
            .ok_or(ChatlineError::NoActiveSession)
    }

    /// Append an operator message to the active session, bypassing faults.
    pub async fn operator_reply(&self, text: &str) -> Result<Message, ChatlineError> {
        let session_id = self.session_id()?;
        self.store
            .inner()
            .append(&session_id, MessagePayload::text(Sender::Operator, text))
            .await
    }

    /// Confirmed messages as the store holds them.
    pub async fn stored_messages(&self) -> Result<Vec<Message>, ChatlineError> {
        let session_id = self.session_id()?;
        self.store.inner().list(&session_id).await
    }
}
