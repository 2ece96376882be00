// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat synchronization core.
//!
//! Keeps a locally-optimistic view of one visitor's support conversation
//! consistent with a remote real-time message store:
//!
//! - **Identity**: stable anonymous visitor id ([`VisitorIdentityProvider`])
//! - **Sessions**: create-or-get of the single conversation ([`SessionManager`])
//! - **Listeners**: at most one live subscription per session ([`ListenerManager`])
//! - **Reconciliation**: confirmed snapshot + pending sends, deduplicated and
//!   ordered ([`Reconciler`], [`reconcile`])
//! - **Sends**: optimistic publish, in-place failure flagging ([`SendPipeline`])
//! - **Greetings**: idempotent contextual first message ([`GreetingEngine`])
//!
//! [`ChatClient`] wires them together.

pub mod active;
pub mod client;
pub mod greeting;
pub mod identity;
pub mod listener;
pub mod pending;
pub mod pipeline;
pub mod reconciler;
pub mod session;

pub use active::{ActivationToken, ActiveSession};
pub use client::{ChatClient, ChatStores};
pub use greeting::{
    GreetingCategory, GreetingContext, GreetingEngine, GreetingOutcome, GreetingState,
    WishlistItem,
};
pub use identity::VisitorIdentityProvider;
pub use listener::ListenerManager;
pub use pending::{LeaseGuard, LeaseKey, PendingEntry, PendingSet};
pub use pipeline::{MediaPolicy, SendPipeline, SendReceipt};
pub use reconciler::{Reconciler, reconcile};
pub use session::{SessionManager, display_name};
