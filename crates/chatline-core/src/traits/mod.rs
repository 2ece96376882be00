// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the stores the sync core talks to.
//!
//! All adapters extend the [`Adapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod blob;
pub mod identity;
pub mod message_store;
pub mod observer;
pub mod session_store;

pub use adapter::Adapter;
pub use blob::BlobStore;
pub use identity::IdentityStorage;
pub use message_store::MessageStore;
pub use observer::MessagesObserver;
pub use session_store::SessionStore;
