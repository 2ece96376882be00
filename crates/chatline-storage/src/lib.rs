// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference store implementations for the Chatline sync core.
//!
//! [`MemoryStore`] plays the role of the remote real-time document store,
//! [`MemoryBlobStore`] the media content store, and the identity storages
//! persist the visitor id between runs.

pub mod blob;
pub mod identity;
pub mod memory;

pub use blob::MemoryBlobStore;
pub use identity::{FileIdentityStorage, MemoryIdentityStorage};
pub use memory::{MemoryStore, media_path};
