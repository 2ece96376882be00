// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chatline sync core.
//!
//! This crate provides the domain types, the error type and the adapter
//! traits the sync core consumes. Store implementations live in
//! `chatline-storage` or in the embedding application.

pub mod error;
pub mod subscription;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChatlineError;
pub use subscription::Subscription;
pub use types::{
    ActionLink, AdapterType, ChatSession, ClientRequestId, DeliveryStatus, HealthStatus,
    LinkKind, MediaBlob, MediaType, Message, MessageId, MessagePayload, Sender, SessionId,
    VisitorId,
};

// Re-export all adapter traits at crate root.
pub use traits::{
    Adapter, BlobStore, IdentityStorage, MessageStore, MessagesObserver, SessionStore,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, secs: i64) -> Message {
        Message {
            id: MessageId::from(id),
            sender: Sender::Visitor,
            text: Some("hi".into()),
            media_url: None,
            media_type: None,
            timestamp: Utc.timestamp_opt(secs, 0).single().unwrap(),
            read: false,
            client_request_id: None,
            delivery_status: None,
            action_links: Vec::new(),
        }
    }

    #[test]
    fn adapter_type_display_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::SessionStore,
            AdapterType::MessageStore,
            AdapterType::BlobStore,
            AdapterType::IdentityStorage,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn sender_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Sender::Operator).unwrap(), "\"operator\"");
        assert_eq!(
            serde_json::to_string(&DeliveryStatus::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn chronological_breaks_ties_by_id() {
        let a = message("b", 10);
        let b = message("a", 10);
        let c = message("c", 5);
        let mut list = vec![a, b, c];
        list.sort_by(Message::chronological);
        let ids: Vec<_> = list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn summary_prefers_text_then_media_kind() {
        let mut m = message("m", 1);
        assert_eq!(m.summary(), "hi");
        m.text = None;
        m.media_type = Some(MediaType::Video);
        assert_eq!(m.summary(), "[video]");
    }

    #[test]
    fn media_blob_derives_kind_from_mime() {
        let png = MediaBlob::new("a.png", "image/png", vec![1]);
        let mp4 = MediaBlob::new("a.mp4", "Video/MP4", vec![1]);
        let pdf = MediaBlob::new("a.pdf", "application/pdf", vec![1]);
        assert_eq!(png.media_type(), Some(MediaType::Image));
        assert_eq!(mp4.media_type(), Some(MediaType::Video));
        assert_eq!(pdf.media_type(), None);
    }

    #[test]
    fn remote_errors_are_classified() {
        let err = ChatlineError::remote("append", "connection reset");
        assert!(err.is_remote());
        assert!(err.to_string().contains("append"));
        assert!(!ChatlineError::EmptyMessage.is_remote());
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _session(_: &dyn SessionStore) {}
        fn _messages(_: &dyn MessageStore) {}
        fn _blobs(_: &dyn BlobStore) {}
        fn _identity(_: &dyn IdentityStorage) {}
        fn _observer(_: &dyn MessagesObserver) {}
    }
}
