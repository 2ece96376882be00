// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the adapter traits and the sync core.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Stable anonymous identifier of a visitor's device.
    VisitorId
);
string_id!(
    /// Identifier of a chat session. Equal to the owning visitor's id.
    SessionId
);
string_id!(
    /// Identifier of a message, assigned by the store.
    MessageId
);
string_id!(
    /// Client-generated correlation token linking a pending send to its confirmed copy.
    ClientRequestId
);

impl From<&VisitorId> for SessionId {
    fn from(visitor: &VisitorId) -> Self {
        SessionId(visitor.0.clone())
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    SessionStore,
    MessageStore,
    BlobStore,
    IdentityStorage,
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sender {
    Visitor,
    Operator,
}

/// Kind of media attached to a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

/// Delivery state of a visitor-originated message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Confirmed,
    Failed,
}

/// How an action link's target is interpreted by the UI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkKind {
    /// In-app navigation path.
    Route,
    /// Absolute URL opened outside the app.
    External,
}

/// A labelled link rendered below a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLink {
    pub label: String,
    pub target: String,
    pub kind: LinkKind,
}

impl ActionLink {
    pub fn route(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
            kind: LinkKind::Route,
        }
    }
}

/// The single support conversation of a visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: SessionId,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_summary: Option<String>,
    pub unread_count: u32,
}

/// A chat message, either confirmed by the store or pending locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<ClientRequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_links: Vec<ActionLink>,
}

impl Message {
    /// Total order used by every message list: timestamp, then id.
    pub fn chronological(a: &Message, b: &Message) -> Ordering {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn is_pending(&self) -> bool {
        self.delivery_status == Some(DeliveryStatus::Pending)
    }

    pub fn is_failed(&self) -> bool {
        self.delivery_status == Some(DeliveryStatus::Failed)
    }

    /// Short preview used for `ChatSession::last_message_summary`.
    pub fn summary(&self) -> String {
        match (&self.text, self.media_type) {
            (Some(text), _) if !text.trim().is_empty() => text.chars().take(80).collect(),
            (_, Some(MediaType::Image)) => "[image]".to_string(),
            (_, Some(MediaType::Video)) => "[video]".to_string(),
            _ => String::new(),
        }
    }
}

/// The body of an append request. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<ClientRequestId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_links: Vec<ActionLink>,
}

impl MessagePayload {
    /// A plain text payload from the given sender.
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: Some(text.into()),
            media_url: None,
            media_type: None,
            client_request_id: None,
            action_links: Vec::new(),
        }
    }
}

/// A media file the visitor attaches to a send.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl MediaBlob {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Media kind derived from the MIME type, if it is an image or video.
    pub fn media_type(&self) -> Option<MediaType> {
        let essence = self.content_type.trim().to_ascii_lowercase();
        if essence.starts_with("image/") {
            Some(MediaType::Image)
        } else if essence.starts_with("video/") {
            Some(MediaType::Video)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBlob")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
