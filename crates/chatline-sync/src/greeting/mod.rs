// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contextual greeting engine.
//!
//! Injects at most one generic welcome per session, plus at most one
//! contextual greeting per category, tailored to how the visitor arrived.

pub mod context;
pub mod engine;
pub mod templates;

use serde::Serialize;

use chatline_core::Message;

pub use context::{GreetingCategory, GreetingContext, InquiryKind, WishlistItem, wishlist_total};
pub use engine::{GreetingEngine, decide};
pub use templates::{Greeting, marker, markers_in, render, render_generic};

/// Greeting progress of a session, derived from its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GreetingState {
    NoGreetingSent,
    GenericGreetingSent,
    /// The most recent contextual greeting in the history.
    ContextualGreetingSent(GreetingCategory),
}

impl GreetingState {
    pub fn from_history(history: &[Message]) -> Self {
        let latest_contextual = history
            .iter()
            .rev()
            .filter_map(|m| {
                markers_in(std::slice::from_ref(m))
                    .into_iter()
                    .find(|c| *c != GreetingCategory::General)
            })
            .next();
        match latest_contextual {
            Some(category) => GreetingState::ContextualGreetingSent(category),
            None if markers_in(history).contains(&GreetingCategory::General) => {
                GreetingState::GenericGreetingSent
            }
            None => GreetingState::NoGreetingSent,
        }
    }
}

/// Result of one greeting invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GreetingOutcome {
    Sent {
        category: GreetingCategory,
        message: Message,
    },
    /// Nothing to send for this history and context.
    AlreadyGreeted { state: GreetingState },
    /// Another invocation holds the lease for this greeting.
    InProgress,
    Disabled,
    /// The session stopped being active while the greeting was running.
    Discarded,
}

impl GreetingOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, GreetingOutcome::Sent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::{MessageId, Sender};
    use chrono::Utc;

    fn operator(text: String) -> Message {
        Message {
            id: MessageId::from("m"),
            sender: Sender::Operator,
            text: Some(text),
            media_url: None,
            media_type: None,
            timestamp: Utc::now(),
            read: false,
            client_request_id: None,
            delivery_status: None,
            action_links: Vec::new(),
        }
    }

    #[test]
    fn state_tracks_latest_greeting() {
        assert_eq!(GreetingState::from_history(&[]), GreetingState::NoGreetingSent);

        let generic = operator(render_generic("Support").text);
        assert_eq!(
            GreetingState::from_history(std::slice::from_ref(&generic)),
            GreetingState::GenericGreetingSent
        );

        let offer = operator(
            render(
                &GreetingContext::OfferReference {
                    offer_id: "o1".into(),
                    title: None,
                },
                "Support",
            )
            .text,
        );
        assert_eq!(
            GreetingState::from_history(&[generic, offer]),
            GreetingState::ContextualGreetingSent(GreetingCategory::OfferReference)
        );
    }
}
