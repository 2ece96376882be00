// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic greeting texts and the markers that identify them in history.
//!
//! Every greeting opens with its category's marker phrase; history scans look
//! for those phrases in operator messages.

use std::collections::BTreeSet;

use strum::IntoEnumIterator;

use chatline_core::{ActionLink, Message, MessagePayload, Sender};

use super::context::{GreetingCategory, GreetingContext, InquiryKind, WishlistItem};

/// Marker phrase that opens the greeting of `category`.
pub fn marker(category: GreetingCategory) -> &'static str {
    match category {
        GreetingCategory::General => "Welcome to live chat!",
        GreetingCategory::BotSubscription => "Thanks for your interest in a bot subscription.",
        GreetingCategory::AccountInquiry => "Thanks for reaching out about an account.",
        GreetingCategory::GemPurchase => "Thanks for your gem order request.",
        GreetingCategory::DiamondPurchase => "Thanks for your diamond order request.",
        GreetingCategory::OfferReference => "Thanks for your interest in this offer.",
        GreetingCategory::ProductReference => "Thanks for your interest in this product.",
    }
}

/// Greeting categories whose marker appears in an operator message.
pub fn markers_in(messages: &[Message]) -> BTreeSet<GreetingCategory> {
    let mut found = BTreeSet::new();
    for message in messages.iter().filter(|m| m.sender == Sender::Operator) {
        let Some(text) = message.text.as_deref() else {
            continue;
        };
        for category in GreetingCategory::iter() {
            if text.contains(marker(category)) {
                found.insert(category);
            }
        }
    }
    found
}

/// A rendered greeting, ready to append as an operator message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub category: GreetingCategory,
    pub text: String,
    pub action_links: Vec<ActionLink>,
}

impl Greeting {
    pub fn into_payload(self) -> MessagePayload {
        MessagePayload {
            sender: Sender::Operator,
            text: Some(self.text),
            media_url: None,
            media_type: None,
            client_request_id: None,
            action_links: self.action_links,
        }
    }
}

pub fn render_generic(support_name: &str) -> Greeting {
    Greeting {
        category: GreetingCategory::General,
        text: format!(
            "{} You're chatting with {support_name}. How can we help you today?",
            marker(GreetingCategory::General)
        ),
        action_links: Vec::new(),
    }
}

/// Renders the greeting for `context`. Same input, same output.
pub fn render(context: &GreetingContext, support_name: &str) -> Greeting {
    let category = context.category();
    let opener = marker(category);
    let (body, action_links) = match context {
        GreetingContext::General => return render_generic(support_name),
        GreetingContext::BotSubscription { plan, duration } => {
            let term = duration
                .as_deref()
                .map(|d| format!(" for {d}"))
                .unwrap_or_default();
            (
                format!("You asked about the {plan} plan{term}. {support_name} will confirm availability and payment options."),
                vec![ActionLink::route("View plans", "/bots/plans")],
            )
        }
        GreetingContext::AccountInquiry { kind, account } => {
            let topic = match kind {
                InquiryKind::Buy => "buying an account",
                InquiryKind::Sell => "selling an account",
                InquiryKind::General => "an account",
            };
            let reference = account
                .as_deref()
                .map(|a| format!(" (reference {a})"))
                .unwrap_or_default();
            let link = match account {
                Some(a) => ActionLink::route("View account", format!("/accounts/{a}")),
                None => ActionLink::route("Browse accounts", "/accounts"),
            };
            (
                format!("You'd like help with {topic}{reference}. {support_name} will guide you through the next steps."),
                vec![link],
            )
        }
        GreetingContext::GemPurchase { items } => (
            wishlist_body(items, "gems", support_name),
            vec![ActionLink::route("View gem packages", "/gems")],
        ),
        GreetingContext::DiamondPurchase { items } => (
            wishlist_body(items, "diamonds", support_name),
            vec![ActionLink::route("View diamond packages", "/diamonds")],
        ),
        GreetingContext::OfferReference { offer_id, title } => {
            let label = title.as_deref().unwrap_or(offer_id);
            (
                format!("You were looking at \"{label}\" (offer {offer_id}). {support_name} can answer any questions about it."),
                vec![ActionLink::route("View offer", format!("/offers/{offer_id}"))],
            )
        }
        GreetingContext::ProductReference { slug, name } => {
            let label = name.as_deref().unwrap_or(slug);
            (
                format!("You were looking at \"{label}\". {support_name} can answer any questions about it."),
                vec![ActionLink::route("View product", format!("/products/{slug}"))],
            )
        }
    };

    Greeting {
        category,
        text: format!("{opener} {body}"),
        action_links,
    }
}

fn wishlist_body(items: &[WishlistItem], unit: &str, support_name: &str) -> String {
    let total = items
        .iter()
        .map(WishlistItem::subtotal)
        .fold(0u64, u64::saturating_add);
    let mut body = String::from("Here is your wishlist:");
    for item in items {
        body.push_str(&format!(
            "\n- {} x{} = {} {unit}",
            item.name,
            item.quantity,
            item.subtotal()
        ));
    }
    body.push_str(&format!("\nTotal: {total} {unit}"));
    body.push_str(&format!("\n{support_name} will confirm the order shortly."));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::MessageId;
    use chrono::Utc;

    fn operator(text: &str) -> Message {
        Message {
            id: MessageId::from("m"),
            sender: Sender::Operator,
            text: Some(text.to_string()),
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
    fn gem_wishlist_is_itemized_with_computed_total() {
        let context = GreetingContext::GemPurchase {
            items: vec![
                WishlistItem {
                    name: "Speed Up".into(),
                    quantity: 3,
                    unit_cost: 10,
                },
                WishlistItem {
                    name: "Shield".into(),
                    quantity: 1,
                    unit_cost: 25,
                },
            ],
        };
        let greeting = render(&context, "Support");
        assert!(greeting.text.starts_with(marker(GreetingCategory::GemPurchase)));
        assert!(greeting.text.contains("Speed Up x3 = 30 gems"));
        assert!(greeting.text.contains("Shield x1 = 25 gems"));
        assert!(greeting.text.contains("Total: 55 gems"));
        assert_eq!(greeting, render(&context, "Support"));
    }

    #[test]
    fn huge_wishlist_renders_saturated_total() {
        let context = GreetingContext::DiamondPurchase {
            items: vec![
                WishlistItem {
                    name: "Vault".into(),
                    quantity: 2,
                    unit_cost: u64::MAX,
                },
                WishlistItem {
                    name: "Key".into(),
                    quantity: 1,
                    unit_cost: 1,
                },
            ],
        };
        let greeting = render(&context, "Support");
        assert!(greeting.text.contains(&format!("Total: {} diamonds", u64::MAX)));
    }

    #[test]
    fn every_rendered_greeting_carries_its_marker() {
        let contexts = [
            GreetingContext::General,
            GreetingContext::BotSubscription {
                plan: "Pro".into(),
                duration: Some("30 days".into()),
            },
            GreetingContext::AccountInquiry {
                kind: InquiryKind::Sell,
                account: Some("acc-7".into()),
            },
            GreetingContext::DiamondPurchase { items: Vec::new() },
            GreetingContext::OfferReference {
                offer_id: "o1".into(),
                title: None,
            },
            GreetingContext::ProductReference {
                slug: "dragon-pack".into(),
                name: Some("Dragon Pack".into()),
            },
        ];
        for context in &contexts {
            let greeting = render(context, "Support");
            let found = markers_in(&[operator(&greeting.text)]);
            assert_eq!(found, BTreeSet::from([context.category()]), "{context:?}");
        }
    }

    #[test]
    fn visitor_messages_are_not_scanned() {
        let mut message = operator(marker(GreetingCategory::General));
        message.sender = Sender::Visitor;
        assert!(markers_in(&[message]).is_empty());
    }

    #[test]
    fn reference_greetings_link_to_routes() {
        let greeting = render(
            &GreetingContext::ProductReference {
                slug: "dragon-pack".into(),
                name: None,
            },
            "Support",
        );
        assert_eq!(greeting.action_links[0].target, "/products/dragon-pack");
        assert!(greeting.text.contains("\"dragon-pack\""));
    }
}
