// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Greeting categories and the entry context that selects them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

/// Which automated greeting template applies.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum GreetingCategory {
    #[strum(to_string = "general", serialize = "navbar", serialize = "generic")]
    General,
    #[strum(to_string = "bot_subscription", serialize = "bots", serialize = "bot")]
    BotSubscription,
    #[strum(to_string = "account_inquiry", serialize = "accounts", serialize = "account")]
    AccountInquiry,
    #[strum(to_string = "gem_purchase", serialize = "gems")]
    GemPurchase,
    #[strum(to_string = "diamond_purchase", serialize = "diamonds")]
    DiamondPurchase,
    #[strum(to_string = "offer_reference", serialize = "offer", serialize = "offers")]
    OfferReference,
    #[strum(to_string = "product_reference", serialize = "product", serialize = "products")]
    ProductReference,
}

/// What an account inquiry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InquiryKind {
    Buy,
    Sell,
    #[default]
    General,
}

/// One line of a gem or diamond wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub name: String,
    pub quantity: u32,
    #[serde(alias = "gemCost", alias = "diamondCost", alias = "cost", alias = "unitCost")]
    pub unit_cost: u64,
}

impl WishlistItem {
    /// Quantity times unit cost, or `None` when it does not fit in a `u64`.
    pub fn checked_subtotal(&self) -> Option<u64> {
        u64::from(self.quantity).checked_mul(self.unit_cost)
    }

    /// Saturating subtotal for display.
    pub fn subtotal(&self) -> u64 {
        u64::from(self.quantity).saturating_mul(self.unit_cost)
    }
}

/// Sum of all subtotals, or `None` on overflow.
pub fn wishlist_total(items: &[WishlistItem]) -> Option<u64> {
    items
        .iter()
        .try_fold(0u64, |total, item| total.checked_add(item.checked_subtotal()?))
}

/// Wishlist as it arrives in entry parameters: a bare item list, or an
/// object whose caller-supplied total is ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum WishlistParam {
    Items(Vec<WishlistItem>),
    Wrapped { items: Vec<WishlistItem> },
}

/// How the visitor arrived at the chat; selects the contextual greeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum GreetingContext {
    General,
    BotSubscription {
        plan: String,
        duration: Option<String>,
    },
    AccountInquiry {
        kind: InquiryKind,
        account: Option<String>,
    },
    GemPurchase {
        items: Vec<WishlistItem>,
    },
    DiamondPurchase {
        items: Vec<WishlistItem>,
    },
    OfferReference {
        offer_id: String,
        title: Option<String>,
    },
    ProductReference {
        slug: String,
        name: Option<String>,
    },
}

impl GreetingContext {
    pub fn category(&self) -> GreetingCategory {
        match self {
            GreetingContext::General => GreetingCategory::General,
            GreetingContext::BotSubscription { .. } => GreetingCategory::BotSubscription,
            GreetingContext::AccountInquiry { .. } => GreetingCategory::AccountInquiry,
            GreetingContext::GemPurchase { .. } => GreetingCategory::GemPurchase,
            GreetingContext::DiamondPurchase { .. } => GreetingCategory::DiamondPurchase,
            GreetingContext::OfferReference { .. } => GreetingCategory::OfferReference,
            GreetingContext::ProductReference { .. } => GreetingCategory::ProductReference,
        }
    }

    /// Builds a context from navigation parameters.
    ///
    /// Recognised keys: `source`, `product`, `product_name`, `offer`,
    /// `offer_title`, `plan`, `duration`, `inquiry`, `account` and `wishlist`
    /// (JSON). Without a `source`, the category is inferred from the payload
    /// keys present. Returns `None` when nothing identifies an entry surface;
    /// a recognised category with a missing or malformed payload degrades to
    /// [`GreetingContext::General`].
    pub fn from_entry_params<I, K, V>(params: I) -> Option<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim().to_string(), v.as_ref().trim().to_string()))
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let category = match get("source") {
            Some(source) => match GreetingCategory::from_str(&source) {
                Ok(category) => category,
                Err(_) => {
                    warn!(source = %source, "unknown chat entry source");
                    return None;
                }
            },
            None => {
                if get("wishlist").is_some() {
                    GreetingCategory::GemPurchase
                } else if get("offer").is_some() {
                    GreetingCategory::OfferReference
                } else if get("product").is_some() {
                    GreetingCategory::ProductReference
                } else if get("plan").is_some() {
                    GreetingCategory::BotSubscription
                } else if get("inquiry").is_some() {
                    GreetingCategory::AccountInquiry
                } else {
                    return None;
                }
            }
        };

        let context = match category {
            GreetingCategory::General => Some(GreetingContext::General),
            GreetingCategory::BotSubscription => get("plan").map(|plan| {
                GreetingContext::BotSubscription {
                    plan,
                    duration: get("duration"),
                }
            }),
            GreetingCategory::AccountInquiry => Some(GreetingContext::AccountInquiry {
                kind: get("inquiry")
                    .and_then(|kind| InquiryKind::from_str(&kind).ok())
                    .unwrap_or_default(),
                account: get("account"),
            }),
            GreetingCategory::GemPurchase => {
                parse_wishlist(get("wishlist")).map(|items| GreetingContext::GemPurchase { items })
            }
            GreetingCategory::DiamondPurchase => parse_wishlist(get("wishlist"))
                .map(|items| GreetingContext::DiamondPurchase { items }),
            GreetingCategory::OfferReference => {
                get("offer").map(|offer_id| GreetingContext::OfferReference {
                    offer_id,
                    title: get("offer_title"),
                })
            }
            GreetingCategory::ProductReference => {
                get("product").map(|slug| GreetingContext::ProductReference {
                    slug,
                    name: get("product_name"),
                })
            }
        };

        match context {
            Some(context) => Some(context),
            None => {
                warn!(category = %category, "incomplete entry parameters; using general greeting");
                Some(GreetingContext::General)
            }
        }
    }
}

fn parse_wishlist(raw: Option<String>) -> Option<Vec<WishlistItem>> {
    let raw = raw?;
    match serde_json::from_str::<WishlistParam>(&raw) {
        Ok(WishlistParam::Items(items) | WishlistParam::Wrapped { items }) if !items.is_empty() => {
            if wishlist_total(&items).is_none() {
                warn!(items = items.len(), "wishlist total overflows");
                return None;
            }
            Some(items)
        }
        Ok(_) => None,
        Err(err) => {
            warn!(error = %err, "malformed wishlist parameter");
            None
        }
    }
}
