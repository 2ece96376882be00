// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cloneable handle to a live real-time subscription.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Teardown = Box<dyn FnOnce() + Send>;

/// Handle returned by [`MessageStore::subscribe`](crate::MessageStore::subscribe).
///
/// Clones share the same underlying subscription. Calling
/// [`unsubscribe`](Self::unsubscribe) from any clone runs the store's
/// teardown exactly once.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    active: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

impl Subscription {
    /// Wraps a store-specific teardown closure.
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                active: AtomicBool::new(true),
                teardown: Mutex::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// Tears down the remote subscription. Idempotent.
    pub fn unsubscribe(&self) {
        if !self.inner.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let teardown = match self.inner.teardown.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Marks the subscription as closed without running the teardown.
    ///
    /// Used when the store itself dropped the subscription.
    pub fn mark_closed(&self) {
        self.inner.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// True when both handles refer to the same underlying subscription.
    pub fn same_as(&self, other: &Subscription) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
