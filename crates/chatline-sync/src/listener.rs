// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry guaranteeing at most one live real-time subscription per session.
//!
//! Each registry slot owns a `OnceCell`, so concurrent first subscribes await
//! the same connect instead of opening a second remote subscription. Slots
//! carry a generation; callbacks and late connects from a slot that has since
//! been removed are treated as stale.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use chatline_core::{ChatlineError, Message, MessageStore, MessagesObserver, SessionId, Subscription};

struct Slot {
    generation: u64,
    cell: OnceCell<Subscription>,
}

impl Slot {
    fn is_live(&self) -> bool {
        self.cell.get().is_some_and(Subscription::is_active)
    }
}

type Registry = Mutex<HashMap<SessionId, Arc<Slot>>>;

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<SessionId, Arc<Slot>>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn is_registered(registry: &Registry, session_id: &SessionId, generation: u64) -> bool {
    lock_registry(registry)
        .get(session_id)
        .is_some_and(|slot| slot.generation == generation)
}

/// Observer handed to the store; filters stale callbacks and clears the
/// registry entry when the store reports a subscription error.
struct SlotObserver {
    registry: Weak<Registry>,
    generation: u64,
    downstream: Arc<dyn MessagesObserver>,
}

impl MessagesObserver for SlotObserver {
    fn on_messages_changed(&self, session_id: &SessionId, messages: &[Message]) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if !is_registered(&registry, session_id, self.generation) {
            debug!(session_id = %session_id, "stale snapshot discarded");
            return;
        }
        self.downstream.on_messages_changed(session_id, messages);
    }

    fn on_subscription_error(&self, session_id: &SessionId, error: &ChatlineError) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let removed = {
            let mut slots = lock_registry(&registry);
            match slots.get(session_id) {
                Some(slot) if slot.generation == self.generation => slots.remove(session_id),
                _ => None,
            }
        };
        if removed.is_none() {
            debug!(session_id = %session_id, "stale subscription error discarded");
            return;
        }
        warn!(session_id = %session_id, error = %error, "subscription dropped");
        self.downstream.on_subscription_error(session_id, error);
    }
}

/// Owns the session → subscription registry.
pub struct ListenerManager {
    store: Arc<dyn MessageStore>,
    observer: Arc<dyn MessagesObserver>,
    registry: Arc<Registry>,
    next_generation: AtomicU64,
}

impl ListenerManager {
    /// `observer` receives every snapshot and subscription error, normally
    /// the [`Reconciler`](crate::Reconciler).
    pub fn new(store: Arc<dyn MessageStore>, observer: Arc<dyn MessagesObserver>) -> Self {
        Self {
            store,
            observer,
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Returns the live subscription for `session_id`, opening one if needed.
    ///
    /// Concurrent callers share a single connect. If the entry was removed
    /// while connecting, the new subscription is torn down immediately and
    /// returned inactive.
    pub async fn subscribe(&self, session_id: &SessionId) -> Result<Subscription, ChatlineError> {
        let slot = {
            let mut slots = lock_registry(&self.registry);
            if slots.get(session_id).is_some_and(|slot| {
                slot.cell.get().is_some_and(|sub| !sub.is_active())
            }) {
                slots.remove(session_id);
            }
            slots
                .entry(session_id.clone())
                .or_insert_with(|| {
                    Arc::new(Slot {
                        generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
                        cell: OnceCell::new(),
                    })
                })
                .clone()
        };

        let observer: Arc<dyn MessagesObserver> = Arc::new(SlotObserver {
            registry: Arc::downgrade(&self.registry),
            generation: slot.generation,
            downstream: self.observer.clone(),
        });
        let connect = slot
            .cell
            .get_or_try_init(|| async move {
                let subscription = self.store.subscribe(session_id, observer).await?;
                info!(session_id = %session_id, "subscription opened");
                Ok::<_, ChatlineError>(subscription)
            })
            .await;

        let subscription = match connect {
            Ok(subscription) => subscription.clone(),
            Err(err) => {
                let mut slots = lock_registry(&self.registry);
                if slots
                    .get(session_id)
                    .is_some_and(|s| Arc::ptr_eq(s, &slot) && s.cell.get().is_none())
                {
                    slots.remove(session_id);
                }
                warn!(session_id = %session_id, error = %err, "subscribe failed");
                return Err(err);
            }
        };

        if !is_registered(&self.registry, session_id, slot.generation) {
            debug!(session_id = %session_id, "stale subscription torn down");
            subscription.unsubscribe();
        }
        Ok(subscription)
    }

    /// Tears down the subscription of a session, if any.
    pub fn unsubscribe(&self, session_id: &SessionId) -> bool {
        let slot = lock_registry(&self.registry).remove(session_id);
        match slot {
            Some(slot) => {
                if let Some(subscription) = slot.cell.get() {
                    subscription.unsubscribe();
                    info!(session_id = %session_id, "subscription closed");
                }
                true
            }
            None => false,
        }
    }

    /// Tears down every subscription.
    pub fn cleanup(&self) {
        let slots: Vec<(SessionId, Arc<Slot>)> = lock_registry(&self.registry).drain().collect();
        for (session_id, slot) in slots {
            if let Some(subscription) = slot.cell.get() {
                subscription.unsubscribe();
                info!(session_id = %session_id, "subscription closed");
            }
        }
    }

    /// Number of sessions with a connected, active subscription.
    pub fn live_count(&self) -> usize {
        lock_registry(&self.registry)
            .values()
            .filter(|slot| slot.is_live())
            .count()
    }

    pub fn is_subscribed(&self, session_id: &SessionId) -> bool {
        lock_registry(&self.registry)
            .get(session_id)
            .is_some_and(|slot| slot.is_live())
    }
}

impl Drop for ListenerManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}
