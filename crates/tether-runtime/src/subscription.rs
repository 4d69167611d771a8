#![forbid(unsafe_code)]

//! Store subscription lifecycle for one mounted connection.
//!
//! # State machine
//!
//! ```text
//!  Detached ──subscribe──▶ Subscribed ──unmount──▶ Unmounting ──▶ Unmounted
//!     │                        │                                     ▲
//!     │                        └──detach (hot swap)──▶ Detached      │
//!     └───────────────────────unmount────────────────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. At most one store subscription is held at any time.
//! 2. The unsubscribe token is released exactly once: it is moved out of
//!    its slot before being called.
//! 3. The pending-unmount flag is raised *before* the token is released, so
//!    a notification racing the teardown (e.g. a store iterating a listener
//!    snapshot) observes it and does nothing.
//! 4. `Unmounted` is terminal.

use std::cell::{Cell, RefCell};

use tether_core::{Listener, StoreRef, Unsubscribe};

/// Lifecycle phase of one mounted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mounted, not listening to the store.
    Detached,
    /// Mounted and listening.
    Subscribed,
    /// Teardown in progress.
    Unmounting,
    /// Torn down.
    Unmounted,
}

#[derive(Debug)]
pub struct SubscriptionManager {
    phase: Cell<Phase>,
    token: RefCell<Option<Unsubscribe>>,
    subscribes: Cell<u32>,
    releases: Cell<u32>,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Cell::new(Phase::Detached),
            token: RefCell::new(None),
            subscribes: Cell::new(0),
            releases: Cell::new(0),
        }
    }

    /// Register `listener` with `store`. Returns `false` without touching
    /// the store unless the manager is `Detached`.
    pub fn subscribe(&self, store: &StoreRef, listener: Listener) -> bool {
        if self.phase.get() != Phase::Detached {
            return false;
        }
        let token = store.subscribe(listener);
        *self.token.borrow_mut() = Some(token);
        self.subscribes.set(self.subscribes.get() + 1);
        self.phase.set(Phase::Subscribed);
        true
    }

    /// Release the subscription but stay mounted.
    pub fn detach(&self) -> bool {
        if self.phase.get() != Phase::Subscribed {
            return false;
        }
        self.release_token();
        self.phase.set(Phase::Detached);
        true
    }

    /// Tear down. Idempotent; returns `true` only on the first call.
    pub fn unmount(&self) -> bool {
        match self.phase.get() {
            Phase::Unmounting | Phase::Unmounted => false,
            Phase::Detached | Phase::Subscribed => {
                self.phase.set(Phase::Unmounting);
                self.release_token();
                self.phase.set(Phase::Unmounted);
                true
            }
        }
    }

    fn release_token(&self) {
        let token = self.token.borrow_mut().take();
        if let Some(token) = token {
            self.releases.set(self.releases.get() + 1);
            token.call();
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.phase.get() == Phase::Subscribed
    }

    /// Raised once teardown has begun; no work may happen afterwards.
    #[must_use]
    pub fn pending_unmount(&self) -> bool {
        matches!(self.phase.get(), Phase::Unmounting | Phase::Unmounted)
    }

    /// Total subscriptions created over the manager's lifetime.
    #[must_use]
    pub fn subscribe_count(&self) -> u32 {
        self.subscribes.get()
    }

    /// Total tokens released over the manager's lifetime.
    #[must_use]
    pub fn release_count(&self) -> u32 {
        self.releases.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use tether_core::{ReducerStore, Store, Value, action};

    fn store() -> (ReducerStore, StoreRef) {
        let store = ReducerStore::new(Value::from(0), |prev, _| {
            Value::from(prev.as_int().unwrap_or(0) + 1)
        });
        let handle = store.clone().into_ref();
        (store, handle)
    }

    #[test]
    fn lifecycle_releases_exactly_once() {
        let (raw, store) = store();
        let manager = SubscriptionManager::new();
        assert_eq!(manager.phase(), Phase::Detached);

        assert!(manager.subscribe(&store, Rc::new(|| {})));
        assert!(manager.is_subscribed());
        assert_eq!(raw.listener_count(), 1);

        assert!(manager.unmount());
        assert!(!manager.unmount());
        assert_eq!(manager.phase(), Phase::Unmounted);
        assert_eq!(manager.release_count(), 1);
        assert_eq!(raw.listener_count(), 0);
    }

    #[test]
    fn second_subscribe_is_refused() {
        let (raw, store) = store();
        let manager = SubscriptionManager::new();
        assert!(manager.subscribe(&store, Rc::new(|| {})));
        assert!(!manager.subscribe(&store, Rc::new(|| {})));
        assert_eq!(raw.listener_count(), 1);
        assert_eq!(manager.subscribe_count(), 1);
    }

    #[test]
    fn unmounted_is_terminal() {
        let (raw, store) = store();
        let manager = SubscriptionManager::new();
        manager.unmount();
        assert!(!manager.subscribe(&store, Rc::new(|| {})));
        assert_eq!(raw.listener_count(), 0);
        assert!(manager.pending_unmount());
        assert_eq!(manager.release_count(), 0);
    }

    #[test]
    fn detach_then_resubscribe() {
        let (raw, store) = store();
        let manager = SubscriptionManager::new();
        manager.subscribe(&store, Rc::new(|| {}));
        assert!(manager.detach());
        assert_eq!(raw.listener_count(), 0);
        assert_eq!(manager.phase(), Phase::Detached);
        assert!(manager.subscribe(&store, Rc::new(|| {})));
        assert_eq!(raw.listener_count(), 1);
    }

    #[test]
    fn flag_is_visible_while_token_releases() {
        // A store whose unsubscribe observes the manager mid-teardown.
        let manager = Rc::new(SubscriptionManager::new());
        let observed = Rc::new(Cell::new(None));

        struct TrackingStore {
            manager: Rc<SubscriptionManager>,
            observed: Rc<Cell<Option<bool>>>,
            inner: ReducerStore,
        }
        impl Store for TrackingStore {
            fn get_state(&self) -> Value {
                self.inner.get_state()
            }
            fn dispatcher(&self) -> tether_core::Callback {
                self.inner.dispatcher()
            }
            fn subscribe(&self, listener: Listener) -> Unsubscribe {
                let token = self.inner.subscribe(listener);
                let manager = Rc::clone(&self.manager);
                let observed = Rc::clone(&self.observed);
                Unsubscribe::new(move || {
                    observed.set(Some(manager.pending_unmount()));
                    token.call();
                })
            }
        }

        let tracked: StoreRef = Rc::new(TrackingStore {
            manager: Rc::clone(&manager),
            observed: Rc::clone(&observed),
            inner: ReducerStore::constant(Value::Null),
        });
        manager.subscribe(&tracked, Rc::new(|| {}));
        manager.unmount();
        assert_eq!(observed.get(), Some(true));
        tracked.dispatch(action("ANY"));
    }
}
