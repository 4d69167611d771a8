#![forbid(unsafe_code)]

//! Stores and actions shared by the integration suites.

use std::cell::Cell;
use std::rc::Rc;

use tether_core::{Callback, Listener, Props, ReducerStore, Store, StoreRef, Unsubscribe, Value};
use tether_runtime::{ConnectOptions, Projection};

/// A store holding a string, extended by `APPEND` actions.
#[must_use]
pub fn string_builder() -> ReducerStore {
    ReducerStore::new(Value::from(""), |prev, action| {
        if action.get("type").and_then(Value::as_str) != Some("APPEND") {
            return prev.clone();
        }
        let body = action.get("body").and_then(Value::as_str).unwrap_or_default();
        Value::from(format!("{}{body}", prev.as_str().unwrap_or_default()))
    })
}

/// `{type: "APPEND", body}`.
#[must_use]
pub fn append(body: &str) -> Value {
    Value::from(Props::new().with("type", "APPEND").with("body", body))
}

/// State projection `state => {string: state}`.
#[must_use]
pub fn string_options() -> ConnectOptions {
    ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        Value::from(Props::new().with("string", state.clone()))
    }))
}

/// Wraps a store and counts subscribe and unsubscribe calls.
#[derive(Debug, Clone)]
pub struct SpyStore {
    inner: ReducerStore,
    subscribes: Rc<Cell<u32>>,
    unsubscribes: Rc<Cell<u32>>,
}

impl SpyStore {
    #[must_use]
    pub fn new(inner: ReducerStore) -> Self {
        Self {
            inner,
            subscribes: Rc::new(Cell::new(0)),
            unsubscribes: Rc::new(Cell::new(0)),
        }
    }

    #[must_use]
    pub fn into_ref(self) -> StoreRef {
        Rc::new(self)
    }

    #[must_use]
    pub fn inner(&self) -> &ReducerStore {
        &self.inner
    }

    #[must_use]
    pub fn subscribe_count(&self) -> u32 {
        self.subscribes.get()
    }

    #[must_use]
    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribes.get()
    }
}

impl Store for SpyStore {
    fn get_state(&self) -> Value {
        self.inner.get_state()
    }

    fn dispatcher(&self) -> Callback {
        self.inner.dispatcher()
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.subscribes.set(self.subscribes.get() + 1);
        let token = self.inner.subscribe(listener);
        let unsubscribes = Rc::clone(&self.unsubscribes);
        Unsubscribe::new(move || {
            unsubscribes.set(unsubscribes.get() + 1);
            token.call();
        })
    }
}
