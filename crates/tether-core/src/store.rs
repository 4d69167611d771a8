#![forbid(unsafe_code)]

//! The store contract consumed by the binding layer, plus a reducer-driven
//! reference implementation.
//!
//! # Contract
//!
//! - [`Store::get_state`] returns the current snapshot. Snapshots are
//!   immutable by convention; identity means "unchanged".
//! - [`Store::dispatcher`] returns the store's dispatch function. It must be
//!   the *same* [`Callback`] for the lifetime of the store.
//! - [`Store::subscribe`] registers a listener invoked synchronously after
//!   every dispatch and returns an [`Unsubscribe`] token. The token is
//!   consumed when released, so a double release cannot be expressed.
//!
//! # ReducerStore notification order
//!
//! Listeners run in registration order over a snapshot of the listener list
//! taken after the reducer returns. A listener removed while the loop is
//! running is still invoked in that loop; one added during the loop is not.
//! Subscribers that may be torn down mid-notification therefore have to
//! ignore late calls themselves.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::props::Props;
use crate::value::{Callback, Value};

/// Change notification callback.
pub type Listener = Rc<dyn Fn()>;

/// Shared handle to any store.
pub type StoreRef = Rc<dyn Store>;

/// Reducer signature: `(previous state, action) -> next state`.
pub type Reducer = Rc<dyn Fn(&Value, &Value) -> Value>;

/// Action type reduced once when a [`ReducerStore`] is created.
pub const INIT_ACTION_TYPE: &str = "@@tether/INIT";

/// An externally owned state container.
pub trait Store {
    /// Current state snapshot.
    fn get_state(&self) -> Value;

    /// The store's dispatch function, stable across calls.
    fn dispatcher(&self) -> Callback;

    /// Dispatch `action`, returning it unchanged.
    fn dispatch(&self, action: Value) -> Value {
        self.dispatcher().call(action)
    }

    /// Register `listener`; it runs after every dispatch until released.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// Whether two handles refer to the same store instance.
#[must_use]
pub fn same_store(a: &StoreRef, b: &StoreRef) -> bool {
    Rc::ptr_eq(a, b)
}

/// One-shot token releasing a store subscription.
#[must_use = "dropping an Unsubscribe token leaks the subscription"]
pub struct Unsubscribe(Box<dyn FnOnce()>);

impl Unsubscribe {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self(Box::new(release))
    }

    /// A token that releases nothing. Useful for stores without listeners.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Release the subscription.
    pub fn call(self) {
        (self.0)();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}

/// Build a `{type: <action_type>}` action.
#[must_use]
pub fn action(action_type: &str) -> Value {
    Value::Map(Props::new().with("type", action_type))
}

// ---------------------------------------------------------------------------
// ReducerStore
// ---------------------------------------------------------------------------

struct StoreInner {
    state: RefCell<Value>,
    reducer: Reducer,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
    dispatching: Cell<bool>,
    dispatches: Cell<u64>,
    dispatcher: Callback,
}

impl StoreInner {
    fn dispatch(&self, action: Value) -> Value {
        assert!(!self.dispatching.get(), "reducers may not dispatch actions");

        self.dispatching.set(true);
        let previous = self.state.borrow().clone();
        let next = (self.reducer)(&previous, &action);
        *self.state.borrow_mut() = next;
        self.dispatching.set(false);
        self.dispatches.set(self.dispatches.get() + 1);

        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        tracing::trace!(
            message = "store.dispatch",
            listeners = snapshot.len(),
            action = ?action.get("type")
        );
        for listener in snapshot {
            listener();
        }
        action
    }
}

/// A reducer-driven store with synchronous notification.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct ReducerStore {
    inner: Rc<StoreInner>,
}

impl ReducerStore {
    /// Create a store from `initial` state, reducing one init action.
    pub fn new(initial: Value, reducer: impl Fn(&Value, &Value) -> Value + 'static) -> Self {
        let reducer: Reducer = Rc::new(reducer);
        let state = reducer(&initial, &action(INIT_ACTION_TYPE));
        let inner = Rc::new_cyclic(|weak: &Weak<StoreInner>| {
            let weak = weak.clone();
            StoreInner {
                state: RefCell::new(state),
                reducer,
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                dispatching: Cell::new(false),
                dispatches: Cell::new(0),
                dispatcher: Callback::new(move |action| match weak.upgrade() {
                    Some(inner) => inner.dispatch(action),
                    None => action,
                }),
            }
        });
        Self { inner }
    }

    /// A store whose state never changes.
    pub fn constant(state: Value) -> Self {
        Self::new(state, |prev, _| prev.clone())
    }

    /// Wrap this handle as a [`StoreRef`].
    #[must_use]
    pub fn into_ref(self) -> StoreRef {
        Rc::new(self)
    }

    /// Number of currently registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Number of dispatches processed (the init action is not counted).
    #[must_use]
    pub fn dispatch_count(&self) -> u64 {
        self.inner.dispatches.get()
    }
}

impl Store for ReducerStore {
    fn get_state(&self) -> Value {
        self.inner.state.borrow().clone()
    }

    fn dispatcher(&self) -> Callback {
        self.inner.dispatcher.clone()
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, listener));

        let weak = Rc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }
}

impl fmt::Debug for ReducerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerStore")
            .field("state", &*self.inner.state.borrow())
            .field("listeners", &self.listener_count())
            .field("dispatches", &self.dispatch_count())
            .finish()
    }
}
