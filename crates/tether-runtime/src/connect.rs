#![forbid(unsafe_code)]

//! `connect()`: wrapping a view so it receives props derived from a store.
//!
//! # Design
//!
//! [`connect`] captures a [`ConnectOptions`] in a [`Connector`]. Wrapping a
//! view factory yields a [`ConnectedComponent`], which can be mounted any
//! number of times; each mount is an independent [`Connected`] handle with
//! its own [`Connection`] engine, memoization caches and subscription.
//!
//! The store listener holds only a weak reference to the mount, so a
//! dropped handle is never kept alive by the store.
//!
//! # Invariants
//!
//! 1. Mount order is: resolve store, construct the view, eager computation,
//!    subscribe (only when a state projection exists), first render.
//! 2. No engine or view borrow is held while user code for a different
//!    stage runs; a trigger that reaches a mount mid-pipeline is coalesced
//!    and replayed once the current pass ends.
//! 3. After teardown begins, triggers are discarded without touching the
//!    engine or the view.
//!
//! # Failure Modes
//!
//! - Mount fails with `MissingStore` or `ProjectionType`; nothing stays
//!   subscribed.
//! - Errors raised by a store notification have no caller to return to and
//!   are reported to the [`Host`](crate::host::Host) fault slot.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use tether_core::{ConnectError, Listener, Props, Result, StoreRef};

use crate::connection::{Connection, ConnectionStats, Trigger, Update};
use crate::host::{Flushable, Scope};
use crate::options::ConnectOptions;
use crate::resolver::resolve_store;
use crate::subscription::{Phase, SubscriptionManager};

/// A renderable view that receives merged props.
///
/// `scope` is the scope for the view's own children: one level deeper, same
/// host and ambient store.
pub trait View: 'static {
    fn render(&mut self, props: &Props, scope: &Scope) -> Result<()>;
}

impl<F> View for F
where
    F: FnMut(&Props, &Scope) -> Result<()> + 'static,
{
    fn render(&mut self, props: &Props, scope: &Scope) -> Result<()> {
        self(props, scope)
    }
}

/// Capture connection options for wrapping views.
#[must_use]
pub fn connect(options: ConnectOptions) -> Connector {
    Connector { options }
}

/// The result of [`connect`]: options waiting for a view.
#[derive(Debug, Clone)]
pub struct Connector {
    options: ConnectOptions,
}

impl Connector {
    /// Wrap a view factory. `name` is used in diagnostics as `Connect(name)`.
    pub fn wrap<V: View>(&self, name: impl Into<String>, factory: impl Fn() -> V + 'static) -> ConnectedComponent<V> {
        ConnectedComponent {
            name: name.into(),
            options: self.options.clone(),
            factory: Rc::new(factory),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }
}

/// A wrapped view, ready to mount.
pub struct ConnectedComponent<V> {
    name: String,
    options: ConnectOptions,
    factory: Rc<dyn Fn() -> V>,
}

impl<V> Clone for ConnectedComponent<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            options: self.options.clone(),
            factory: Rc::clone(&self.factory),
        }
    }
}

impl<V> fmt::Debug for ConnectedComponent<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedComponent")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}

impl<V: View> ConnectedComponent<V> {
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("Connect({})", self.name)
    }

    /// Name of the wrapped view.
    #[must_use]
    pub fn wrapped_name(&self) -> &str {
        &self.name
    }

    /// Mount against the scope's ambient store.
    ///
    /// # Errors
    ///
    /// `MissingStore` if the scope provides no store; `ProjectionType` if
    /// the eager computation fails; whatever the first render returns.
    pub fn mount(&self, scope: &Scope, own_props: Props) -> Result<Connected<V>> {
        self.mount_inner(scope, None, own_props)
    }

    /// Mount against `store`, ignoring any ambient one.
    ///
    /// # Errors
    ///
    /// As [`mount`](Self::mount), minus `MissingStore`.
    pub fn mount_with_store(&self, scope: &Scope, store: StoreRef, own_props: Props) -> Result<Connected<V>> {
        self.mount_inner(scope, Some(store), own_props)
    }

    fn mount_inner(&self, scope: &Scope, explicit: Option<StoreRef>, own_props: Props) -> Result<Connected<V>> {
        let name = self.display_name();
        let store = resolve_store(explicit.as_ref(), scope.store(), &name)?;
        // A view may dispatch while it is constructed; the eager pass reads
        // the state that leaves behind.
        let view = (self.factory)();
        let engine = Connection::new(Rc::clone(&store), &self.options, own_props)?;
        let subscribes = engine.subscribes();

        let shared = Rc::new(Shared {
            id: scope.host().next_mount_id(),
            name,
            scope: scope.clone(),
            engine: RefCell::new(engine),
            view: RefCell::new(view),
            subscription: SubscriptionManager::new(),
            forward_ref: Cell::new(self.options.forwards_ref()),
            in_flight: Cell::new(false),
            pending: RefCell::new(None),
            queued: Cell::new(false),
            renders: Cell::new(0),
        });

        if subscribes {
            shared.subscription.subscribe(&store, Shared::listener(&shared));
        }

        let first = shared.engine.borrow().merged().clone();
        shared.in_flight.set(true);
        let rendered = shared.render(&first);
        shared.in_flight.set(false);
        if let Err(err) = rendered {
            shared.teardown();
            return Err(err);
        }

        tracing::debug!(
            message = "connect.mount",
            component = %shared.name,
            subscribed = shared.subscription.is_subscribed(),
            depth = scope.depth(),
        );

        let connected = Connected { shared };
        connected.shared.drain_pending()?;
        Ok(connected)
    }
}

/// State shared between a [`Connected`] handle, its store listener, and the
/// host batching queue.
struct Shared<V> {
    id: u64,
    name: String,
    scope: Scope,
    engine: RefCell<Connection>,
    view: RefCell<V>,
    subscription: SubscriptionManager,
    forward_ref: Cell<bool>,
    in_flight: Cell<bool>,
    pending: RefCell<Option<Trigger>>,
    queued: Cell<bool>,
    renders: Cell<u64>,
}

impl<V: View> Shared<V> {
    fn listener(this: &Rc<Self>) -> Listener {
        let weak: Weak<Self> = Rc::downgrade(this);
        Rc::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Err(err) = shared.handle(Trigger::notify()) {
                shared.scope.host().report(err);
            }
        })
    }

    fn defer(&self, trigger: Trigger) {
        let mut pending = self.pending.borrow_mut();
        *pending = Some(match pending.take() {
            Some(earlier) => earlier.coalesce(trigger),
            None => trigger,
        });
    }

    fn handle(self: &Rc<Self>, trigger: Trigger) -> Result<()> {
        if self.subscription.pending_unmount() {
            tracing::trace!(message = "connect.ignored", component = %self.name);
            return Ok(());
        }
        let host = self.scope.host();
        if host.is_deferring() {
            self.defer(trigger);
            if !self.queued.replace(true) {
                let item: Rc<dyn Flushable> = self.clone();
                host.enqueue(self.scope.depth(), self.id, Rc::downgrade(&item));
            }
            return Ok(());
        }
        if self.in_flight.get() {
            self.defer(trigger);
            return Ok(());
        }
        self.run(trigger)
    }

    /// Run `trigger` and then every trigger deferred while it ran.
    fn run(&self, trigger: Trigger) -> Result<()> {
        self.in_flight.set(true);
        let mut next = Some(trigger);
        let mut outcome = Ok(());
        while let Some(trigger) = next {
            if self.subscription.pending_unmount() {
                break;
            }
            let update = self.engine.borrow_mut().update(trigger);
            let step = match update {
                Ok(Update::Emit(props)) => self.render(&props),
                Ok(Update::Suppressed | Update::Unchanged) => Ok(()),
                Err(err) => Err(err),
            };
            if let Err(err) = step {
                outcome = Err(err);
                break;
            }
            next = if self.queued.get() {
                None
            } else {
                self.pending.borrow_mut().take()
            };
        }
        self.in_flight.set(false);
        outcome
    }

    fn render(&self, props: &Props) -> Result<()> {
        let child = self.scope.child();
        self.view.borrow_mut().render(props, &child)?;
        self.renders.set(self.renders.get() + 1);
        Ok(())
    }

    /// Replay a trigger that arrived while the first render ran.
    fn drain_pending(self: &Rc<Self>) -> Result<()> {
        if self.queued.get() {
            return Ok(());
        }
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(trigger) => self.handle(trigger),
            None => Ok(()),
        }
    }

    fn reconcile_subscription(self: &Rc<Self>) {
        let wants = self.engine.borrow().subscribes();
        if wants && !self.subscription.is_subscribed() {
            let store = Rc::clone(self.engine.borrow().store());
            self.subscription.subscribe(&store, Self::listener(self));
            tracing::debug!(message = "connect.subscribed", component = %self.name);
        } else if !wants && self.subscription.detach() {
            tracing::debug!(message = "connect.detached", component = %self.name);
        }
    }

    fn teardown(&self) {
        if !self.subscription.unmount() {
            return;
        }
        self.pending.borrow_mut().take();
        if let Ok(mut engine) = self.engine.try_borrow_mut() {
            engine.teardown();
        }
        tracing::debug!(
            message = "connect.unmount",
            component = %self.name,
            releases = self.subscription.release_count(),
        );
    }
}

impl<V: View> Flushable for Shared<V> {
    fn flush(self: Rc<Self>) -> Result<()> {
        self.queued.set(false);
        if self.subscription.pending_unmount() || self.in_flight.get() {
            return Ok(());
        }
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some(trigger) => self.run(trigger),
            None => Ok(()),
        }
    }
}

/// A mounted connected view. Dropping the handle unmounts it.
pub struct Connected<V: View> {
    shared: Rc<Shared<V>>,
}

impl<V: View> fmt::Debug for Connected<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connected")
            .field("name", &self.shared.name)
            .field("phase", &self.shared.subscription.phase())
            .field("renders", &self.shared.renders.get())
            .finish()
    }
}

impl<V: View> Connected<V> {
    /// The last merged props handed to the view.
    #[must_use]
    pub fn props(&self) -> Props {
        self.shared.engine.borrow().merged().clone()
    }

    /// The own props currently applied.
    #[must_use]
    pub fn own_props(&self) -> Props {
        self.shared.engine.borrow().own_props().clone()
    }

    /// Hand new own props from the parent.
    ///
    /// # Errors
    ///
    /// Projection or render errors from the recomputation. Inside a batch
    /// the work is queued and errors surface through the host instead.
    pub fn set_props(&self, own_props: Props) -> Result<()> {
        self.shared.handle(Trigger::props(own_props))
    }

    /// Recompute regardless of memoization, subscribing or detaching first
    /// if the attached projections changed that requirement.
    ///
    /// # Errors
    ///
    /// As [`set_props`](Self::set_props).
    pub fn force_refresh(&self) -> Result<()> {
        if self.shared.subscription.pending_unmount() {
            return Ok(());
        }
        self.shared.reconcile_subscription();
        self.shared.handle(Trigger::refresh())
    }

    /// Replace the projections and merge with those of `connector`, keeping
    /// the mount, its view and its store. Takes effect on the next
    /// [`force_refresh`](Self::force_refresh).
    pub fn hot_swap(&self, connector: &Connector) {
        if self.shared.subscription.pending_unmount() {
            return;
        }
        let options = connector.options();
        self.shared.engine.borrow_mut().hot_swap(options);
        self.shared.forward_ref.set(options.forwards_ref());
        tracing::debug!(message = "connect.hot_swap", component = %self.shared.name);
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.shared.subscription.is_subscribed()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.subscription.phase()
    }

    /// Renders of the wrapped view, including the first.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.shared.renders.get()
    }

    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.shared.engine.borrow().stats()
    }

    #[must_use]
    pub fn store(&self) -> StoreRef {
        Rc::clone(self.shared.engine.borrow().store())
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.shared.name
    }

    fn check_forward_ref(&self) -> Result<()> {
        if self.shared.forward_ref.get() {
            return Ok(());
        }
        Err(ConnectError::misuse(format!(
            "to access the wrapped instance of \"{}\", enable forward_ref in its ConnectOptions",
            self.shared.name
        )))
    }

    /// Borrow the wrapped view.
    ///
    /// # Errors
    ///
    /// `Misuse` unless `forward_ref` is enabled, or while the view renders.
    pub fn wrapped_instance(&self) -> Result<Ref<'_, V>> {
        self.check_forward_ref()?;
        self.shared
            .view
            .try_borrow()
            .map_err(|_| ConnectError::misuse(format!("\"{}\" is rendering", self.shared.name)))
    }

    /// Mutably borrow the wrapped view.
    ///
    /// # Errors
    ///
    /// As [`wrapped_instance`](Self::wrapped_instance).
    pub fn wrapped_instance_mut(&self) -> Result<RefMut<'_, V>> {
        self.check_forward_ref()?;
        self.shared
            .view
            .try_borrow_mut()
            .map_err(|_| ConnectError::misuse(format!("\"{}\" is rendering", self.shared.name)))
    }

    /// Tear down: release the subscription and drop caches.
    pub fn unmount(self) {
        self.shared.teardown();
    }
}

impl<V: View> Drop for Connected<V> {
    fn drop(&mut self) {
        self.shared.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Projection;
    use tether_core::{ReducerStore, Store, Value};

    fn counter_store() -> ReducerStore {
        ReducerStore::new(Value::from(0), |prev, action| match action.get("type").and_then(Value::as_str) {
            Some("INC") => Value::from(prev.as_int().unwrap_or(0) + 1),
            _ => prev.clone(),
        })
    }

    fn inc() -> Value {
        tether_core::action("INC")
    }

    fn count_options() -> ConnectOptions {
        ConnectOptions::new().with_state(Projection::new(|s: &Value| Value::from(Props::new().with("count", s.clone()))))
    }

    type BoxedView = Box<dyn FnMut(&Props, &Scope) -> Result<()>>;

    fn recording(log: &Rc<RefCell<Vec<Props>>>) -> impl Fn() -> BoxedView + use<> {
        let log = Rc::clone(log);
        move || {
            let log = Rc::clone(&log);
            let view: BoxedView = Box::new(move |props: &Props, _: &Scope| {
                log.borrow_mut().push(props.clone());
                Ok(())
            });
            view
        }
    }

    fn noop() -> impl View {
        |_: &Props, _: &Scope| -> Result<()> { Ok(()) }
    }

    #[test]
    fn display_name_wraps_view_name() {
        let component = connect(ConnectOptions::new()).wrap("Container", noop);
        assert_eq!(component.display_name(), "Connect(Container)");
    }

    #[test]
    fn mount_renders_eagerly_and_follows_store() {
        let store = counter_store();
        let scope = Scope::with_store(store.clone().into_ref());
        let log = Rc::new(RefCell::new(Vec::new()));
        let component = connect(count_options()).wrap("Counter", recording(&log));
        let mounted = component.mount(&scope, Props::new()).unwrap();
        assert!(mounted.is_subscribed());
        assert_eq!(mounted.render_count(), 1);

        store.dispatch(inc());
        assert_eq!(mounted.render_count(), 2);
        assert_eq!(log.borrow()[1].get("count"), Some(&Value::from(1)));
    }

    #[test]
    fn drop_releases_subscription() {
        let store = counter_store();
        let scope = Scope::with_store(store.clone().into_ref());
        let component = connect(count_options()).wrap("Counter", noop);
        let mounted = component.mount(&scope, Props::new()).unwrap();
        assert_eq!(store.listener_count(), 1);
        drop(mounted);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn failed_first_render_does_not_stay_subscribed() {
        let store = counter_store();
        let scope = Scope::with_store(store.clone().into_ref());
        let component = connect(count_options()).wrap("Broken", || {
            |_: &Props, _: &Scope| -> Result<()> { Err(ConnectError::misuse("boom")) }
        });
        let err = component.mount(&scope, Props::new()).unwrap_err();
        assert_eq!(err, ConnectError::misuse("boom"));
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn dispatch_during_render_is_replayed_after() {
        let store = counter_store();
        let scope = Scope::with_store(store.clone().into_ref());
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let component = connect(count_options()).wrap("SelfDispatch", move || {
            let log = Rc::clone(&log_clone);
            move |props: &Props, scope: &Scope| -> Result<()> {
                let count = props.get("count").and_then(Value::as_int).unwrap_or(0);
                log.borrow_mut().push(count);
                if count < 2 {
                    scope.dispatch(inc())?;
                }
                Ok(())
            }
        });
        let mounted = component.mount(&scope, Props::new()).unwrap();
        assert_eq!(*log.borrow(), [0, 1, 2]);
        assert_eq!(mounted.render_count(), 3);
    }

    #[test]
    fn batched_dispatches_render_once() {
        let store = counter_store();
        let scope = Scope::with_store(store.clone().into_ref());
        let log = Rc::new(RefCell::new(Vec::new()));
        let component = connect(count_options()).wrap("Counter", recording(&log));
        let mounted = component.mount(&scope, Props::new()).unwrap();
        scope
            .batch(|| {
                store.dispatch(inc());
                store.dispatch(inc());
                store.dispatch(inc());
            })
            .unwrap();
        assert_eq!(mounted.render_count(), 2);
        assert_eq!(log.borrow()[1].get("count"), Some(&Value::from(3)));
        assert_eq!(mounted.stats().state_computations, 2);
    }

    #[test]
    fn notification_errors_reach_the_host() {
        let store = counter_store();
        let scope = Scope::with_store(store.clone().into_ref());
        let options = ConnectOptions::new().with_state(Projection::new(|s: &Value| {
            if s.as_int() == Some(1) {
                Value::from("bad")
            } else {
                Value::from(Props::new())
            }
        }));
        let component = connect(options).wrap("Faulty", noop);
        let _mounted = component.mount(&scope, Props::new()).unwrap();
        let err = scope.dispatch(inc()).unwrap_err();
        assert_eq!(err.stage(), Some(tether_core::Stage::State));
    }

    #[test]
    fn wrapped_instance_requires_forward_ref() {
        struct Named(&'static str);
        impl View for Named {
            fn render(&mut self, _: &Props, _: &Scope) -> Result<()> {
                Ok(())
            }
        }
        let scope = Scope::with_store(counter_store().into_ref());
        let plain = connect(ConnectOptions::new()).wrap("Named", || Named("x"));
        let mounted = plain.mount(&scope, Props::new()).unwrap();
        let err = mounted.wrapped_instance().err().unwrap();
        assert!(matches!(err, ConnectError::Misuse { .. }));

        let forwarded = connect(ConnectOptions::new().with_forward_ref(true)).wrap("Named", || Named("x"));
        let mounted = forwarded.mount(&scope, Props::new()).unwrap();
        assert_eq!(mounted.wrapped_instance().unwrap().0, "x");
    }
}
