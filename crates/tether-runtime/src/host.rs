#![forbid(unsafe_code)]

//! The rendering-substrate boundary: update batching and fault reporting.
//!
//! A [`Host`] is shared by every connection mounted in one view tree. A
//! [`Scope`] is what a single mount sees: the host, the ambient store (if a
//! provider put one there), and the depth in the tree.
//!
//! # Batching
//!
//! Outside a batch every trigger runs synchronously. Inside
//! [`Scope::batch`], and for as long as a flush is running, triggers are
//! coalesced per connection and queued. The outermost batch exit drains the
//! queue in `(depth, mount order)` order, so a parent recomputes and hands
//! fresh own props to its children before any child reads the store. Each
//! queued connection runs its pipeline once, against the state current at
//! flush time.
//!
//! # Faults
//!
//! Store listeners cannot return errors. A failure raised while handling a
//! notification is parked in the host's fault slot (the first one wins,
//! later ones are logged). [`Scope::dispatch`] and [`Scope::batch`] return
//! the fault raised during their own call. A fault parked by a dispatch made
//! directly on the store stays available through [`Host::take_fault`] until
//! the next outermost scope call starts, which discards it with a warning.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tether_core::{ConnectError, Result, StoreRef, Value};

/// Something the host can run later.
pub(crate) trait Flushable {
    fn flush(self: Rc<Self>) -> Result<()>;
}

type QueueKey = (usize, u64);

pub struct Host {
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    queue: RefCell<BTreeMap<QueueKey, Weak<dyn Flushable>>>,
    fault: RefCell<Option<ConnectError>>,
    next_mount_id: Cell<u64>,
    flushes: Cell<u64>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("batch_depth", &self.batch_depth.get())
            .field("flushing", &self.flushing.get())
            .field("queued", &self.queue.borrow().len())
            .field("fault", &*self.fault.borrow())
            .finish()
    }
}

impl Host {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            queue: RefCell::new(BTreeMap::new()),
            fault: RefCell::new(None),
            next_mount_id: Cell::new(1),
            flushes: Cell::new(0),
        })
    }

    /// Whether triggers are currently queued instead of run.
    #[must_use]
    pub fn is_deferring(&self) -> bool {
        self.batch_depth.get() > 0 || self.flushing.get()
    }

    pub(crate) fn next_mount_id(&self) -> u64 {
        let id = self.next_mount_id.get();
        self.next_mount_id.set(id + 1);
        id
    }

    pub(crate) fn enqueue(&self, depth: usize, mount_id: u64, item: Weak<dyn Flushable>) {
        self.queue.borrow_mut().insert((depth, mount_id), item);
    }

    /// Run `f` with triggers deferred; flush on the outermost exit.
    ///
    /// A panic in `f` still closes the batch; queued work then waits for the
    /// next flush.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.batch_depth.set(self.batch_depth.get() + 1);
        let out = {
            let _open = BatchGuard(&self.batch_depth);
            f()
        };
        if self.batch_depth.get() == 0 && !self.flushing.get() {
            self.flush();
        }
        out
    }

    fn flush(&self) {
        self.flushing.set(true);
        let _flushing = FlushGuard(&self.flushing);
        let mut ran = 0usize;
        loop {
            let next = self.queue.borrow_mut().pop_first();
            let Some((_, item)) = next else {
                break;
            };
            if let Some(item) = item.upgrade() {
                ran += 1;
                if let Err(err) = item.flush() {
                    self.report(err);
                }
            }
        }
        self.flushes.set(self.flushes.get() + 1);
        tracing::trace!(message = "host.flush", ran);
    }

    /// Park a fault raised where it cannot be returned directly.
    pub fn report(&self, err: ConnectError) {
        let mut slot = self.fault.borrow_mut();
        if slot.is_some() {
            tracing::error!(message = "host.fault_dropped", error = %err);
            return;
        }
        tracing::warn!(message = "host.fault", error = %err);
        *slot = Some(err);
    }

    /// Take the pending fault, if any.
    pub fn take_fault(&self) -> Option<ConnectError> {
        self.fault.borrow_mut().take()
    }

    fn check(&self) -> Result<()> {
        self.take_fault().map_or(Ok(()), Err)
    }

    /// Drop a fault left over from outside any scope call.
    fn discard_stale(&self) {
        if let Some(err) = self.take_fault() {
            tracing::warn!(message = "host.fault_stale", error = %err);
        }
    }

    /// Completed flushes.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes.get()
    }
}

/// Closes one batch level on scope exit, unwinding included.
struct BatchGuard<'a>(&'a Cell<usize>);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// What one mount sees of its surroundings.
#[derive(Clone)]
pub struct Scope {
    host: Rc<Host>,
    store: Option<StoreRef>,
    depth: usize,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("has_store", &self.store.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A root scope with a fresh host and no ambient store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: Host::new(),
            store: None,
            depth: 0,
        }
    }

    /// A root scope providing `store` to everything mounted beneath it.
    #[must_use]
    pub fn with_store(store: StoreRef) -> Self {
        Self::new().provide(store)
    }

    /// Same host and depth, different ambient store.
    #[must_use]
    pub fn provide(&self, store: StoreRef) -> Self {
        Self {
            host: Rc::clone(&self.host),
            store: Some(store),
            depth: self.depth,
        }
    }

    /// The scope handed to a view's children.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            host: Rc::clone(&self.host),
            store: self.store.clone(),
            depth: self.depth + 1,
        }
    }

    #[must_use]
    pub fn store(&self) -> Option<&StoreRef> {
        self.store.as_ref()
    }

    #[must_use]
    pub fn host(&self) -> &Rc<Host> {
        &self.host
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Run `f` as one batch and surface any fault raised while flushing.
    ///
    /// # Errors
    ///
    /// The first fault reported during the batch.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        if !self.host.is_deferring() {
            self.host.discard_stale();
        }
        let out = self.host.batch(f);
        if self.host.is_deferring() {
            return Ok(out);
        }
        self.host.check().map(|()| out)
    }

    /// Dispatch through the ambient store and surface listener faults.
    ///
    /// # Errors
    ///
    /// [`ConnectError::MissingStore`] without an ambient store, otherwise
    /// the first fault reported while listeners ran.
    pub fn dispatch(&self, action: Value) -> Result<Value> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| ConnectError::missing_store("<scope>"))?;
        let outermost = !self.host.is_deferring();
        if outermost {
            self.host.discard_stale();
        }
        let out = store.dispatch(action);
        if !outermost {
            return Ok(out);
        }
        self.host.check().map(|()| out)
    }
}
