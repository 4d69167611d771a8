#![forbid(unsafe_code)]

//! The connection state machine: per-mount recomputation and the
//! emit-or-suppress decision.
//!
//! # Pipeline
//!
//! Every trigger runs the same deterministic steps:
//!
//! 1. Apply the trigger's own props (a pure connection ignores props that
//!    are shallow-equal to the current ones).
//! 2. Re-run the state selector against a fresh `get_state()`.
//! 3. A pure connection handling a store notification alone stops here if
//!    the new state props are shallow-equal to the previous ones.
//! 4. Re-run the dispatch selector.
//! 5. Merge state props, dispatch props and own props.
//! 6. Emit the merged props unless they are shallow-equal to the last
//!    emitted ones.
//!
//! An impure connection (`pure: false`) skips step 3, forces both selectors
//! to re-run, and treats every own-props update as a change. Step 6 still
//! applies.
//!
//! # Invariants
//!
//! 1. Construction runs steps 2, 4 and 5 unconditionally, so merged props
//!    exist before first paint.
//! 2. A failing step leaves the last emitted props untouched.
//! 3. [`Connection::hot_swap`] drops every cache tied to the old
//!    projections; the next forced refresh recomputes from scratch.

use std::fmt;

use tether_core::{Callback, Props, Result, Stage, StoreRef, Value};

use crate::merge::MergeStage;
use crate::options::ConnectOptions;
use crate::selector::Selector;

/// Why a recomputation was requested. Coalescible.
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    /// The store notified its listeners.
    pub store_changed: bool,
    /// New own props from the parent.
    pub own_props: Option<Props>,
    /// Recompute regardless of memoization.
    pub forced: bool,
}

impl Trigger {
    #[must_use]
    pub fn notify() -> Self {
        Self {
            store_changed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn props(own_props: Props) -> Self {
        Self {
            own_props: Some(own_props),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn refresh() -> Self {
        Self {
            forced: true,
            ..Self::default()
        }
    }

    /// Fold a later trigger into this one. The latest own props win.
    #[must_use]
    pub fn coalesce(self, later: Trigger) -> Self {
        Self {
            store_changed: self.store_changed || later.store_changed,
            own_props: later.own_props.or(self.own_props),
            forced: self.forced || later.forced,
        }
    }
}

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// State projection runs.
    pub state_computations: u64,
    /// Dispatch projection runs.
    pub dispatch_computations: u64,
    /// Merge stage runs.
    pub merges: u64,
    /// Merged props emitted to the view, including the initial one.
    pub emissions: u64,
    /// Recomputations whose merged props matched the last emission.
    pub suppressed: u64,
    /// Store notifications stopped by state-props equality.
    pub short_circuits: u64,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// New merged props; the view must re-render.
    Emit(Props),
    /// Nothing the view can observe changed.
    Suppressed,
    /// The trigger carried no change at all.
    Unchanged,
}

impl Update {
    #[must_use]
    pub fn emitted(&self) -> Option<&Props> {
        match self {
            Self::Emit(props) => Some(props),
            _ => None,
        }
    }
}

/// The recomputation engine of one mounted connection.
pub struct Connection {
    store: StoreRef,
    dispatch: Callback,
    own_props: Props,
    state_selector: Option<Selector<Value>>,
    dispatch_selector: Selector<Callback>,
    merge: MergeStage,
    pure: bool,
    state_props: Props,
    dispatch_props: Props,
    merged: Props,
    stats: ConnectionStats,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("pure", &self.pure)
            .field("own_props", &self.own_props)
            .field("merged", &self.merged)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Connection {
    /// Build the engine and run the eager initial computation.
    ///
    /// # Errors
    ///
    /// [`ConnectError::ProjectionType`](tether_core::ConnectError::ProjectionType)
    /// if any stage produces something other than a plain mapping.
    pub fn new(store: StoreRef, options: &ConnectOptions, own_props: Props) -> Result<Self> {
        let dispatch = store.dispatcher();
        let mut connection = Self {
            state_selector: options
                .state_source()
                .cloned()
                .map(|source| Selector::new(Stage::State, source)),
            dispatch_selector: Selector::new(Stage::Dispatch, options.dispatch_source()),
            merge: MergeStage::new(options.merge_fn()),
            pure: options.is_pure(),
            store,
            dispatch,
            own_props,
            state_props: Props::new(),
            dispatch_props: Props::new(),
            merged: Props::new(),
            stats: ConnectionStats::default(),
        };
        connection.recompute_all(true)?;
        connection.stats.emissions += 1;
        Ok(connection)
    }

    /// Steps 2, 4 and 5 without any short-circuit.
    fn recompute_all(&mut self, force: bool) -> Result<()> {
        let state_props = self.compute_state(force)?;
        let dispatch_props = self.compute_dispatch(force)?;
        let merged = self.run_merge(&state_props, &dispatch_props)?;
        self.state_props = state_props;
        self.dispatch_props = dispatch_props;
        self.merged = merged;
        Ok(())
    }

    fn compute_state(&mut self, force: bool) -> Result<Props> {
        let Some(selector) = self.state_selector.as_mut() else {
            return Ok(Props::new());
        };
        let state = self.store.get_state();
        let (props, ran) = selector.compute(&state, &self.own_props, force)?;
        if ran {
            self.stats.state_computations += 1;
        }
        Ok(props)
    }

    fn compute_dispatch(&mut self, force: bool) -> Result<Props> {
        let (props, ran) = self
            .dispatch_selector
            .compute(&self.dispatch, &self.own_props, force)?;
        if ran {
            self.stats.dispatch_computations += 1;
        }
        Ok(props)
    }

    fn run_merge(&mut self, state_props: &Props, dispatch_props: &Props) -> Result<Props> {
        self.stats.merges += 1;
        self.merge.run(state_props, dispatch_props, &self.own_props)
    }

    /// Run the pipeline for `trigger`.
    ///
    /// # Errors
    ///
    /// Propagates projection and merge type errors; the last emitted props
    /// are kept.
    pub fn update(&mut self, trigger: Trigger) -> Result<Update> {
        let previous_own = self.own_props.clone();
        let props_changed = match trigger.own_props {
            Some(next) if !self.pure || !next.shallow_eq(&self.own_props) => {
                self.own_props = next;
                true
            }
            _ => false,
        };
        if !trigger.store_changed && !props_changed && !trigger.forced {
            return Ok(Update::Unchanged);
        }

        let notification_only = trigger.store_changed && !props_changed && !trigger.forced;
        let result = self.run_pipeline(notification_only, trigger.forced);
        if result.is_err() {
            self.own_props = previous_own;
        }
        result
    }

    fn run_pipeline(&mut self, notification_only: bool, forced: bool) -> Result<Update> {
        let force = forced || !self.pure;

        let state_props = self.compute_state(force)?;
        if self.pure && notification_only && state_props.shallow_eq(&self.state_props) {
            self.stats.short_circuits += 1;
            tracing::trace!(message = "connection.short_circuit");
            return Ok(Update::Suppressed);
        }

        let dispatch_props = self.compute_dispatch(force)?;
        let merged = self.run_merge(&state_props, &dispatch_props)?;
        self.state_props = state_props;
        self.dispatch_props = dispatch_props;

        if merged.shallow_eq(&self.merged) {
            self.stats.suppressed += 1;
            tracing::trace!(message = "connection.suppressed");
            return Ok(Update::Suppressed);
        }
        self.merged = merged.clone();
        self.stats.emissions += 1;
        tracing::trace!(message = "connection.emit", keys = merged.len());
        Ok(Update::Emit(merged))
    }

    /// Replace projections and merge with those of `options`.
    ///
    /// Caches are discarded; nothing is recomputed until the next trigger,
    /// which should be [`Trigger::refresh`].
    pub fn hot_swap(&mut self, options: &ConnectOptions) {
        self.state_selector = options
            .state_source()
            .cloned()
            .map(|source| Selector::new(Stage::State, source));
        self.dispatch_selector.replace(options.dispatch_source());
        self.merge.replace(options.merge_fn());
        self.pure = options.is_pure();
        self.state_props = Props::new();
        self.dispatch_props = Props::new();
        tracing::debug!(message = "connection.hot_swap", subscribes = options.subscribes());
    }

    /// Drop memoization caches at teardown.
    pub fn teardown(&mut self) {
        if let Some(selector) = self.state_selector.as_mut() {
            selector.clear();
        }
        self.dispatch_selector.clear();
    }

    /// Last emitted merged props.
    #[must_use]
    pub fn merged(&self) -> &Props {
        &self.merged
    }

    #[must_use]
    pub fn own_props(&self) -> &Props {
        &self.own_props
    }

    #[must_use]
    pub fn state_props(&self) -> &Props {
        &self.state_props
    }

    #[must_use]
    pub fn dispatch_props(&self) -> &Props {
        &self.dispatch_props
    }

    #[must_use]
    pub fn store(&self) -> &StoreRef {
        &self.store
    }

    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.pure
    }

    /// Whether a state projection is attached (and so a subscription needed).
    #[must_use]
    pub fn subscribes(&self) -> bool {
        self.state_selector.is_some()
    }

    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }
}
