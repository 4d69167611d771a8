#![forbid(unsafe_code)]

//! Construction-time configuration of a connection.
//!
//! ```
//! use tether_core::{Props, Value};
//! use tether_runtime::options::ConnectOptions;
//! use tether_runtime::selector::Projection;
//!
//! let options = ConnectOptions::new()
//!     .with_state(Projection::new(|state: &Value| {
//!         Value::from(Props::new().with("string", state.clone()))
//!     }))
//!     .with_pure(true);
//! assert!(options.subscribes());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use tether_core::{Callback, Props, Value};

use crate::merge::MergeFn;
use crate::selector::{Projection, ProjectionSource};

/// Builds an action from its argument.
pub type ActionCreator = Rc<dyn Fn(Value) -> Value>;

/// Named action creators, bound to a store's dispatch on mount.
#[derive(Clone, Default)]
pub struct ActionCreators {
    creators: BTreeMap<String, ActionCreator>,
}

impl ActionCreators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, creator: impl Fn(Value) -> Value + 'static) -> Self {
        self.creators.insert(name.into(), Rc::new(creator));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}

impl fmt::Debug for ActionCreators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.creators.keys()).finish()
    }
}

/// Wrap every creator so calling it dispatches the built action.
///
/// Each bound function returns whatever dispatch returns.
#[must_use]
pub fn bind_action_creators(creators: &ActionCreators, dispatch: &Callback) -> Props {
    creators
        .creators
        .iter()
        .map(|(name, creator)| {
            let creator = Rc::clone(creator);
            let dispatch = dispatch.clone();
            let bound = Callback::new(move |arg| dispatch.call(creator(arg)));
            (name.clone(), Value::from(bound))
        })
        .collect()
}

/// The `{dispatch}` projection used when none is configured.
#[must_use]
pub fn default_dispatch_projection() -> Projection<Callback> {
    Projection::new(|dispatch: &Callback| Value::from(Props::new().with("dispatch", dispatch.clone())))
}

/// Dispatch-side configuration.
#[derive(Clone, Debug)]
pub enum MapDispatch {
    Projection(ProjectionSource<Callback>),
    ActionCreators(ActionCreators),
}

impl MapDispatch {
    /// Resolve into the projection source a selector runs.
    #[must_use]
    pub fn into_source(self) -> ProjectionSource<Callback> {
        match self {
            Self::Projection(source) => source,
            Self::ActionCreators(creators) => Projection::new(move |dispatch: &Callback| {
                Value::from(bind_action_creators(&creators, dispatch))
            })
            .into(),
        }
    }
}

/// Options passed to [`connect`](crate::connect::connect).
#[derive(Clone)]
pub struct ConnectOptions {
    state: Option<ProjectionSource<Value>>,
    dispatch: Option<MapDispatch>,
    merge: Option<MergeFn>,
    pure: bool,
    forward_ref: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            state: None,
            dispatch: None,
            merge: None,
            pure: true,
            forward_ref: false,
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("state", &self.state)
            .field("dispatch", &self.dispatch)
            .field("merge", &self.merge.is_some())
            .field("pure", &self.pure)
            .field("forward_ref", &self.forward_ref)
            .finish()
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Project store state into props. Without one the connection never
    /// subscribes to the store.
    #[must_use]
    pub fn with_state(mut self, source: impl Into<ProjectionSource<Value>>) -> Self {
        self.state = Some(source.into());
        self
    }

    /// Project dispatch into props. Defaults to `{dispatch}`.
    #[must_use]
    pub fn with_dispatch(mut self, source: impl Into<ProjectionSource<Callback>>) -> Self {
        self.dispatch = Some(MapDispatch::Projection(source.into()));
        self
    }

    /// Expose each creator as a function prop that dispatches its action.
    #[must_use]
    pub fn with_action_creators(mut self, creators: ActionCreators) -> Self {
        self.dispatch = Some(MapDispatch::ActionCreators(creators));
        self
    }

    #[must_use]
    pub fn with_merge(mut self, merge: impl Fn(&Props, &Props, &Props) -> Value + 'static) -> Self {
        self.merge = Some(Rc::new(merge));
        self
    }

    /// Whether to trust shallow equality of state props (default `true`).
    #[must_use]
    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    /// Allow access to the wrapped view instance (default `false`).
    #[must_use]
    pub fn with_forward_ref(mut self, forward_ref: bool) -> Self {
        self.forward_ref = forward_ref;
        self
    }

    #[must_use]
    pub fn state_source(&self) -> Option<&ProjectionSource<Value>> {
        self.state.as_ref()
    }

    /// The dispatch source, falling back to `{dispatch}`.
    #[must_use]
    pub fn dispatch_source(&self) -> ProjectionSource<Callback> {
        self.dispatch
            .clone()
            .map_or_else(|| default_dispatch_projection().into(), MapDispatch::into_source)
    }

    #[must_use]
    pub fn merge_fn(&self) -> Option<MergeFn> {
        self.merge.clone()
    }

    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.pure
    }

    #[must_use]
    pub fn forwards_ref(&self) -> bool {
        self.forward_ref
    }

    /// Whether a connection built from these options listens to the store.
    #[must_use]
    pub fn subscribes(&self) -> bool {
        self.state.is_some()
    }
}
