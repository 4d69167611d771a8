#![forbid(unsafe_code)]

//! Memoizing wrapper around a user projection.
//!
//! # Design
//!
//! A [`Selector`] owns one projection (state or dispatch) for one mounted
//! instance, the last primary input it saw, and the last output. It is the
//! props-level analogue of a memoized computed value: the cached output is
//! returned as-is unless the inputs that the projection declared it reads
//! have changed.
//!
//! # Invariants
//!
//! 1. An [`Arity::IgnoresOwnProps`] projection re-runs only when the primary
//!    argument is no longer identical to the last one seen (or when forced).
//!    Own-props changes alone return the cached output, same identity.
//! 2. An [`Arity::UsesOwnProps`] projection re-runs on every call.
//! 3. A factory source is invoked exactly once per selector lifetime (until
//!    [`Selector::replace`]); its product decides the arity.
//! 4. An output that is not a plain mapping is rejected with
//!    [`ConnectError::ProjectionType`] naming the selector's [`Stage`].

use std::fmt;
use std::rc::Rc;

use tether_core::{Callback, ConnectError, Props, Result, Stage, Value};

/// What a projection reads besides its primary argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Reads only the primary argument (state or dispatch).
    IgnoresOwnProps,
    /// Reads own props too, or declares no inputs at all; re-run every time.
    UsesOwnProps,
}

/// Primary projection input compared by identity between calls.
pub trait Primary: Clone + 'static {
    fn same(&self, other: &Self) -> bool;
}

impl Primary for Value {
    fn same(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

impl Primary for Callback {
    fn same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

type ProjectionFn<P> = Rc<dyn Fn(&P, &Props) -> Value>;
type FactoryFn<P> = Rc<dyn Fn(&P, &Props) -> Projection<P>>;

/// A projection function with its declared arity.
pub struct Projection<P> {
    f: ProjectionFn<P>,
    arity: Arity,
}

impl<P> Clone for Projection<P> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
            arity: self.arity,
        }
    }
}

impl<P> fmt::Debug for Projection<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection").field("arity", &self.arity).finish()
    }
}

impl<P> Projection<P> {
    #[must_use]
    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn call(&self, primary: &P, own: &Props) -> Value {
        (self.f)(primary, own)
    }
}

impl<P: 'static> Projection<P> {
    /// A projection of the primary argument only.
    pub fn new(f: impl Fn(&P) -> Value + 'static) -> Self {
        Self {
            f: Rc::new(move |primary, _| f(primary)),
            arity: Arity::IgnoresOwnProps,
        }
    }

    /// A projection of the primary argument and own props.
    pub fn with_own_props(f: impl Fn(&P, &Props) -> Value + 'static) -> Self {
        Self {
            f: Rc::new(f),
            arity: Arity::UsesOwnProps,
        }
    }

    /// A projection with no declared inputs. Re-run on every trigger.
    pub fn nullary(f: impl Fn() -> Value + 'static) -> Self {
        Self {
            f: Rc::new(move |_, _| f()),
            arity: Arity::UsesOwnProps,
        }
    }
}

/// How a selector obtains its projection.
pub enum ProjectionSource<P> {
    /// Use this projection directly.
    Direct(Projection<P>),
    /// Build a per-instance projection from the first inputs.
    Factory(FactoryFn<P>),
}

impl<P> Clone for ProjectionSource<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Direct(p) => Self::Direct(p.clone()),
            Self::Factory(f) => Self::Factory(Rc::clone(f)),
        }
    }
}

impl<P> fmt::Debug for ProjectionSource<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(p) => f.debug_tuple("Direct").field(p).finish(),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl<P: 'static> ProjectionSource<P> {
    /// A factory invoked once per mounted instance.
    pub fn factory(f: impl Fn(&P, &Props) -> Projection<P> + 'static) -> Self {
        Self::Factory(Rc::new(f))
    }
}

impl<P> From<Projection<P>> for ProjectionSource<P> {
    fn from(p: Projection<P>) -> Self {
        Self::Direct(p)
    }
}

/// Per-instance memoizing wrapper around one projection.
pub struct Selector<P> {
    stage: Stage,
    source: ProjectionSource<P>,
    resolved: Option<Projection<P>>,
    last_primary: Option<P>,
    cached: Option<Props>,
    invocations: u64,
}

impl<P> fmt::Debug for Selector<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("stage", &self.stage)
            .field("arity", &self.resolved.as_ref().map(Projection::arity))
            .field("cached", &self.cached)
            .field("invocations", &self.invocations)
            .finish()
    }
}

impl<P: Primary> Selector<P> {
    pub fn new(stage: Stage, source: impl Into<ProjectionSource<P>>) -> Self {
        Self {
            stage,
            source: source.into(),
            resolved: None,
            last_primary: None,
            cached: None,
            invocations: 0,
        }
    }

    /// Produce the projection output for these inputs.
    ///
    /// Returns the props and whether the projection actually ran. With
    /// `force` the projection runs regardless of its arity.
    pub fn compute(&mut self, primary: &P, own: &Props, force: bool) -> Result<(Props, bool)> {
        let projection = match &self.resolved {
            Some(p) => p.clone(),
            None => {
                let p = match &self.source {
                    ProjectionSource::Direct(p) => p.clone(),
                    ProjectionSource::Factory(factory) => factory(primary, own),
                };
                self.resolved = Some(p.clone());
                p
            }
        };

        if let Some(cached) = &self.cached {
            let primary_unchanged = self
                .last_primary
                .as_ref()
                .is_some_and(|last| last.same(primary));
            if !force && projection.arity() == Arity::IgnoresOwnProps && primary_unchanged {
                return Ok((cached.clone(), false));
            }
        }

        let output = projection.call(primary, own);
        self.invocations += 1;
        let props = match output {
            Value::Map(props) => props,
            other => {
                return Err(ConnectError::ProjectionType {
                    stage: self.stage,
                    found: other.describe(),
                });
            }
        };
        self.last_primary = Some(primary.clone());
        self.cached = Some(props.clone());
        Ok((props, true))
    }

    /// Swap in a new projection source, dropping every cache tied to the old
    /// one. The next [`compute`](Self::compute) starts from scratch.
    pub fn replace(&mut self, source: impl Into<ProjectionSource<P>>) {
        self.source = source.into();
        self.clear();
    }

    /// Forget the resolved projection and cached output.
    pub fn clear(&mut self) {
        self.resolved = None;
        self.last_primary = None;
        self.cached = None;
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Arity of the resolved projection, `None` before first compute.
    #[must_use]
    pub fn arity(&self) -> Option<Arity> {
        self.resolved.as_ref().map(Projection::arity)
    }

    #[must_use]
    pub fn cached(&self) -> Option<&Props> {
        self.cached.as_ref()
    }

    /// How many times the projection has actually run.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }
}
