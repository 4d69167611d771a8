#![forbid(unsafe_code)]

//! Combining state props, dispatch props, and own props.
//!
//! The default policy is a shallow union where later sources win:
//! own props < state props < dispatch props. A custom merge function may be
//! impure; it is called exactly once per recomputation and its output is
//! validated like any projection output.

use std::fmt;
use std::rc::Rc;

use tether_core::{ConnectError, Props, Result, Stage, Value};

/// Custom merge signature: `(state props, dispatch props, own props)`.
pub type MergeFn = Rc<dyn Fn(&Props, &Props, &Props) -> Value>;

/// Shallow union of the three sources; later sources win key conflicts.
#[must_use]
pub fn default_merge(state_props: &Props, dispatch_props: &Props, own_props: &Props) -> Props {
    let mut merged = Props::new();
    merged.extend_from(own_props);
    merged.extend_from(state_props);
    merged.extend_from(dispatch_props);
    merged
}

/// The merge stage of one connection.
#[derive(Default)]
pub struct MergeStage {
    custom: Option<MergeFn>,
    invocations: u64,
}

impl fmt::Debug for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeStage")
            .field("custom", &self.custom.is_some())
            .field("invocations", &self.invocations)
            .finish()
    }
}

impl MergeStage {
    #[must_use]
    pub fn new(custom: Option<MergeFn>) -> Self {
        Self {
            custom,
            invocations: 0,
        }
    }

    /// Merge once.
    pub fn run(&mut self, state_props: &Props, dispatch_props: &Props, own_props: &Props) -> Result<Props> {
        self.invocations += 1;
        let Some(custom) = &self.custom else {
            return Ok(default_merge(state_props, dispatch_props, own_props));
        };
        match custom(state_props, dispatch_props, own_props) {
            Value::Map(props) => Ok(props),
            other => Err(ConnectError::ProjectionType {
                stage: Stage::Merge,
                found: other.describe(),
            }),
        }
    }

    pub fn replace(&mut self, custom: Option<MergeFn>) {
        self.custom = custom;
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }

    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }
}
