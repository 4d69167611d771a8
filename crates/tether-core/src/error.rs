#![forbid(unsafe_code)]

//! Error taxonomy for the binding layer.
//!
//! Every fault is raised synchronously by the call that detected it (mount,
//! update, accessor). Nothing is retried.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConnectError>;

/// Which pipeline stage produced an invalid value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The state projection.
    State,
    /// The dispatch projection.
    Dispatch,
    /// The merge function.
    Merge,
}

impl Stage {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::State => "state projection",
            Self::Dispatch => "dispatch projection",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    /// No store from either an explicit argument or the ambient scope.
    #[error(
        "could not find a store for \"{component}\": mount it inside a scope that provides a store, \
         or pass a store explicitly to \"{component}\""
    )]
    MissingStore { component: String },

    /// A projection or merge returned something other than a plain mapping.
    #[error("{stage} must return a plain mapping, instead received {found}")]
    ProjectionType { stage: Stage, found: String },

    /// API used in a way the configuration does not allow.
    #[error("{message}")]
    Misuse { message: String },
}

impl ConnectError {
    #[must_use]
    pub fn missing_store(component: impl Into<String>) -> Self {
        Self::MissingStore {
            component: component.into(),
        }
    }

    #[must_use]
    pub fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse {
            message: message.into(),
        }
    }

    /// The failing stage, for `ProjectionType` errors.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::ProjectionType { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
