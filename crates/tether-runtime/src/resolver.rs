#![forbid(unsafe_code)]

//! Mount-time store resolution.

use std::rc::Rc;

use tether_core::{ConnectError, Result, StoreRef};

/// Pick the store for one mount: an explicit store always wins over the
/// ambient one.
///
/// # Errors
///
/// [`ConnectError::MissingStore`] naming `component` when neither exists.
pub fn resolve_store(
    explicit: Option<&StoreRef>,
    ambient: Option<&StoreRef>,
    component: &str,
) -> Result<StoreRef> {
    explicit
        .or(ambient)
        .map(Rc::clone)
        .ok_or_else(|| ConnectError::missing_store(component))
}
