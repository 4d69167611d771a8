#![forbid(unsafe_code)]

//! Tether public facade crate.
//!
//! Binds a store to views: each connected view receives props derived from
//! store state, re-renders only when those props change, and can dispatch
//! actions back.
//!
//! ```
//! use tether::prelude::*;
//!
//! let store = ReducerStore::new(Value::from(""), |prev, action| {
//!     match action.get("body").and_then(Value::as_str) {
//!         Some(body) => Value::from(format!("{}{body}", prev.as_str().unwrap_or_default())),
//!         None => prev.clone(),
//!     }
//! });
//! let scope = Scope::with_store(store.clone().into_ref());
//!
//! let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let view = connect(ConnectOptions::new().with_state(Projection::new(|state: &Value| {
//!     Value::from(Props::new().with("string", state.clone()))
//! })))
//! .wrap("Greeting", move || {
//!     let sink = sink.clone();
//!     move |props: &Props, _: &Scope| -> Result<()> {
//!         sink.borrow_mut().push(props.get("string").cloned());
//!         Ok(())
//!     }
//! });
//!
//! let _mounted = view.mount(&scope, Props::new()).unwrap();
//! store.dispatch(Value::from(Props::new().with("type", "APPEND").with("body", "hi")));
//! assert_eq!(seen.borrow().len(), 2);
//! ```

pub use tether_core as core;
#[cfg(feature = "runtime")]
pub use tether_runtime as runtime;

pub mod prelude {
    pub use tether_core::{
        Callback, ConnectError, Props, ReducerStore, Result, Stage, Store, StoreRef, Value, action,
        shallow_equal,
    };
    #[cfg(feature = "runtime")]
    pub use tether_runtime::{
        ActionCreators, Connected, ConnectOptions, Projection, ProjectionSource, Scope, View,
        connect,
    };
}
