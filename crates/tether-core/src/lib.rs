#![forbid(unsafe_code)]

//! Core: dynamic values, props, shallow equality, and the store contract.

pub mod error;
pub mod props;
pub mod shallow;
pub mod store;
pub mod value;

pub use error::{ConnectError, Result, Stage};
pub use props::Props;
pub use shallow::shallow_equal;
pub use store::{
    INIT_ACTION_TYPE, Listener, Reducer, ReducerStore, Store, StoreRef, Unsubscribe, action,
    same_store,
};
pub use value::{Callback, Opaque, Value};
