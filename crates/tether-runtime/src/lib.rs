#![forbid(unsafe_code)]

//! Runtime: the connection engine between a store and mounted views.
//!
//! A typical mount:
//!
//! ```
//! use tether_core::{Props, ReducerStore, Store, Value};
//! use tether_runtime::{ConnectOptions, Projection, Scope, connect};
//!
//! let store = ReducerStore::new(Value::from(0), |prev, action| {
//!     match action.get("type").and_then(Value::as_str) {
//!         Some("TICK") => Value::from(prev.as_int().unwrap_or(0) + 1),
//!         _ => prev.clone(),
//!     }
//! });
//! let scope = Scope::with_store(store.clone().into_ref());
//!
//! let counter = connect(ConnectOptions::new().with_state(Projection::new(|state: &Value| {
//!     Value::from(Props::new().with("count", state.clone()))
//! })))
//! .wrap("Counter", || |_: &Props, _: &Scope| -> tether_core::Result<()> { Ok(()) });
//!
//! let mounted = counter.mount(&scope, Props::new()).unwrap();
//! store.dispatch(tether_core::action("TICK"));
//! assert_eq!(mounted.props().get("count"), Some(&Value::from(1)));
//! ```

pub mod connect;
pub mod connection;
pub mod host;
pub mod merge;
pub mod options;
pub mod resolver;
pub mod selector;
pub mod subscription;

pub use connect::{Connected, ConnectedComponent, Connector, View, connect};
pub use connection::{Connection, ConnectionStats, Trigger, Update};
pub use host::{Host, Scope};
pub use merge::{MergeFn, MergeStage, default_merge};
pub use options::{ActionCreator, ActionCreators, ConnectOptions, MapDispatch, bind_action_creators};
pub use resolver::resolve_store;
pub use selector::{Arity, Primary, Projection, ProjectionSource, Selector};
pub use subscription::{Phase, SubscriptionManager};
