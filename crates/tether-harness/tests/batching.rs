//! Host batching: coalescing and parent/child state consistency.
//!
//! A child whose own props carry state forwarded by its connected parent
//! must always compute against the same state the parent saw.

#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

use tether_core::{Props, Stage, Store, Value};
use tether_harness::{Nest, RecordingView, RenderLog, append, string_builder};
use tether_runtime::{ConnectOptions, Projection, Scope, connect};

struct Fixture {
    store: tether_core::ReducerStore,
    scope: Scope,
    child_invokes: Rc<Cell<u32>>,
    mismatches: Rc<Cell<u32>>,
    child_log: RenderLog,
}

/// Parent: `state => {state}`, forwards it to the child as `parentState`.
/// Child: `(state, own) => {}`, recording any disagreement.
fn fixture() -> (Fixture, tether_runtime::Connected<Nest<RecordingView>>) {
    let store = string_builder();
    store.dispatch(append("a"));
    let scope = Scope::with_store(store.clone().into_ref());

    let child_invokes = Rc::new(Cell::new(0));
    let mismatches = Rc::new(Cell::new(0));
    let invokes_in = Rc::clone(&child_invokes);
    let mismatches_in = Rc::clone(&mismatches);
    let child_log = RenderLog::new();
    let child = connect(ConnectOptions::new().with_state(Projection::with_own_props(
        move |state: &Value, own: &Props| {
            invokes_in.set(invokes_in.get() + 1);
            if own.get("parentState") != Some(state) {
                mismatches_in.set(mismatches_in.get() + 1);
            }
            Value::from(Props::new())
        },
    )))
    .wrap("ChildContainer", RecordingView::factory(&child_log));

    let parent = connect(ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        Value::from(Props::new().with("state", state.clone()))
    })))
    .wrap(
        "Container",
        Nest::factory(
            child,
            |props: &Props| Props::new().with("parentState", props.get("state").cloned()),
            None,
        ),
    );
    let mounted = parent.mount(&scope, Props::new()).unwrap();

    (
        Fixture {
            store,
            scope,
            child_invokes,
            mismatches,
            child_log,
        },
        mounted,
    )
}

#[test]
fn child_sees_parent_state_on_mount() {
    let (fx, _parent) = fixture();
    assert_eq!(fx.child_invokes.get(), 1);
    assert_eq!(fx.mismatches.get(), 0);
    assert_eq!(fx.child_log.len(), 1);
}

#[test]
fn batched_dispatch_runs_child_once_with_final_state() {
    let (fx, parent) = fixture();
    fx.scope.batch(|| fx.store.dispatch(append("c"))).unwrap();
    assert_eq!(fx.child_invokes.get(), 2);
    assert_eq!(fx.mismatches.get(), 0);
    assert_eq!(parent.props().get("state"), Some(&Value::from("ac")));
}

#[test]
fn several_dispatches_in_one_batch_coalesce() {
    let (fx, parent) = fixture();
    fx.scope
        .batch(|| {
            fx.store.dispatch(append("b"));
            fx.store.dispatch(append("c"));
            fx.store.dispatch(append("d"));
        })
        .unwrap();
    assert_eq!(fx.child_invokes.get(), 2);
    assert_eq!(fx.mismatches.get(), 0);
    assert_eq!(parent.render_count(), 2);
    assert_eq!(parent.stats().state_computations, 2);
}

#[test]
fn unbatched_dispatch_stays_consistent() {
    let (fx, _parent) = fixture();
    fx.store.dispatch(append("b"));
    fx.store.dispatch(append("c"));
    assert_eq!(fx.mismatches.get(), 0);
    assert!(fx.child_invokes.get() >= 3);
}

#[test]
fn nested_batches_flush_at_outermost_exit() {
    let (fx, parent) = fixture();
    fx.scope
        .batch(|| {
            fx.scope
                .batch(|| {
                    fx.store.dispatch(append("b"));
                })
                .unwrap();
            assert_eq!(parent.render_count(), 1);
            fx.store.dispatch(append("c"));
        })
        .unwrap();
    assert_eq!(parent.render_count(), 2);
    assert_eq!(fx.child_invokes.get(), 2);
    assert_eq!(fx.mismatches.get(), 0);
}

#[test]
fn own_props_and_notification_coalesce_in_a_batch() {
    let store = string_builder();
    let scope = Scope::with_store(store.clone().into_ref());
    let log = RenderLog::new();
    let options = ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        Value::from(Props::new().with("string", state.clone()))
    }));
    let mounted = connect(options)
        .wrap("Container", RecordingView::factory(&log))
        .mount(&scope, Props::new().with("pass", 1))
        .unwrap();

    scope
        .batch(|| {
            mounted.set_props(Props::new().with("pass", 2)).unwrap();
            store.dispatch(append("x"));
            mounted.set_props(Props::new().with("pass", 3)).unwrap();
            assert_eq!(log.len(), 1);
        })
        .unwrap();

    assert_eq!(log.len(), 2);
    let last = log.last().unwrap();
    assert_eq!(last.get("pass"), Some(&Value::from(3)));
    assert_eq!(last.get("string"), Some(&Value::from("x")));
}

#[test]
fn faults_raised_in_a_flush_surface_from_batch() {
    let store = string_builder();
    let scope = Scope::with_store(store.clone().into_ref());
    let options = ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        if state.as_str() == Some("bad") {
            Value::from(7)
        } else {
            Value::from(Props::new())
        }
    }));
    let _mounted = connect(options)
        .wrap("Container", RecordingView::factory(&RenderLog::new()))
        .mount(&scope, Props::new())
        .unwrap();

    let err = scope.batch(|| store.dispatch(append("bad"))).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::State));
    assert!(scope.host().take_fault().is_none());
}

#[test]
fn fault_from_direct_dispatch_is_not_charged_to_a_later_scope_dispatch() {
    let store = string_builder();
    let scope = Scope::with_store(store.clone().into_ref());
    let options = ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        if state.as_str() == Some("bad") {
            Value::from(7)
        } else {
            Value::from(Props::new().with("string", state.clone()))
        }
    }));
    let mounted = connect(options)
        .wrap("Container", RecordingView::factory(&RenderLog::new()))
        .mount(&scope, Props::new())
        .unwrap();

    store.dispatch(append("bad"));
    let out = scope.dispatch(append("ok"));
    assert!(out.is_ok(), "{out:?}");
    assert_eq!(store.get_state(), Value::from("badok"));
    assert_eq!(mounted.props().get("string"), Some(&Value::from("badok")));
    assert!(scope.host().take_fault().is_none());
}

#[test]
fn fault_from_direct_dispatch_stays_readable_until_the_next_scope_call() {
    let store = string_builder();
    let scope = Scope::with_store(store.clone().into_ref());
    let options = ConnectOptions::new().with_state(Projection::new(|state: &Value| {
        if state.as_str() == Some("bad") {
            Value::from(7)
        } else {
            Value::from(Props::new())
        }
    }));
    let _mounted = connect(options)
        .wrap("Container", RecordingView::factory(&RenderLog::new()))
        .mount(&scope, Props::new())
        .unwrap();

    store.dispatch(append("bad"));
    let fault = scope.host().take_fault().unwrap();
    assert_eq!(fault.stage(), Some(Stage::State));
}
