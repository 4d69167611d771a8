//! Benchmarks for the recomputation pipeline.
//!
//! Run with: cargo bench -p tether-runtime --bench pipeline_bench

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tether_core::{Props, ReducerStore, Store, Value, shallow_equal};
use tether_runtime::{ConnectOptions, Connection, Projection, Trigger};

fn wide_props(n: usize) -> Props {
    (0..n).map(|i| (format!("k{i}"), Value::from(i as i64))).collect()
}

// =============================================================================
// Shallow equality
// =============================================================================

fn bench_shallow_equal(c: &mut Criterion) {
    let mut group = c.benchmark_group("shallow_equal");

    let a = wide_props(32);
    let b = wide_props(32);
    let same = a.clone();

    group.bench_function("same_pointer", |bench| {
        bench.iter(|| black_box(shallow_equal(black_box(&a), black_box(&same))))
    });
    group.bench_function("equal_32_keys", |bench| {
        bench.iter(|| black_box(shallow_equal(black_box(&a), black_box(&b))))
    });

    group.finish();
}

// =============================================================================
// Connection pipeline
// =============================================================================

fn counter() -> ReducerStore {
    ReducerStore::new(Value::from(0), |prev, action| {
        match action.get("type").and_then(Value::as_str) {
            Some("INC") => Value::from(prev.as_int().unwrap_or(0) + 1),
            _ => prev.clone(),
        }
    })
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    let options = ConnectOptions::new().with_state(Projection::new(|s: &Value| {
        Value::from(Props::new().with("count", s.clone()))
    }));

    // Unrelated action: the state projection runs, then short-circuits.
    let store = counter();
    let mut conn = Connection::new(store.clone().into_ref(), &options, wide_props(8)).unwrap();
    group.bench_function("notify_short_circuit", |b| {
        b.iter(|| {
            store.dispatch(tether_core::action("NOOP"));
            black_box(conn.update(Trigger::notify()).unwrap())
        })
    });

    let store = counter();
    let mut conn = Connection::new(store.clone().into_ref(), &options, wide_props(8)).unwrap();
    group.bench_function("notify_emit", |b| {
        b.iter(|| {
            store.dispatch(tether_core::action("INC"));
            black_box(conn.update(Trigger::notify()).unwrap())
        })
    });

    let store = counter();
    let mut conn = Connection::new(store.into_ref(), &options, wide_props(8)).unwrap();
    let mut flip = false;
    group.bench_function("own_props_change", |b| {
        b.iter(|| {
            flip = !flip;
            let own = wide_props(8).with("flip", flip);
            black_box(conn.update(Trigger::props(own)).unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_shallow_equal, bench_pipeline);
criterion_main!(benches);
