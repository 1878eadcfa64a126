//! Dispatch Performance Benchmarks
//!
//! Measures the cost of each stage of a dispatch:
//! - Reducer execution, bare and lifted through a keyed combinator
//! - Store throughput with no middleware
//! - Middleware fan-out width
//! - Follow-up chain depth
//! - Concurrent senders contending for the state lock
//!
//! Run with: `cargo bench`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use flowstore_core::{
    CancellationToken, Effect, Lens, Prism,
    composition::keyed_reducer,
    middleware::{BoxedMiddleware, middleware_fn},
    reducer::Reducer,
};
use flowstore_runtime::Store;
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    data: Vec<u8>, // For testing state size impact
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            data: vec![0; 1024], // 1KB of data
        }
    }
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    SetValue(i64),
    /// Re-emitted by the chain middleware until the counter reaches the target
    Chain(i64),
}

struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;

    fn reduce(&self, state: &mut BenchState, action: &BenchAction) {
        match action {
            BenchAction::Increment | BenchAction::Chain(_) => state.counter += 1,
            BenchAction::SetValue(v) => {
                state.counter = *v;
                if let Some(first) = state.data.first_mut() {
                    *first = first.wrapping_add(1);
                }
            },
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Middleware that answers nothing
fn silent() -> BoxedMiddleware<BenchState, BenchAction> {
    Box::new(middleware_fn(
        |_: &BenchState, _: &BenchAction, _: &CancellationToken| Effect::None,
    ))
}

/// Middleware that echoes `Chain(target)` until the counter reaches `target`
fn chain() -> BoxedMiddleware<BenchState, BenchAction> {
    Box::new(middleware_fn(
        |state: &BenchState, action: &BenchAction, _: &CancellationToken| match action {
            BenchAction::Chain(target) if state.counter % target != 0 => {
                Effect::Emit(BenchAction::Chain(*target))
            },
            _ => Effect::None,
        },
    ))
}

/// Benchmark reducer execution in isolation (no Store overhead)
fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    group.bench_function("increment", |b| {
        let mut state = BenchState::default();
        b.iter(|| BenchReducer.reduce(&mut state, black_box(&BenchAction::Increment)));
    });

    group.bench_function("keyed_increment", |b| {
        let keyed = keyed_reducer(
            BenchReducer,
            Lens::identity(),
            Prism::identity(),
        );
        let mut state: HashMap<u32, BenchState> =
            (0..64).map(|key| (key, BenchState::default())).collect();

        b.iter(|| keyed.reduce(&mut state, black_box(&(17, BenchAction::Increment))));
    });

    group.finish();
}

/// Benchmark Store throughput (actions/sec)
fn benchmark_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_throughput");
    group.throughput(Throughput::Elements(1));
    let runtime = runtime();

    group.bench_function("send_action", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, vec![]);

        b.to_async(&runtime).iter(|| async {
            store.send(black_box(BenchAction::Increment)).await;
        });
    });

    group.bench_function("send_and_read_state", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, vec![]);

        b.to_async(&runtime).iter(|| async {
            store.send(black_box(BenchAction::SetValue(42))).await;
            let _value = store.state(|s| s.counter).await;
        });
    });

    group.finish();
}

/// Benchmark the cost of handing one action to many middleware
fn benchmark_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    let runtime = runtime();

    for width in [1_usize, 4, 16] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::new("silent", width), &width, |b, &width| {
            let store = Store::new(
                BenchState::default(),
                BenchReducer,
                (0..width).map(|_| silent()).collect(),
            );

            b.to_async(&runtime).iter(|| async {
                store.send(black_box(BenchAction::Increment)).await;
            });
        });
    }

    group.finish();
}

/// Benchmark follow-up chains of increasing depth
fn benchmark_follow_up_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("follow_up_depth");
    let runtime = runtime();

    for depth in [1_i64, 8, 64] {
        group.throughput(Throughput::Elements(depth.unsigned_abs()));
        group.bench_with_input(BenchmarkId::new("chain", depth), &depth, |b, &depth| {
            let store = Store::new(BenchState::default(), BenchReducer, vec![chain()]);

            b.to_async(&runtime).iter(|| async {
                store.send(BenchAction::SetValue(0)).await;
                store.send(black_box(BenchAction::Chain(depth))).await;
            });
        });
    }

    group.finish();
}

/// Benchmark concurrent Store access
fn benchmark_concurrent_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    group.throughput(Throughput::Elements(10));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    group.bench_function("10_concurrent_sends", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, vec![silent()]);

        b.to_async(&runtime).iter(|| async {
            let handles: Vec<_> = (0..10)
                .map(|_| {
                    let store = store.clone();
                    tokio::spawn(async move {
                        store.send(BenchAction::Increment).await;
                    })
                })
                .collect();

            for handle in handles {
                handle.await.expect("Task failed");
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_store_throughput,
    benchmark_fan_out,
    benchmark_follow_up_depth,
    benchmark_concurrent_access,
);
criterion_main!(benches);
