//! Integration tests for Store follow-up broadcasting
//!
//! Tests the action observation features that let request/response layers
//! wait for a terminal follow-up without coupling to the store's internals.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use flowstore_core::{CancellationToken, Effect, middleware::Middleware, reducer::Reducer};
use flowstore_runtime::{Store, StoreConfig, StoreError};
use flowstore_testing::helpers::collect_actions;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Start a saga with correlation ID
    StartSaga { id: u64 },
    /// Saga step completed
    StepCompleted { id: u64, step: u32 },
    /// Saga finished (terminal action)
    SagaCompleted { id: u64 },
    /// Saga failed (terminal action, never produced here)
    SagaFailed { id: u64 },
    /// Simple increment command
    Increment,
    /// Incremented event
    Incremented { value: u32 },
}

#[derive(Debug, Clone, Default)]
struct TestState {
    counter: u32,
    saga_steps: Vec<u32>,
}

struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;

    fn reduce(&self, state: &mut TestState, action: &TestAction) {
        match action {
            TestAction::StepCompleted { step, .. } => state.saga_steps.push(*step),
            TestAction::Increment => state.counter += 1,
            TestAction::StartSaga { .. }
            | TestAction::SagaCompleted { .. }
            | TestAction::SagaFailed { .. }
            | TestAction::Incremented { .. } => {},
        }
    }
}

/// Drives sagas through three steps and echoes increments
struct SagaMiddleware;

impl Middleware for SagaMiddleware {
    type State = TestState;
    type Action = TestAction;

    fn handle(
        &self,
        state: &TestState,
        action: &TestAction,
        _cancel: &CancellationToken,
    ) -> Effect<TestAction> {
        match *action {
            TestAction::StartSaga { id } => Effect::future(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some(TestAction::StepCompleted { id, step: 1 })
            }),
            TestAction::StepCompleted { id, step } if step < 3 => Effect::future(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Some(TestAction::StepCompleted { id, step: step + 1 })
            }),
            TestAction::StepCompleted { id, .. } => Effect::Emit(TestAction::SagaCompleted { id }),
            TestAction::Increment => Effect::Emit(TestAction::Incremented {
                value: state.counter,
            }),
            TestAction::SagaCompleted { .. }
            | TestAction::SagaFailed { .. }
            | TestAction::Incremented { .. } => Effect::None,
        }
    }
}

fn test_store() -> Store<TestState, TestAction, TestReducer> {
    Store::new(TestState::default(), TestReducer, vec![Box::new(SagaMiddleware)])
}

fn small_buffer_store(capacity: usize) -> Store<TestState, TestAction, TestReducer> {
    Store::with_config(
        TestState::default(),
        TestReducer,
        vec![Box::new(SagaMiddleware)],
        StoreConfig::default().with_broadcast_capacity(capacity),
    )
}

/// Drain the receiver without blocking; returns (received, lagged)
fn drain(rx: &mut tokio::sync::broadcast::Receiver<TestAction>) -> (usize, bool) {
    let mut received = 0;
    let mut lagged = false;
    loop {
        match rx.try_recv() {
            Ok(_) => received += 1,
            Err(TryRecvError::Lagged(_)) => lagged = true,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    (received, lagged)
}

// ============================================================================
// Tests
// ============================================================================

/// `send_and_wait_for` with an immediate reply
#[tokio::test]
async fn test_send_and_wait_for_immediate() {
    let store = test_store();

    let result = store
        .send_and_wait_for(
            TestAction::Increment,
            |action| matches!(action, TestAction::Incremented { .. }),
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(result.unwrap(), TestAction::Incremented { value: 1 });
}

/// `send_and_wait_for` with a terminal action several follow-ups deep
#[tokio::test]
async fn test_send_and_wait_for_saga() {
    let store = test_store();

    let result = store
        .send_and_wait_for(
            TestAction::StartSaga { id: 42 },
            |action| matches!(action, TestAction::SagaCompleted { id: 42 }),
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(result.unwrap(), TestAction::SagaCompleted { id: 42 });

    let saga_steps = store.state(|s| s.saga_steps.clone()).await;
    assert_eq!(saga_steps, vec![1, 2, 3]);
}

/// A reply that never comes times out
#[tokio::test]
async fn test_send_and_wait_for_timeout() {
    let store = test_store();

    let result = store
        .send_and_wait_for(
            TestAction::StartSaga { id: 99 },
            |action| matches!(action, TestAction::SagaFailed { id: 99 }),
            Duration::from_millis(15),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));

    // The abandoned saga was cancelled, so no further steps land
    let steps_at_timeout = store.state(|s| s.saga_steps.len()).await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(store.state(|s| s.saga_steps.len()).await, steps_at_timeout);
}

/// `send_and_wait_for` is refused once shutdown has begun
#[tokio::test]
async fn test_send_and_wait_for_after_shutdown() {
    let store = test_store();
    store.shutdown(Duration::from_millis(100)).await.unwrap();

    let result = store
        .send_and_wait_for(TestAction::Increment, |_| true, Duration::from_millis(50))
        .await;

    assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
}

/// Concurrent waiters each get their own terminal action
#[tokio::test]
async fn test_concurrent_subscribers() {
    let store = test_store();

    let handles: Vec<_> = (1..=5)
        .map(|id| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .send_and_wait_for(
                        TestAction::StartSaga { id },
                        move |action| {
                            matches!(action, TestAction::SagaCompleted { id: saga_id } if *saga_id == id)
                        },
                        Duration::from_secs(2),
                    )
                    .await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let result = handle.await.expect("Task panicked");
        assert!(result.is_ok(), "Saga {} should complete successfully", i + 1);
    }

    // Sagas interleave, but 5 sagas x 3 steps all ran
    let saga_steps = store.state(|s| s.saga_steps.len()).await;
    assert_eq!(saga_steps, 15);
}

/// Subscribers see every follow-up of a tree, in causal order
#[tokio::test]
async fn test_subscribe_actions_streaming() {
    let store = test_store();
    let mut rx = store.subscribe_actions();

    store.send(TestAction::StartSaga { id: 100 }).await;

    let actions = collect_actions(&mut rx, 4, Duration::from_secs(1)).await;
    assert_eq!(
        actions,
        vec![
            TestAction::StepCompleted { id: 100, step: 1 },
            TestAction::StepCompleted { id: 100, step: 2 },
            TestAction::StepCompleted { id: 100, step: 3 },
            TestAction::SagaCompleted { id: 100 },
        ]
    );
}

/// A slow subscriber skips old actions without blocking the store
#[tokio::test]
async fn test_lagging_subscriber() {
    let store = small_buffer_store(4);
    let mut rx = store.subscribe_actions();

    for _ in 0..20 {
        store.send(TestAction::Increment).await;
    }

    let (received, lagged) = drain(&mut rx);

    assert!(lagged, "Expected subscriber to lag");
    assert!(received > 0, "Should receive at least some actions");
    assert!(received < 20, "Should not receive all actions if lagged");
    assert_eq!(store.state(|s| s.counter).await, 20);
}

/// Independent subscribers each get every follow-up
#[tokio::test]
async fn test_multiple_independent_subscribers() {
    let store = test_store();

    let mut receivers: Vec<_> = (0..3).map(|_| store.subscribe_actions()).collect();

    store.send(TestAction::Increment).await;
    store.send(TestAction::Increment).await;

    for rx in &mut receivers {
        assert_eq!(drain(rx), (2, false));
    }
}

/// Sent actions are not broadcast, only their follow-ups
#[tokio::test]
async fn test_initial_actions_not_broadcast() {
    let store = test_store();
    let mut rx = store.subscribe_actions();

    store.send(TestAction::Increment).await;

    let actions: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(actions, vec![TestAction::Incremented { value: 1 }]);
}

/// Follow-ups from delays are broadcast too
#[tokio::test]
async fn test_effect_delay_broadcasting() {
    #[derive(Debug, Clone, PartialEq)]
    enum DelayAction {
        Start,
        Delayed,
    }

    let store = Store::new(
        (),
        flowstore_core::EmptyReducer::new(),
        vec![Box::new(flowstore_core::middleware_fn(
            |(): &(), action: &DelayAction, _: &CancellationToken| match action {
                DelayAction::Start => Effect::delay(Duration::from_millis(10), DelayAction::Delayed),
                DelayAction::Delayed => Effect::None,
            },
        ))],
    );
    let mut rx = store.subscribe_actions();

    store.send(DelayAction::Start).await;

    let action = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for delayed action")
        .expect("Channel closed");
    assert_eq!(action, DelayAction::Delayed);
}

/// Follow-ups from different middleware for one action are all broadcast
#[tokio::test]
async fn test_parallel_middleware_broadcasting() {
    #[derive(Debug, Clone, PartialEq)]
    enum ParallelAction {
        Start,
        Result1,
        Result2,
    }

    fn reply_after(
        millis: u64,
        reply: ParallelAction,
    ) -> flowstore_core::BoxedMiddleware<(), ParallelAction> {
        Box::new(flowstore_core::middleware_fn(
            move |(): &(), action: &ParallelAction, _: &CancellationToken| {
                if *action == ParallelAction::Start {
                    Effect::delay(Duration::from_millis(millis), reply.clone())
                } else {
                    Effect::None
                }
            },
        ))
    }

    let store = Store::new(
        (),
        flowstore_core::EmptyReducer::new(),
        vec![
            reply_after(10, ParallelAction::Result1),
            reply_after(15, ParallelAction::Result2),
        ],
    );
    let mut rx = store.subscribe_actions();

    store.send(ParallelAction::Start).await;

    let results = collect_actions(&mut rx, 2, Duration::from_secs(1)).await;
    assert_eq!(results.len(), 2);
    assert!(results.contains(&ParallelAction::Result1));
    assert!(results.contains(&ParallelAction::Result2));
}

/// Receivers see `Closed` once every store handle is dropped
#[tokio::test]
async fn test_channel_closed_on_store_drop() {
    let store = test_store();
    let mut subscriber = store.subscribe_actions();

    let wait_handle = tokio::spawn(async move { subscriber.recv().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(store);

    let result = wait_handle.await.expect("Task panicked");
    assert!(matches!(result, Err(RecvError::Closed)));
}

/// A capacity of zero is clamped rather than panicking in the channel
#[tokio::test]
async fn test_zero_broadcast_capacity_is_clamped() {
    let store = small_buffer_store(0);
    assert_eq!(store.config().broadcast_capacity, 1);

    let mut rx = store.subscribe_actions();
    store.send(TestAction::Increment).await;

    assert_eq!(rx.recv().await.unwrap(), TestAction::Incremented { value: 1 });
}
