//! # Counter Example
//!
//! Counters composed into an application with flowstore.
//!
//! This example showcases:
//! - A feature written once (`CounterReducer` + `TimerMiddleware`)
//! - The same feature lifted into a field, a map entry and a list element
//! - Prisms generated by `#[derive(Prisms)]`
//! - Follow-ups: delayed increments and a self-feeding `CountTo` chain
//!
//! ## Example
//!
//! ```no_run
//! use counter::{AppAction, AppState, CounterAction, app_store};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let store = app_store(AppState::default(), Duration::from_millis(100));
//!
//! store.send(AppAction::Main(CounterAction::IncrementLater)).await;
//! let count = store.state(|s| s.main.count).await;
//! assert_eq!(count, 1);
//! # }
//! ```

use flowstore_core::{
    CancellationToken, Effect, Lens,
    composition::{combine_reducers, indexed_reducer, keyed_reducer, scope_reducer},
    middleware::{BoxedMiddleware, Middleware, MiddlewareExt, middleware_fn},
    reducer::{Reducer, reducer_fn},
};
use flowstore_macros::Prisms;
use flowstore_runtime::{Store, StoreConfig};
use std::collections::HashMap;
use std::time::Duration;

/// Counter state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
}

/// Counter actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    /// Increment the counter by 1
    Increment,
    /// Decrement the counter by 1
    Decrement,
    /// Reset the counter to 0
    Reset,
    /// Increment once the timer delay has elapsed
    IncrementLater,
    /// Increment one step at a time until the count reaches the target
    CountTo(i64),
}

/// Counter reducer
///
/// Pure transitions only. Timed behaviour lives in [`TimerMiddleware`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;

    fn reduce(&self, state: &mut CounterState, action: &CounterAction) {
        match action {
            CounterAction::Increment => state.count += 1,
            CounterAction::Decrement => state.count -= 1,
            CounterAction::Reset => state.count = 0,
            CounterAction::CountTo(target) if state.count < *target => state.count += 1,
            CounterAction::CountTo(_) | CounterAction::IncrementLater => {},
        }
    }
}

/// Counter side effects
///
/// - `IncrementLater` answers `Increment` after `delay`, or nothing if the
///   dispatch is cancelled first
/// - `CountTo(target)` re-emits itself until the count reaches `target`
#[derive(Debug, Clone, Copy)]
pub struct TimerMiddleware {
    delay: Duration,
}

impl TimerMiddleware {
    /// Create a timer with the given delay
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Middleware for TimerMiddleware {
    type State = CounterState;
    type Action = CounterAction;

    fn handle(
        &self,
        state: &CounterState,
        action: &CounterAction,
        _cancel: &CancellationToken,
    ) -> Effect<CounterAction> {
        match action {
            CounterAction::IncrementLater => Effect::delay(self.delay, CounterAction::Increment),
            CounterAction::CountTo(target) if state.count < *target => {
                Effect::Emit(CounterAction::CountTo(*target))
            },
            _ => Effect::None,
        }
    }
}

/// Application state: one main counter, named counters and a list of rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    /// The main counter
    pub main: CounterState,
    /// Counters addressed by name
    pub named: HashMap<String, CounterState>,
    /// Counters addressed by position
    pub rows: Vec<CounterState>,
}

impl AppState {
    /// Sum of every counter
    #[must_use]
    pub fn total(&self) -> i64 {
        self.main.count
            + self.named.values().map(|c| c.count).sum::<i64>()
            + self.rows.iter().map(|c| c.count).sum::<i64>()
    }
}

/// Application actions
#[derive(Debug, Clone, PartialEq, Eq, Prisms)]
pub enum AppAction {
    /// Action for the main counter
    Main(CounterAction),
    /// Action for a named counter
    Named(String, CounterAction),
    /// Action for the counter in a given row
    Row(usize, CounterAction),
    /// Create a named counter (no-op if it exists)
    AddNamed(String),
    /// Append a row
    AddRow,
}

fn main_lens() -> Lens<AppState, CounterState> {
    Lens::new(|s| &s.main, |s| &mut s.main)
}

fn named_lens() -> Lens<AppState, HashMap<String, CounterState>> {
    Lens::new(|s| &s.named, |s| &mut s.named)
}

fn rows_lens() -> Lens<AppState, Vec<CounterState>> {
    Lens::new(|s| &s.rows, |s| &mut s.rows)
}

/// The application reducer
///
/// The counter reducer lifted three ways, followed by the structural actions.
#[must_use]
pub fn app_reducer() -> impl Reducer<State = AppState, Action = AppAction> + Send + Sync {
    combine_reducers(vec![
        Box::new(scope_reducer(CounterReducer, main_lens(), AppAction::main())),
        Box::new(keyed_reducer(CounterReducer, named_lens(), AppAction::named())),
        Box::new(indexed_reducer(CounterReducer, rows_lens(), AppAction::row())),
        Box::new(reducer_fn(|state: &mut AppState, action: &AppAction| {
            match action {
                AppAction::AddNamed(name) => {
                    state.named.entry(name.clone()).or_default();
                },
                AppAction::AddRow => state.rows.push(CounterState::default()),
                AppAction::Main(_) | AppAction::Named(..) | AppAction::Row(..) => {},
            }
        })),
    ])
}

/// The application middleware: the timer lifted three ways, plus an audit log
#[must_use]
pub fn app_middlewares(delay: Duration) -> Vec<BoxedMiddleware<AppState, AppAction>> {
    let timer = TimerMiddleware::new(delay);
    vec![
        timer.scope(main_lens(), AppAction::main()).boxed(),
        timer.for_each_key(named_lens(), AppAction::named()).boxed(),
        timer.for_each_index(rows_lens(), AppAction::row()).boxed(),
        middleware_fn(|state: &AppState, action: &AppAction, _: &CancellationToken| {
            tracing::debug!(?action, total = state.total(), "Counter action reduced");
            Effect::None
        })
        .boxed(),
    ]
}

/// Build the application store
#[must_use]
pub fn app_store(
    initial: AppState,
    delay: Duration,
) -> Store<AppState, AppAction, impl Reducer<State = AppState, Action = AppAction> + Send + Sync> {
    app_store_with_config(initial, delay, StoreConfig::default())
}

/// Build the application store with a custom configuration
#[must_use]
pub fn app_store_with_config(
    initial: AppState,
    delay: Duration,
    config: StoreConfig,
) -> Store<AppState, AppAction, impl Reducer<State = AppState, Action = AppAction> + Send + Sync> {
    Store::with_config(initial, app_reducer(), app_middlewares(delay), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowstore_testing::{MiddlewareTest, ReducerTest, assertions};

    #[test]
    fn test_increment() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState::default())
            .when_action(CounterAction::Increment)
            .then_state(|state| assert_eq!(state.count, 1))
            .run();
    }

    #[test]
    fn test_multiple_operations() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: 5 })
            .when_actions([
                CounterAction::Increment,
                CounterAction::Increment,
                CounterAction::Decrement,
            ])
            .then_state(|state| assert_eq!(state.count, 6))
            .deterministic()
            .run();
    }

    #[test]
    fn test_reset() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: 42 })
            .when_action(CounterAction::Reset)
            .then_state(|state| assert_eq!(state.count, 0))
            .run();
    }

    #[test]
    fn test_count_to_stops_at_target() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: 3 })
            .when_action(CounterAction::CountTo(3))
            .then_unchanged()
            .run();
    }

    #[test]
    fn test_app_reducer_ignores_missing_targets() {
        ReducerTest::new(app_reducer())
            .given_state(AppState::default())
            .when_actions([
                AppAction::Named("missing".into(), CounterAction::Increment),
                AppAction::Row(5, CounterAction::Increment),
            ])
            .then_unchanged()
            .run();
    }

    #[test]
    fn test_app_reducer_structural_actions() {
        ReducerTest::new(app_reducer())
            .given_state(AppState::default())
            .when_actions([
                AppAction::AddNamed("a".into()),
                AppAction::Named("a".into(), CounterAction::Increment),
                AppAction::AddNamed("a".into()),
                AppAction::AddRow,
                AppAction::Row(0, CounterAction::Decrement),
                AppAction::Main(CounterAction::Increment),
            ])
            .then_state(|state| {
                assert_eq!(state.named["a"].count, 1);
                assert_eq!(state.rows, vec![CounterState { count: -1 }]);
                assert_eq!(state.main.count, 1);
                assert_eq!(state.total(), 1);
            })
            .run();
    }

    #[tokio::test]
    async fn test_timer_delays_increment() {
        MiddlewareTest::new(TimerMiddleware::new(Duration::from_millis(5)))
            .given_state(CounterState::default())
            .when_action(CounterAction::IncrementLater)
            .then_effect(assertions::assert_is_delay)
            .then_follow_up(|action| assert_eq!(action, Some(&CounterAction::Increment)))
            .run()
            .await;
    }

    #[tokio::test]
    async fn test_timer_cancelled() {
        MiddlewareTest::new(TimerMiddleware::new(Duration::from_secs(10)))
            .given_state(CounterState::default())
            .when_action(CounterAction::IncrementLater)
            .when_cancelled()
            .then_no_follow_up()
            .run()
            .await;
    }

    #[tokio::test]
    async fn test_count_to_re_emits_below_target() {
        let follow_up = MiddlewareTest::new(TimerMiddleware::new(Duration::ZERO))
            .given_state(CounterState { count: 1 })
            .when_action(CounterAction::CountTo(3))
            .run()
            .await;
        assert_eq!(follow_up, Some(CounterAction::CountTo(3)));

        MiddlewareTest::new(TimerMiddleware::new(Duration::ZERO))
            .given_state(CounterState { count: 3 })
            .when_action(CounterAction::CountTo(3))
            .then_effect(assertions::assert_no_effect)
            .run()
            .await;
    }
}
