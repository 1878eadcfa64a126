//! # Flowstore Testing
//!
//! Testing utilities for flowstore reducers, middleware and stores.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then checks for reducers
//! - [`MiddlewareTest`]: Given-When-Then checks for middleware, with effect resolution
//! - Mock middleware that record or script follow-ups
//! - Property helpers for the prism and lens laws
//!
//! ## Example
//!
//! ```
//! use flowstore_core::reducer::reducer_fn;
//! use flowstore_runtime::Store;
//! use flowstore_testing::mocks::RecordingMiddleware;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let recorder = RecordingMiddleware::new();
//! let store = Store::new(
//!     0_i32,
//!     reducer_fn(|count: &mut i32, delta: &i32| *count += delta),
//!     vec![Box::new(recorder.clone())],
//! );
//!
//! store.send(2).await;
//!
//! // Middleware observed the state after reduction
//! assert_eq!(recorder.records(), vec![(2, 2)]);
//! # }
//! ```


/// Mock middleware
pub mod mocks {
    use flowstore_core::{CancellationToken, Effect, middleware::Middleware};
    use std::marker::PhantomData;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// Records every `(state, action)` pair it observes
    ///
    /// Never produces a follow-up. Clones share one record.
    pub struct RecordingMiddleware<S, A> {
        records: Arc<Mutex<Vec<(S, A)>>>,
    }

    impl<S: Clone, A: Clone> RecordingMiddleware<S, A> {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self {
                records: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Every observed `(state, action)` pair, in arrival order
        #[must_use]
        pub fn records(&self) -> Vec<(S, A)> {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Observed actions only
        #[must_use]
        pub fn recorded_actions(&self) -> Vec<A> {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(_, action)| action.clone())
                .collect()
        }

        /// Number of observed actions
        #[must_use]
        pub fn len(&self) -> usize {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// True if nothing has been observed yet
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl<S: Clone, A: Clone> Default for RecordingMiddleware<S, A> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<S, A> Clone for RecordingMiddleware<S, A> {
        fn clone(&self) -> Self {
            Self {
                records: Arc::clone(&self.records),
            }
        }
    }

    impl<S, A> Middleware for RecordingMiddleware<S, A>
    where
        S: Clone + Send + Sync,
        A: Clone + Send + Sync,
    {
        type State = S;
        type Action = A;

        fn handle(&self, state: &S, action: &A, _cancel: &CancellationToken) -> Effect<A> {
            self.records
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((state.clone(), action.clone()));
            Effect::None
        }
    }

    type Script<A> = Box<dyn Fn(&A) -> Option<A> + Send + Sync>;

    /// Answers actions with scripted follow-ups
    ///
    /// The script maps an incoming action to the follow-up to emit, or
    /// `None` to stay silent.
    ///
    /// ```
    /// use flowstore_core::{CancellationToken, Effect, middleware::Middleware};
    /// use flowstore_testing::mocks::ScriptedMiddleware;
    ///
    /// let ping_pong = ScriptedMiddleware::<(), &str>::new(|action: &&str| {
    ///     (*action == "ping").then_some("pong")
    /// });
    ///
    /// let effect = ping_pong.handle(&(), &"ping", &CancellationToken::new());
    /// assert!(matches!(effect, Effect::Emit("pong")));
    /// ```
    pub struct ScriptedMiddleware<S, A> {
        script: Script<A>,
        delay: Option<Duration>,
        _state: PhantomData<fn(&S)>,
    }

    impl<S, A> ScriptedMiddleware<S, A> {
        /// Create a middleware answering with `script`
        #[must_use]
        pub fn new<F>(script: F) -> Self
        where
            F: Fn(&A) -> Option<A> + Send + Sync + 'static,
        {
            Self {
                script: Box::new(script),
                delay: None,
                _state: PhantomData,
            }
        }

        /// Deliver follow-ups as [`Effect::Delay`] instead of immediately
        #[must_use]
        pub const fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    impl<S, A> Middleware for ScriptedMiddleware<S, A>
    where
        A: Send + Sync,
    {
        type State = S;
        type Action = A;

        fn handle(&self, _state: &S, action: &A, _cancel: &CancellationToken) -> Effect<A> {
            match ((self.script)(action), self.delay) {
                (None, _) => Effect::None,
                (Some(follow_up), None) => Effect::Emit(follow_up),
                (Some(follow_up), Some(delay)) => Effect::delay(delay, follow_up),
            }
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use std::time::Duration;
    use tokio::sync::broadcast;
    use tracing_subscriber::EnvFilter;

    /// Install a test-friendly tracing subscriber
    ///
    /// Honours `RUST_LOG`, defaulting to `warn`. Safe to call from every
    /// test; only the first call installs anything.
    pub fn init_test_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// Receive up to `count` broadcast actions, giving up after `timeout`
    ///
    /// Lagged notifications are skipped. Returns what arrived in time.
    pub async fn collect_actions<A: Clone>(
        rx: &mut broadcast::Receiver<A>,
        count: usize,
        timeout: Duration,
    ) -> Vec<A> {
        let mut actions = Vec::with_capacity(count);
        let _ = tokio::time::timeout(timeout, async {
            while actions.len() < count {
                match rx.recv().await {
                    Ok(action) => actions.push(action),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Test receiver lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
        .await;
        actions
    }
}

/// Property-based testing utilities using proptest
pub mod properties {
    use flowstore_core::{Lens, Prism};
    use proptest::prelude::*;
    use proptest::test_runner::TestRunner;
    use std::fmt::Debug;

    /// Check `extract(embed(p)) == Some(p)` for generated parts
    ///
    /// # Panics
    ///
    /// Panics with the shrunk counterexample if the law fails.
    #[allow(clippy::panic)] // Test assertion
    pub fn check_prism_roundtrip<W, P, S>(prism: &Prism<W, P>, parts: S)
    where
        W: 'static,
        P: Clone + PartialEq + Debug + 'static,
        S: Strategy<Value = P>,
    {
        let mut runner = TestRunner::default();
        let result = runner.run(&parts, |part| {
            let whole = prism.embed(part.clone());
            prop_assert_eq!(prism.extract(&whole), Some(part));
            Ok(())
        });
        if let Err(err) = result {
            panic!("Prism round-trip law violated: {err}");
        }
    }

    /// Check that reading a lens after setting it yields the value set
    ///
    /// # Panics
    ///
    /// Panics with the shrunk counterexample if the law fails.
    #[allow(clippy::panic)] // Test assertion
    pub fn check_lens_set_get<W, P, SW, SP>(lens: Lens<W, P>, wholes: SW, parts: SP)
    where
        W: Debug,
        P: Clone + PartialEq + Debug,
        SW: Strategy<Value = W>,
        SP: Strategy<Value = P>,
    {
        let mut runner = TestRunner::default();
        let result = runner.run(&(wholes, parts), |(mut whole, part)| {
            lens.set(&mut whole, part.clone());
            prop_assert_eq!(lens.get(&whole), &part);
            Ok(())
        });
        if let Err(err) = result {
            panic!("Lens set-get law violated: {err}");
        }
    }
}

// Re-export commonly used items
pub use middleware_test::MiddlewareTest;
pub use mocks::{RecordingMiddleware, ScriptedMiddleware};
pub use reducer_test::{ReducerTest, assertions};
