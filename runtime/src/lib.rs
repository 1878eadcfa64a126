//! # Flowstore Runtime
//!
//! The [`Store`]: single owner of application state that reduces actions and
//! fans each one out to its middleware.
//!
//! ## Core Components
//!
//! - **Store**: Serializes reduction behind one `RwLock` and spawns middleware effects
//! - **Dispatch tree**: Every follow-up re-enters dispatch under the same cancellation token
//! - **Derived store / Binding**: Thin read/write views over a store for UI layers
//!
//! ## Example
//!
//! ```
//! use flowstore_core::{CancellationToken, Effect, middleware::middleware_fn, reducer::reducer_fn};
//! use flowstore_runtime::Store;
//!
//! #[derive(Clone, Debug)]
//! enum Action {
//!     Increment,
//!     IncrementLater,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let reducer = reducer_fn(|count: &mut i64, action: &Action| {
//!     if let Action::Increment = action {
//!         *count += 1;
//!     }
//! });
//! let echo = middleware_fn(|_: &i64, action: &Action, _: &CancellationToken| match action {
//!     Action::IncrementLater => Effect::Emit(Action::Increment),
//!     Action::Increment => Effect::None,
//! });
//!
//! let store = Store::new(1, reducer, vec![Box::new(echo)]);
//! store.send(Action::IncrementLater).await;
//! store.send(Action::Increment).await;
//!
//! assert_eq!(store.state(|count| *count).await, 3);
//! # }
//! ```

use flowstore_core::{CancellationToken, effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// Read/write accessor for one projected value
pub mod binding;

/// Deduplicated projection of a store's state
pub mod derived;

/// Prometheus metrics for observability
pub mod metrics;

pub use binding::Binding;
pub use derived::DerivedStore;

use crate::metrics::StoreMetrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors returned by the auxiliary store APIs
    ///
    /// `send` itself is infallible: failures inside middleware are the
    /// middleware's business and surface as "no follow-up".
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// The observed channel closed, typically because the store was dropped
        #[error("Channel closed")]
        ChannelClosed,
    }

    /// Errors from reading a [`StoreConfig`](crate::StoreConfig) out of the environment
    #[derive(Error, Debug, PartialEq, Eq)]
    pub enum ConfigError {
        /// A variable was set to something that does not parse
        #[error("Invalid value {value:?} for {name}: {reason}")]
        InvalidValue {
            /// Variable name
            name: &'static str,
            /// Raw value as found
            value: String,
            /// What was expected
            reason: &'static str,
        },
    }
}

pub use error::{ConfigError, StoreError};

/// Environment variable for [`StoreConfig::broadcast_capacity`]
pub const ENV_BROADCAST_CAPACITY: &str = "FLOWSTORE_BROADCAST_CAPACITY";
/// Environment variable for [`StoreConfig::max_dispatch_depth`] (`none` disables the limit, `0` forbids follow-ups)
pub const ENV_MAX_DISPATCH_DEPTH: &str = "FLOWSTORE_MAX_DISPATCH_DEPTH";
/// Environment variable for [`StoreConfig::default_shutdown_timeout`], in milliseconds
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "FLOWSTORE_SHUTDOWN_TIMEOUT_MS";

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use flowstore_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_broadcast_capacity(256)
///     .with_max_dispatch_depth(Some(64))
///     .with_shutdown_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.max_dispatch_depth, Some(64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of the follow-up action broadcast channel (at least 1)
    pub broadcast_capacity: usize,
    /// Deepest follow-up chain a single `send` may produce
    ///
    /// A follow-up at depth `d` (the sent action has depth 0) is dropped
    /// with a warning when `d` exceeds this bound. `None` disables the check.
    pub max_dispatch_depth: Option<usize>,
    /// Timeout used by [`Store::close`]
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Default follow-up depth bound
    pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 1024;

    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(
        broadcast_capacity: usize,
        max_dispatch_depth: Option<usize>,
        default_shutdown_timeout: Duration,
    ) -> Self {
        Self {
            broadcast_capacity: if broadcast_capacity == 0 {
                1
            } else {
                broadcast_capacity
            },
            max_dispatch_depth,
            default_shutdown_timeout,
        }
    }

    /// Set the action broadcast capacity (clamped to at least 1)
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Set the follow-up depth bound; `None` disables it
    #[must_use]
    pub const fn with_max_dispatch_depth(mut self, depth: Option<usize>) -> Self {
        self.max_dispatch_depth = depth;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }

    /// Read overrides from the process environment
    ///
    /// Unset variables keep their defaults. See [`ENV_BROADCAST_CAPACITY`],
    /// [`ENV_MAX_DISPATCH_DEPTH`] and [`ENV_SHUTDOWN_TIMEOUT_MS`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a set variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through an arbitrary lookup function
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a present value does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BROADCAST_CAPACITY) {
            let capacity = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: ENV_BROADCAST_CAPACITY,
                    value: raw.clone(),
                    reason: "expected a positive integer",
                })?;
            config.broadcast_capacity = capacity;
        }

        if let Some(raw) = lookup(ENV_MAX_DISPATCH_DEPTH) {
            let trimmed = raw.trim();
            config.max_dispatch_depth = if trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                match trimmed.parse::<usize>() {
                    Ok(depth) => Some(depth),
                    Err(_) => {
                        return Err(ConfigError::InvalidValue {
                            name: ENV_MAX_DISPATCH_DEPTH,
                            value: raw.clone(),
                            reason: "expected an integer or \"none\"",
                        });
                    },
                }
            };
        }

        if let Some(raw) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: ENV_SHUTDOWN_TIMEOUT_MS,
                    value: raw.clone(),
                    reason: "expected milliseconds as an integer",
                })?;
            config.default_shutdown_timeout = Duration::from_millis(millis);
        }

        tracing::debug!(?config, "Store configuration loaded");
        Ok(config)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            max_dispatch_depth: Some(Self::DEFAULT_MAX_DISPATCH_DEPTH),
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Guard that decrements the in-flight effect counter on drop
///
/// Runs even if the effect panics.
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        let remaining = self.0.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        StoreMetrics::record_pending(remaining);
    }
}

/// Store module - the dispatcher
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, CancellationToken, Duration, Effect,
        Ordering, Reducer, RwLock, StoreConfig, StoreError, StoreMetrics,
    };
    use flowstore_core::middleware::BoxedMiddleware;
    use futures::future::{BoxFuture, FutureExt, join_all};
    use smallvec::SmallVec;
    use tokio::sync::{broadcast, watch};
    use tokio::task::JoinHandle;

    /// Effects collected from one fan-out
    type Effects<A> = SmallVec<[Effect<A>; 4]>;

    /// The Store - owner of state and coordinator of middleware
    ///
    /// The Store manages:
    /// 1. State (behind a `RwLock`, written only by the reducer)
    /// 2. Reducer (pure transitions)
    /// 3. Middleware (fixed, ordered list; run concurrently per action)
    /// 4. Dispatch trees (follow-ups, cancellation, depth bound)
    ///
    /// Cloning is cheap and every clone drives the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, R>
    where
        R: Reducer<State = S, Action = A>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        middlewares: Arc<[BoxedMiddleware<S, A>]>,
        config: StoreConfig,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Root of every tree started by [`Store::send`]; cancelled on shutdown
        root: CancellationToken,
        /// Bumped after every reduction
        revision: Arc<watch::Sender<u64>>,
        /// Every follow-up action, cloned before it is dispatched
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, R> Store<S, A, R>
    where
        R: Reducer<State = S, Action = A> + Send + Sync + 'static,
        S: Send + Sync + 'static,
        A: Clone + Send + Sync + 'static,
    {
        /// Create a new store with default configuration
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation
        /// - `middlewares`: Effect handlers, fixed for the store's lifetime
        #[must_use]
        pub fn new(initial_state: S, reducer: R, middlewares: Vec<BoxedMiddleware<S, A>>) -> Self {
            Self::with_config(initial_state, reducer, middlewares, StoreConfig::default())
        }

        /// Create a new store with custom configuration
        ///
        /// # Example
        ///
        /// ```ignore
        /// let config = StoreConfig::from_env()?.with_broadcast_capacity(256);
        /// let store = Store::with_config(AppState::default(), AppReducer, middlewares, config);
        /// ```
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            middlewares: Vec<BoxedMiddleware<S, A>>,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
            let (revision, _) = watch::channel(0);

            tracing::debug!(
                middlewares = middlewares.len(),
                max_dispatch_depth = ?config.max_dispatch_depth,
                "Store created"
            );

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                middlewares: middlewares.into(),
                config,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                root: CancellationToken::new(),
                revision: Arc::new(revision),
                action_broadcast,
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires the write lock and runs the reducer
        /// 2. Downgrades to a read lock and hands the same snapshot, with the
        ///    original action, to every middleware
        /// 3. Spawns the returned effects; they run concurrently
        /// 4. Dispatches each follow-up recursively under the same token
        ///
        /// Resolves once the whole tree has completed or been cancelled.
        /// Dropping the returned future cancels the tree; reductions already
        /// committed stay committed.
        ///
        /// After [`shutdown`](Self::shutdown) this is a logged no-op.
        ///
        /// # Panics
        ///
        /// A panicking reducer, or a middleware panicking inside `handle`,
        /// propagates to the caller. Panics inside effects are isolated.
        pub async fn send(&self, action: A) {
            self.send_with(action, &self.root).await;
        }

        /// Send an action under a caller-supplied cancellation scope
        ///
        /// The tree runs under a child of both `cancel` and the store's root:
        /// cancelling `cancel` or shutting the store down stops it, while
        /// dropping this future cancels only the child.
        ///
        /// The action itself is always reduced; cancellation only suppresses
        /// the effects and follow-ups it would spawn.
        #[tracing::instrument(skip(self, action, cancel), name = "store_send")]
        pub async fn send_with(&self, action: A, cancel: &CancellationToken) {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                StoreMetrics::record_rejected();
                return;
            }

            let token = cancel.linked_child(&self.root);
            let guard = token.clone().drop_guard();
            self.dispatch(action, token, 0).await;
            guard.disarm();
            tracing::debug!("Dispatch tree completed");
        }

        /// Send an action and wait for a matching follow-up
        ///
        /// Subscribes to the follow-up broadcast before sending, so a reply
        /// produced immediately is not missed. The send runs in the
        /// background; on timeout its tree is cancelled.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`]: the store is shut down
        /// - [`StoreError::Timeout`]: no matching action within `timeout`
        /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
        ///
        /// # Example
        ///
        /// ```ignore
        /// let reply = store
        ///     .send_and_wait_for(
        ///         Action::Fetch { id },
        ///         |a| matches!(a, Action::Fetched { .. } | Action::FetchFailed { .. }),
        ///         Duration::from_secs(5),
        ///     )
        ///     .await?;
        /// ```
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            if self.shutdown.load(Ordering::Acquire) {
                return Err(StoreError::ShutdownInProgress);
            }

            // Subscribe before sending
            let mut rx = self.action_broadcast.subscribe();

            let store = self.clone();
            let request = tokio::spawn(async move { store.send(action).await });

            let outcome = tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // If the match was dropped the timeout catches it
                            tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await;

            if let Ok(result) = outcome {
                result
            } else {
                request.abort();
                Err(StoreError::Timeout)
            }
        }

        /// Subscribe to every follow-up action produced by middleware
        ///
        /// Actions passed to `send` are not broadcast, only their follow-ups.
        /// A receiver that falls behind gets `RecvError::Lagged`.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Subscribe to the state revision counter
        ///
        /// The value increases by one after every reduction, before any
        /// middleware observes the new state.
        #[must_use]
        pub fn subscribe_state(&self) -> watch::Receiver<u64> {
            self.revision.subscribe()
        }

        /// Number of reductions so far
        #[must_use]
        pub fn revision(&self) -> u64 {
            *self.revision.borrow()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Clone the current state
        pub async fn snapshot(&self) -> S
        where
            S: Clone,
        {
            self.state.read().await.clone()
        }

        /// Middleware effects currently in flight, including their follow-up trees
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Token that parents every tree started by [`send`](Self::send)
        #[must_use]
        pub fn cancellation_token(&self) -> CancellationToken {
            self.root.clone()
        }

        /// The configuration this store was built with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Returns true once shutdown has started
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Rejects new actions
        /// 2. Cancels every tree started by [`send`](Self::send) or
        ///    [`send_with`](Self::send_with)
        /// 3. Waits for in-flight effects, up to `timeout`
        ///
        /// Effects that ignore cancellation keep running; their follow-ups
        /// are dropped.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when the timeout expires.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            StoreMetrics::record_shutdown_initiated();

            self.shutdown.store(true, Ordering::Release);
            self.root.cancel();

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    StoreMetrics::record_shutdown_completed();
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running",
                        pending
                    );
                    StoreMetrics::record_shutdown_timeout();
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tracing::debug!(
                    pending_effects = pending,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for effects to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// [`shutdown`](Self::shutdown) with the configured default timeout
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when the timeout expires.
        pub async fn close(&self) -> Result<(), StoreError> {
            self.shutdown(self.config.default_shutdown_timeout).await
        }

        /// Shared state cell, for read-only views
        pub(crate) fn state_cell(&self) -> Arc<RwLock<S>> {
            Arc::clone(&self.state)
        }

        /// Reduce now; run the middleware fan-out in the background
        ///
        /// The background tree is parented to the root token.
        pub(crate) async fn reduce_then_detach(&self, action: A) {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                StoreMetrics::record_rejected();
                return;
            }

            let token = self.root.child_token();
            let Some(effects) = self.reduce_and_collect(&action, &token, 0).await else {
                return;
            };
            if effects.is_empty() {
                return;
            }

            let store = self.clone();
            tokio::spawn(async move { store.fan_out(effects, token, 0).await });
        }

        /// One dispatch step: reduce, collect effects, fan out
        ///
        /// Boxed because follow-ups recurse into it.
        fn dispatch(&self, action: A, token: CancellationToken, depth: usize) -> BoxFuture<'static, ()> {
            let store = self.clone();
            async move {
                if depth > 0 && token.is_cancelled() {
                    tracing::debug!(depth, "Skipping dispatch: tree cancelled");
                    StoreMetrics::record_cancelled();
                    return;
                }

                if let Some(effects) = store.reduce_and_collect(&action, &token, depth).await {
                    store.fan_out(effects, token, depth).await;
                }
            }
            .boxed()
        }

        /// Reduce `action` and hand the resulting snapshot to every middleware
        ///
        /// Returns `None` if a follow-up's tree was cancelled while waiting for
        /// the lock. The sent action (depth 0) is always reduced.
        async fn reduce_and_collect(
            &self,
            action: &A,
            token: &CancellationToken,
            depth: usize,
        ) -> Option<Effects<A>> {
            let mut state = self.state.write().await;
            tracing::trace!("Acquired write lock on state");

            if depth > 0 && token.is_cancelled() {
                tracing::debug!("Skipping reduction: tree cancelled");
                StoreMetrics::record_cancelled();
                return None;
            }

            let start = std::time::Instant::now();
            {
                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();
                self.reducer.reduce(&mut state, action);
            }
            StoreMetrics::record_reduce(start.elapsed());

            // No writer can interleave between the reduction and this read
            let state = state.downgrade();
            self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));

            let effects: Effects<A> = self
                .middlewares
                .iter()
                .map(|middleware| middleware.handle(&state, action, token))
                .filter(|effect| !effect.is_none())
                .collect();

            tracing::trace!(effects = effects.len(), "Middleware fan-out collected");
            Some(effects)
        }

        /// Spawn every effect and wait for each one's follow-up tree
        async fn fan_out(&self, effects: Effects<A>, token: CancellationToken, depth: usize) {
            if effects.is_empty() {
                return;
            }
            if token.is_cancelled() {
                tracing::debug!(depth, effects = effects.len(), "Dropping effects: tree cancelled");
                StoreMetrics::record_cancelled();
                return;
            }
            StoreMetrics::record_effects(effects.len());

            let handles: Vec<JoinHandle<()>> = effects
                .into_iter()
                .map(|effect| self.spawn_effect(effect, token.clone(), depth))
                .collect();

            for result in join_all(handles).await {
                if let Err(error) = result {
                    if error.is_panic() {
                        tracing::error!(error = %error, "Middleware effect panicked, treating as no follow-up");
                        StoreMetrics::record_panic();
                    } else {
                        tracing::warn!(error = %error, "Middleware effect task was aborted");
                    }
                }
            }
        }

        /// Run one effect on the runtime, then dispatch its follow-up
        fn spawn_effect(
            &self,
            effect: Effect<A>,
            token: CancellationToken,
            depth: usize,
        ) -> JoinHandle<()> {
            let pending = self.pending_effects.fetch_add(1, Ordering::SeqCst) + 1;
            StoreMetrics::record_pending(pending);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

            let store = self.clone();
            tokio::spawn(async move {
                let _pending_guard = pending_guard;
                let follow_up = effect.resolve(&token).await;
                store.follow_up(follow_up, token, depth).await;
            })
        }

        /// Feed a follow-up back into dispatch, one level deeper
        async fn follow_up(&self, follow_up: Option<A>, token: CancellationToken, depth: usize) {
            let Some(action) = follow_up else {
                tracing::trace!("Effect completed with no follow-up");
                return;
            };

            if token.is_cancelled() || self.shutdown.load(Ordering::Acquire) {
                tracing::debug!(depth, "Dropping follow-up: tree cancelled");
                StoreMetrics::record_cancelled();
                return;
            }

            let depth = depth + 1;
            if self
                .config
                .max_dispatch_depth
                .is_some_and(|max_depth| depth > max_depth)
            {
                tracing::warn!(
                    depth,
                    max_depth = ?self.config.max_dispatch_depth,
                    "Dropping follow-up: dispatch depth limit reached"
                );
                StoreMetrics::record_depth_exceeded();
                return;
            }

            StoreMetrics::record_follow_up();
            // No receivers is fine
            let _ = self.action_broadcast.send(action.clone());
            self.dispatch(action, token, depth).await;
        }
    }

    impl<S, A, R> Clone for Store<S, A, R>
    where
        R: Reducer<State = S, Action = A>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                middlewares: Arc::clone(&self.middlewares),
                config: self.config.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                root: self.root.clone(),
                revision: Arc::clone(&self.revision),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
