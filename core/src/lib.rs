//! # Flowstore Core
//!
//! Core traits and types for the flowstore unidirectional state container.
//!
//! This crate provides the abstractions a [`Store`](../flowstore_runtime/struct.Store.html)
//! is built from, and the algebra for composing them.
//!
//! ## Core Concepts
//!
//! - **State**: Value-semantics snapshot of a feature
//! - **Action**: Discrete input, usually an enum with one case per event
//! - **Reducer**: Pure transition `(State, Action) → State`, applied in place
//! - **Middleware**: Effect handler `(State, Action) → Effect`, resolving to at most one follow-up action
//! - **Prism**: Partial mapping between a composite action and one of its cases
//! - **Lens**: Accessor pair addressing a sub-state inside a larger state
//!
//! ## Composition
//!
//! Reducers and middleware written for a narrow state/action pair can be lifted
//! into a larger one:
//!
//! | Shape | Reducer | Middleware |
//! |-------|---------|------------|
//! | optional state | [`OptionalReducer`] | [`OptionalMiddleware`] |
//! | embedded field | [`ScopedReducer`] | [`ScopedMiddleware`] |
//! | map entry | [`KeyedReducer`] | [`KeyedMiddleware`] |
//! | sequence element | [`IndexedReducer`] | [`IndexedMiddleware`] |
//!
//! ## Example
//!
//! ```
//! use flowstore_core::reducer::Reducer;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//!     Decrement,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!
//!     fn reduce(&self, state: &mut CounterState, action: &CounterAction) {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!             CounterAction::Decrement => state.count -= 1,
//!         }
//!     }
//! }
//!
//! let mut state = CounterState::default();
//! CounterReducer.reduce(&mut state, &CounterAction::Increment);
//! assert_eq!(state.count, 1);
//! ```

/// Cooperative cancellation shared by a dispatch tree
pub mod cancellation;

/// Reducer composition utilities
pub mod composition;

/// Accessor pairs addressing sub-state
pub mod lens;

/// Middleware trait and combinators
pub mod middleware;

/// Partial mappings between composite and narrow action types
pub mod prism;

pub use cancellation::{CancellationToken, DropGuard};
pub use composition::{
    CombinedReducer, IndexedReducer, KeyedReducer, OptionalReducer, ScopedReducer, Then,
    combine_reducers, indexed_reducer, keyed_reducer, scope_reducer,
};
pub use effect::Effect;
pub use lens::Lens;
pub use middleware::{
    BoxedMiddleware, FnMiddleware, IndexedMiddleware, KeyedMiddleware, Middleware, MiddlewareExt,
    OptionalMiddleware, ScopedMiddleware, middleware_fn,
};
pub use prism::Prism;
pub use reducer::{EmptyReducer, FnReducer, Reducer, ReducerExt, reducer_fn};

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action) → State`.
///
/// They are applied in place on an owned state: the observable result is the
/// same as returning a new value, without the copy. A reducer must be total
/// (unrecognised actions are no-ops), deterministic, and must never block,
/// sleep, or perform I/O. Side effects belong in [`Middleware`](crate::middleware::Middleware).
pub mod reducer {
    use crate::composition::{
        IndexedReducer, KeyedReducer, OptionalReducer, ScopedReducer, Then,
    };
    use crate::lens::Lens;
    use crate::prism::Prism;
    use std::collections::HashMap;
    use std::hash::Hash;
    use std::marker::PhantomData;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for TodoReducer {
    ///     type State = TodoState;
    ///     type Action = TodoAction;
    ///
    ///     fn reduce(&self, state: &mut TodoState, action: &TodoAction) {
    ///         match action {
    ///             TodoAction::Toggle => state.done = !state.done,
    ///             TodoAction::Rename(title) => state.title.clone_from(title),
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Apply an action to the state
        ///
        /// Calling this twice with equal inputs must produce equal states.
        fn reduce(&self, state: &mut Self::State, action: &Self::Action);
    }

    impl<R: Reducer + ?Sized> Reducer for Box<R> {
        type State = R::State;
        type Action = R::Action;

        fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
            (**self).reduce(state, action);
        }
    }

    impl<R: Reducer + ?Sized> Reducer for std::sync::Arc<R> {
        type State = R::State;
        type Action = R::Action;

        fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
            (**self).reduce(state, action);
        }
    }

    /// Identity reducer: leaves state untouched for every action
    ///
    /// Useful as the store's reducer when only middleware effects matter.
    pub struct EmptyReducer<S, A> {
        _phantom: PhantomData<fn(&mut S, &A)>,
    }

    impl<S, A> EmptyReducer<S, A> {
        /// Create a new identity reducer
        #[must_use]
        pub const fn new() -> Self {
            Self {
                _phantom: PhantomData,
            }
        }
    }

    impl<S, A> Default for EmptyReducer<S, A> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<S, A> Clone for EmptyReducer<S, A> {
        fn clone(&self) -> Self {
            Self::new()
        }
    }

    impl<S, A> std::fmt::Debug for EmptyReducer<S, A> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("EmptyReducer")
        }
    }

    impl<S, A> Reducer for EmptyReducer<S, A> {
        type State = S;
        type Action = A;

        fn reduce(&self, _state: &mut S, _action: &A) {}
    }

    /// A reducer backed by a plain function or closure
    ///
    /// Created by [`reducer_fn`].
    pub struct FnReducer<S, A, F> {
        f: F,
        _phantom: PhantomData<fn(&mut S, &A)>,
    }

    impl<S, A, F: Clone> Clone for FnReducer<S, A, F> {
        fn clone(&self) -> Self {
            Self {
                f: self.f.clone(),
                _phantom: PhantomData,
            }
        }
    }

    impl<S, A, F> Reducer for FnReducer<S, A, F>
    where
        F: Fn(&mut S, &A),
    {
        type State = S;
        type Action = A;

        fn reduce(&self, state: &mut S, action: &A) {
            (self.f)(state, action);
        }
    }

    /// Turn a closure into a [`Reducer`]
    ///
    /// # Example
    ///
    /// ```
    /// use flowstore_core::reducer::{Reducer, reducer_fn};
    ///
    /// let double = reducer_fn(|state: &mut i32, factor: &i32| *state *= factor);
    /// let mut value = 3;
    /// double.reduce(&mut value, &2);
    /// assert_eq!(value, 6);
    /// ```
    pub const fn reducer_fn<S, A, F>(f: F) -> FnReducer<S, A, F>
    where
        F: Fn(&mut S, &A),
    {
        FnReducer {
            f,
            _phantom: PhantomData,
        }
    }

    /// Combinator methods available on every [`Reducer`]
    pub trait ReducerExt: Reducer + Sized {
        /// Run `self`, then `next`, against the same action
        fn combine<R2>(self, next: R2) -> Then<Self, R2>
        where
            R2: Reducer<State = Self::State, Action = Self::Action>,
        {
            Then::new(self, next)
        }

        /// Lift into `Option<State>`; an absent state stays absent
        fn optional(self) -> OptionalReducer<Self> {
            OptionalReducer::new(self)
        }

        /// Embed into a larger state and action type
        fn scope<S, A>(
            self,
            lens: Lens<S, Self::State>,
            prism: Prism<A, Self::Action>,
        ) -> ScopedReducer<Self, S, A> {
            ScopedReducer::new(self, lens, prism)
        }

        /// Address one entry of a map-valued field by key
        fn for_each_key<S, A, K>(
            self,
            lens: Lens<S, HashMap<K, Self::State>>,
            prism: Prism<A, (K, Self::Action)>,
        ) -> KeyedReducer<Self, S, A, K>
        where
            K: Eq + Hash,
        {
            KeyedReducer::new(self, lens, prism)
        }

        /// Address one element of a sequence-valued field by position
        fn for_each_index<S, A>(
            self,
            lens: Lens<S, Vec<Self::State>>,
            prism: Prism<A, (usize, Self::Action)>,
        ) -> IndexedReducer<Self, S, A> {
            IndexedReducer::new(self, lens, prism)
        }

        /// Erase the concrete type
        fn boxed(self) -> Box<dyn Reducer<State = Self::State, Action = Self::Action> + Send + Sync>
        where
            Self: Send + Sync + 'static,
        {
            Box::new(self)
        }
    }

    impl<R: Reducer> ReducerExt for R {}
}

/// Effect module - The asynchronous half of a middleware
///
/// A middleware inspects state synchronously and returns an `Effect`
/// describing what should happen next. Effects are values: the Store
/// executes them and feeds any resulting action back into dispatch.
/// Every variant yields at most one follow-up action.
pub mod effect {
    use crate::cancellation::CancellationToken;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Boxed future resolving to an optional follow-up action
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Effect type - describes the asynchronous outcome of a middleware
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No follow-up
        None,

        /// Immediate follow-up action, no suspension
        Emit(Action),

        /// Delayed action
        ///
        /// Resolves to no follow-up if the dispatch is cancelled before the
        /// delay elapses.
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the store
        Future(EffectFuture<Action>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Emit(action) => f.debug_tuple("Effect::Emit").field(action).finish(),
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap a future as an effect
        pub fn future<F>(future: F) -> Self
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Dispatch `action` after `duration`
        pub fn delay(duration: Duration, action: Action) -> Self {
            Effect::Delay {
                duration,
                action: Box::new(action),
            }
        }

        /// Returns true for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Transform the follow-up action, if any
        ///
        /// Used by the lifting combinators to re-embed a narrow follow-up
        /// into the enclosing action type.
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            Action: Send + 'static,
            B: 'static,
            F: FnOnce(Action) -> B + Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Emit(action) => Effect::Emit(f(action)),
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new(f(*action)),
                },
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(f) })),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Run the effect to its follow-up action
        ///
        /// A delay resolves to `None` if `cancel` fires before it elapses.
        /// Futures are awaited as-is; they observe cancellation themselves.
        pub async fn resolve(self, cancel: &CancellationToken) -> Option<Action> {
            match self {
                Effect::None => None,
                Effect::Emit(action) => Some(action),
                Effect::Delay { duration, action } => {
                    tokio::select! {
                        () = tokio::time::sleep(duration) => Some(*action),
                        () = cancel.cancelled() => None,
                    }
                },
                Effect::Future(future) => future.await,
            }
        }
    }

    impl<Action> From<Option<Action>> for Effect<Action> {
        fn from(action: Option<Action>) -> Self {
            action.map_or(Effect::None, Effect::Emit)
        }
    }
}
