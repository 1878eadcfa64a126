//! Middleware: the effectful half of a feature.
//!
//! A [`Middleware`] receives the post-reduction state and the original action
//! and returns an [`Effect`] that resolves to at most one follow-up action.
//! The synchronous part of `handle` reads the state snapshot; the returned
//! effect owns everything it needs and runs on the store's executor.
//!
//! The combinators here mirror the reducer combinators in
//! [`composition`](crate::composition): each one extracts the narrow action
//! (and addresses the narrow state), delegates, and re-embeds any follow-up
//! into the enclosing action type. When nothing matches they return
//! [`Effect::None`].
//!
//! # Example
//!
//! ```
//! use flowstore_core::{CancellationToken, Effect, middleware::Middleware};
//! use std::time::Duration;
//!
//! #[derive(Clone, Debug)]
//! enum Action {
//!     Increment,
//!     IncrementLater,
//! }
//!
//! struct Timer;
//!
//! impl Middleware for Timer {
//!     type State = i64;
//!     type Action = Action;
//!
//!     fn handle(&self, _state: &i64, action: &Action, _cancel: &CancellationToken) -> Effect<Action> {
//!         match action {
//!             Action::IncrementLater => Effect::delay(Duration::from_millis(10), Action::Increment),
//!             Action::Increment => Effect::None,
//!         }
//!     }
//! }
//! ```

use crate::cancellation::CancellationToken;
use crate::effect::Effect;
use crate::lens::Lens;
use crate::prism::Prism;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// Effect handler run after every reduction
///
/// Implementations must not block inside `handle`: put waiting and I/O in
/// the returned effect. Errors are the middleware's own business and are
/// usually reported as "no follow-up".
pub trait Middleware: Send + Sync {
    /// The state observed by this middleware
    type State;

    /// The action type consumed and produced
    type Action;

    /// Inspect the post-reduction `state` and the original `action`
    ///
    /// `cancel` is the token of the dispatch tree this action belongs to.
    /// Effects that wait should observe it and resolve to `None` once it
    /// fires.
    fn handle(
        &self,
        state: &Self::State,
        action: &Self::Action,
        cancel: &CancellationToken,
    ) -> Effect<Self::Action>;
}

/// Type-erased middleware as stored by the runtime
pub type BoxedMiddleware<S, A> = Box<dyn Middleware<State = S, Action = A>>;

impl<M: Middleware + ?Sized> Middleware for Box<M> {
    type State = M::State;
    type Action = M::Action;

    fn handle(
        &self,
        state: &Self::State,
        action: &Self::Action,
        cancel: &CancellationToken,
    ) -> Effect<Self::Action> {
        (**self).handle(state, action, cancel)
    }
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    type State = M::State;
    type Action = M::Action;

    fn handle(
        &self,
        state: &Self::State,
        action: &Self::Action,
        cancel: &CancellationToken,
    ) -> Effect<Self::Action> {
        (**self).handle(state, action, cancel)
    }
}

/// A middleware backed by a closure
///
/// Created by [`middleware_fn`]. The runtime's derived-store bridge is built
/// on this adapter.
pub struct FnMiddleware<S, A, F> {
    f: F,
    _phantom: PhantomData<fn(&S, &A)>,
}

/// Turn a closure into a [`Middleware`]
///
/// # Example
///
/// ```
/// use flowstore_core::{CancellationToken, Effect, middleware::{Middleware, middleware_fn}};
///
/// let echo = middleware_fn(|count: &i64, _action: &i64, _cancel: &CancellationToken| {
///     if *count < 3 { Effect::Emit(1) } else { Effect::None }
/// });
///
/// let effect = echo.handle(&0, &1, &CancellationToken::new());
/// assert!(matches!(effect, Effect::Emit(1)));
/// ```
pub const fn middleware_fn<S, A, F>(f: F) -> FnMiddleware<S, A, F>
where
    F: Fn(&S, &A, &CancellationToken) -> Effect<A> + Send + Sync,
{
    FnMiddleware {
        f,
        _phantom: PhantomData,
    }
}

impl<S, A, F> Middleware for FnMiddleware<S, A, F>
where
    F: Fn(&S, &A, &CancellationToken) -> Effect<A> + Send + Sync,
{
    type State = S;
    type Action = A;

    fn handle(&self, state: &S, action: &A, cancel: &CancellationToken) -> Effect<A> {
        (self.f)(state, action, cancel)
    }
}

/// Lifts a middleware to `Option<State>`
///
/// An absent state produces no effect.
#[derive(Debug, Clone)]
pub struct OptionalMiddleware<M> {
    middleware: M,
}

impl<M> OptionalMiddleware<M> {
    /// Wrap `middleware`
    #[must_use]
    pub const fn new(middleware: M) -> Self {
        Self { middleware }
    }
}

impl<M: Middleware> Middleware for OptionalMiddleware<M> {
    type State = Option<M::State>;
    type Action = M::Action;

    fn handle(
        &self,
        state: &Self::State,
        action: &Self::Action,
        cancel: &CancellationToken,
    ) -> Effect<Self::Action> {
        match state {
            Some(inner) => self.middleware.handle(inner, action, cancel),
            None => Effect::None,
        }
    }
}

/// Embeds a middleware in a larger state and action type
pub struct ScopedMiddleware<M: Middleware, S, A> {
    middleware: M,
    lens: Lens<S, M::State>,
    prism: Prism<A, M::Action>,
}

impl<M: Middleware, S, A> ScopedMiddleware<M, S, A> {
    /// Wrap `middleware`, addressing its state with `lens` and its actions with `prism`
    #[must_use]
    pub const fn new(middleware: M, lens: Lens<S, M::State>, prism: Prism<A, M::Action>) -> Self {
        Self {
            middleware,
            lens,
            prism,
        }
    }
}

impl<M, S, A> Middleware for ScopedMiddleware<M, S, A>
where
    M: Middleware,
    M::Action: Send + 'static,
    A: 'static,
{
    type State = S;
    type Action = A;

    fn handle(&self, state: &S, action: &A, cancel: &CancellationToken) -> Effect<A> {
        let Some(sub_action) = self.prism.extract(action) else {
            return Effect::None;
        };
        let prism = self.prism.clone();
        self.middleware
            .handle(self.lens.get(state), &sub_action, cancel)
            .map(move |follow_up| prism.embed(follow_up))
    }
}

/// Runs a middleware against one entry of a map, addressed by key
///
/// A key absent from the map produces no effect. Follow-ups are re-embedded
/// with the same key.
pub struct KeyedMiddleware<M: Middleware, S, A, K> {
    middleware: M,
    lens: Lens<S, HashMap<K, M::State>>,
    prism: Prism<A, (K, M::Action)>,
}

impl<M: Middleware, S, A, K> KeyedMiddleware<M, S, A, K> {
    /// Wrap `middleware`
    #[must_use]
    pub const fn new(
        middleware: M,
        lens: Lens<S, HashMap<K, M::State>>,
        prism: Prism<A, (K, M::Action)>,
    ) -> Self {
        Self {
            middleware,
            lens,
            prism,
        }
    }
}

impl<M, S, A, K> Middleware for KeyedMiddleware<M, S, A, K>
where
    M: Middleware,
    M::Action: Send + 'static,
    A: 'static,
    K: Eq + Hash + Send + 'static,
{
    type State = S;
    type Action = A;

    fn handle(&self, state: &S, action: &A, cancel: &CancellationToken) -> Effect<A> {
        let Some((key, sub_action)) = self.prism.extract(action) else {
            return Effect::None;
        };
        let Some(entry) = self.lens.get(state).get(&key) else {
            return Effect::None;
        };
        let prism = self.prism.clone();
        self.middleware
            .handle(entry, &sub_action, cancel)
            .map(move |follow_up| prism.embed((key, follow_up)))
    }
}

/// Runs a middleware against one element of a sequence, addressed by position
///
/// An out-of-range index produces no effect.
pub struct IndexedMiddleware<M: Middleware, S, A> {
    middleware: M,
    lens: Lens<S, Vec<M::State>>,
    prism: Prism<A, (usize, M::Action)>,
}

impl<M: Middleware, S, A> IndexedMiddleware<M, S, A> {
    /// Wrap `middleware`
    #[must_use]
    pub const fn new(
        middleware: M,
        lens: Lens<S, Vec<M::State>>,
        prism: Prism<A, (usize, M::Action)>,
    ) -> Self {
        Self {
            middleware,
            lens,
            prism,
        }
    }
}

impl<M, S, A> Middleware for IndexedMiddleware<M, S, A>
where
    M: Middleware,
    M::Action: Send + 'static,
    A: 'static,
{
    type State = S;
    type Action = A;

    fn handle(&self, state: &S, action: &A, cancel: &CancellationToken) -> Effect<A> {
        let Some((index, sub_action)) = self.prism.extract(action) else {
            return Effect::None;
        };
        let Some(element) = self.lens.get(state).get(index) else {
            return Effect::None;
        };
        let prism = self.prism.clone();
        self.middleware
            .handle(element, &sub_action, cancel)
            .map(move |follow_up| prism.embed((index, follow_up)))
    }
}

/// Combinator methods available on every [`Middleware`]
pub trait MiddlewareExt: Middleware + Sized {
    /// Lift into `Option<State>`
    fn optional(self) -> OptionalMiddleware<Self> {
        OptionalMiddleware::new(self)
    }

    /// Embed into a larger state and action type
    fn scope<S, A>(
        self,
        lens: Lens<S, Self::State>,
        prism: Prism<A, Self::Action>,
    ) -> ScopedMiddleware<Self, S, A> {
        ScopedMiddleware::new(self, lens, prism)
    }

    /// Address one entry of a map-valued field by key
    fn for_each_key<S, A, K>(
        self,
        lens: Lens<S, HashMap<K, Self::State>>,
        prism: Prism<A, (K, Self::Action)>,
    ) -> KeyedMiddleware<Self, S, A, K>
    where
        K: Eq + Hash,
    {
        KeyedMiddleware::new(self, lens, prism)
    }

    /// Address one element of a sequence-valued field by position
    fn for_each_index<S, A>(
        self,
        lens: Lens<S, Vec<Self::State>>,
        prism: Prism<A, (usize, Self::Action)>,
    ) -> IndexedMiddleware<Self, S, A> {
        IndexedMiddleware::new(self, lens, prism)
    }

    /// Erase the concrete type for storage in a store's middleware list
    fn boxed(self) -> BoxedMiddleware<Self::State, Self::Action>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<M: Middleware> MiddlewareExt for M {}
