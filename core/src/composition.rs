//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`** / [`Then`]: Run multiple reducers on the same state/action, in order
//! - **[`OptionalReducer`]**: Run a reducer on state that may be absent
//! - **`scope_reducer`**: Focus a reducer on a field of a larger state and a case of a larger action
//! - **`keyed_reducer`**: Focus a reducer on one entry of a map
//! - **`indexed_reducer`**: Focus a reducer on one element of a sequence
//!
//! Every lifted reducer is a no-op when its prism does not match the incoming
//! action, or when the addressed entry does not exist.
//!
//! # Examples
//!
//! ## Combining Reducers
//!
//! ```
//! use flowstore_core::composition::combine_reducers;
//! use flowstore_core::reducer::{Reducer, reducer_fn};
//!
//! let add_one = reducer_fn(|state: &mut i32, _: &()| *state += 1);
//! let double = reducer_fn(|state: &mut i32, _: &()| *state *= 2);
//!
//! let combined = combine_reducers(vec![Box::new(add_one), Box::new(double)]);
//!
//! let mut state = 1;
//! combined.reduce(&mut state, &());
//! assert_eq!(state, 4); // (1 + 1) * 2, order matters
//! ```

use crate::lens::Lens;
use crate::prism::Prism;
use crate::reducer::Reducer;
use std::collections::HashMap;
use std::hash::Hash;

/// Boxed reducer accepted by [`combine_reducers`]
pub type BoxedReducer<S, A> = Box<dyn Reducer<State = S, Action = A> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Reducers run left to right: each one sees the state produced by the
/// previous one, for the same action.
///
/// # Type Parameters
///
/// - `S`: The state type
/// - `A`: The action type
#[must_use]
pub fn combine_reducers<S, A>(reducers: Vec<BoxedReducer<S, A>>) -> CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    reducers: Vec<BoxedReducer<S, A>>,
}

impl<S, A> CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    /// Number of reducers being combined
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Returns true if no reducers are combined (the identity reducer)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A> Reducer for CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        for reducer in &self.reducers {
            reducer.reduce(state, action);
        }
    }
}

/// Two reducers run in sequence, without boxing
///
/// Created by [`ReducerExt::combine`](crate::reducer::ReducerExt::combine).
#[derive(Debug, Clone)]
pub struct Then<R1, R2> {
    first: R1,
    second: R2,
}

impl<R1, R2> Then<R1, R2> {
    /// Run `first`, then `second`
    #[must_use]
    pub const fn new(first: R1, second: R2) -> Self {
        Self { first, second }
    }
}

impl<R1, R2> Reducer for Then<R1, R2>
where
    R1: Reducer,
    R2: Reducer<State = R1::State, Action = R1::Action>,
{
    type State = R1::State;
    type Action = R1::Action;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        self.first.reduce(state, action);
        self.second.reduce(state, action);
    }
}

/// Lifts a reducer to operate on `Option<State>`.
///
/// An absent state stays absent; a present one is reduced in place.
#[derive(Debug, Clone)]
pub struct OptionalReducer<R> {
    reducer: R,
}

impl<R> OptionalReducer<R> {
    /// Wrap `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self { reducer }
    }
}

impl<R: Reducer> Reducer for OptionalReducer<R> {
    type State = Option<R::State>;
    type Action = R::Action;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        if let Some(inner) = state {
            self.reducer.reduce(inner, action);
        }
    }
}

/// Scopes a reducer to a field of a larger state and a case of a larger action.
///
/// # Type Parameters
///
/// - `S`: The parent state type
/// - `A`: The parent action type
///
/// # Examples
///
/// ```
/// use flowstore_core::composition::scope_reducer;
/// use flowstore_core::reducer::{Reducer, reducer_fn};
/// use flowstore_core::{Lens, Prism};
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     counter: i32,
///     other_data: String,
/// }
///
/// #[derive(Clone)]
/// enum AppAction {
///     Add(i32),
///     Rename(String),
/// }
///
/// let add = reducer_fn(|count: &mut i32, amount: &i32| *count += amount);
///
/// let scoped = scope_reducer(
///     add,
///     Lens::new(|s: &AppState| &s.counter, |s: &mut AppState| &mut s.counter),
///     Prism::new(AppAction::Add, |a: &AppAction| match a {
///         AppAction::Add(n) => Some(*n),
///         AppAction::Rename(_) => None,
///     }),
/// );
///
/// let mut state = AppState::default();
/// scoped.reduce(&mut state, &AppAction::Add(3));
/// scoped.reduce(&mut state, &AppAction::Rename("ignored".into()));
/// assert_eq!(state.counter, 3);
/// ```
pub const fn scope_reducer<R, S, A>(
    reducer: R,
    lens: Lens<S, R::State>,
    prism: Prism<A, R::Action>,
) -> ScopedReducer<R, S, A>
where
    R: Reducer,
{
    ScopedReducer::new(reducer, lens, prism)
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<R: Reducer, S, A> {
    reducer: R,
    lens: Lens<S, R::State>,
    prism: Prism<A, R::Action>,
}

impl<R: Reducer, S, A> ScopedReducer<R, S, A> {
    /// Wrap `reducer`, addressing its state with `lens` and its actions with `prism`
    #[must_use]
    pub const fn new(reducer: R, lens: Lens<S, R::State>, prism: Prism<A, R::Action>) -> Self {
        Self {
            reducer,
            lens,
            prism,
        }
    }
}

impl<R, S, A> Reducer for ScopedReducer<R, S, A>
where
    R: Reducer,
    R::Action: 'static,
    A: 'static,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        let Some(sub_action) = self.prism.extract(action) else {
            return;
        };
        self.reducer.reduce(self.lens.get_mut(state), &sub_action);
    }
}

/// Focuses a reducer on one entry of a `HashMap` field.
///
/// The prism targets `(key, sub_action)`. A key absent from the map leaves
/// state untouched.
pub const fn keyed_reducer<R, S, A, K>(
    reducer: R,
    lens: Lens<S, HashMap<K, R::State>>,
    prism: Prism<A, (K, R::Action)>,
) -> KeyedReducer<R, S, A, K>
where
    R: Reducer,
    K: Eq + Hash,
{
    KeyedReducer::new(reducer, lens, prism)
}

/// A reducer addressing one map entry by key.
///
/// Created by [`keyed_reducer`].
pub struct KeyedReducer<R: Reducer, S, A, K> {
    reducer: R,
    lens: Lens<S, HashMap<K, R::State>>,
    prism: Prism<A, (K, R::Action)>,
}

impl<R: Reducer, S, A, K> KeyedReducer<R, S, A, K> {
    /// Wrap `reducer`
    #[must_use]
    pub const fn new(
        reducer: R,
        lens: Lens<S, HashMap<K, R::State>>,
        prism: Prism<A, (K, R::Action)>,
    ) -> Self {
        Self {
            reducer,
            lens,
            prism,
        }
    }
}

impl<R, S, A, K> Reducer for KeyedReducer<R, S, A, K>
where
    R: Reducer,
    R::Action: 'static,
    A: 'static,
    K: Eq + Hash + 'static,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        let Some((key, sub_action)) = self.prism.extract(action) else {
            return;
        };
        if let Some(entry) = self.lens.get_mut(state).get_mut(&key) {
            self.reducer.reduce(entry, &sub_action);
        }
    }
}

/// Focuses a reducer on one element of a `Vec` field.
///
/// The prism targets `(index, sub_action)`. An out-of-range index leaves
/// state untouched.
pub const fn indexed_reducer<R, S, A>(
    reducer: R,
    lens: Lens<S, Vec<R::State>>,
    prism: Prism<A, (usize, R::Action)>,
) -> IndexedReducer<R, S, A>
where
    R: Reducer,
{
    IndexedReducer::new(reducer, lens, prism)
}

/// A reducer addressing one sequence element by position.
///
/// Created by [`indexed_reducer`].
pub struct IndexedReducer<R: Reducer, S, A> {
    reducer: R,
    lens: Lens<S, Vec<R::State>>,
    prism: Prism<A, (usize, R::Action)>,
}

impl<R: Reducer, S, A> IndexedReducer<R, S, A> {
    /// Wrap `reducer`
    #[must_use]
    pub const fn new(
        reducer: R,
        lens: Lens<S, Vec<R::State>>,
        prism: Prism<A, (usize, R::Action)>,
    ) -> Self {
        Self {
            reducer,
            lens,
            prism,
        }
    }
}

impl<R, S, A> Reducer for IndexedReducer<R, S, A>
where
    R: Reducer,
    R::Action: 'static,
    A: 'static,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        let Some((index, sub_action)) = self.prism.extract(action) else {
            return;
        };
        if let Some(element) = self.lens.get_mut(state).get_mut(index) {
            self.reducer.reduce(element, &sub_action);
        }
    }
}
