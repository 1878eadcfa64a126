//! Two-way accessors for UI layers.
//!
//! A [`Binding`] reads one value out of the store's state and writes it back
//! by embedding it into an action. Writes reduce immediately; the middleware
//! fan-out for the written action runs in the background.

use crate::store::Store;
use flowstore_core::reducer::Reducer;
use std::sync::Arc;

/// Read/write view of one value projected out of a store
pub struct Binding<S, A, R, V>
where
    R: Reducer<State = S, Action = A>,
{
    store: Store<S, A, R>,
    extract: Arc<dyn Fn(&S) -> V + Send + Sync>,
    embed: Arc<dyn Fn(V) -> A + Send + Sync>,
}

impl<S, A, R, V> Binding<S, A, R, V>
where
    R: Reducer<State = S, Action = A> + Send + Sync + 'static,
    S: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Read the projected value
    pub async fn get(&self) -> V {
        self.store.state(|state| (self.extract)(state)).await
    }

    /// Write a value
    ///
    /// Returns once the reducer has applied the embedded action. Middleware
    /// for that action run afterwards, detached from the caller.
    pub async fn set(&self, value: V) {
        let action = (self.embed)(value);
        self.store.reduce_then_detach(action).await;
    }
}

impl<S, A, R, V> Clone for Binding<S, A, R, V>
where
    R: Reducer<State = S, Action = A>,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            extract: Arc::clone(&self.extract),
            embed: Arc::clone(&self.embed),
        }
    }
}

impl<S, A, R> Store<S, A, R>
where
    R: Reducer<State = S, Action = A> + Send + Sync + 'static,
    S: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Create a binding to one value of this store's state
    ///
    /// # Example
    ///
    /// ```ignore
    /// let title = store.binding(|s: &Form| s.title.clone(), FormAction::SetTitle);
    /// title.set("Draft".to_string()).await;
    /// assert_eq!(title.get().await, "Draft");
    /// ```
    #[must_use]
    pub fn binding<V, F, G>(&self, extract: F, embed: G) -> Binding<S, A, R, V>
    where
        F: Fn(&S) -> V + Send + Sync + 'static,
        G: Fn(V) -> A + Send + Sync + 'static,
    {
        Binding {
            store: self.clone(),
            extract: Arc::new(extract),
            embed: Arc::new(embed),
        }
    }
}
