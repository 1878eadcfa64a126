//! Deduplicated projections of a store's state.
//!
//! A [`DerivedStore`] watches the parent's revision counter, recomputes its
//! projection after every reduction, and publishes the new value only when it
//! differs from the previous one. Sending to a derived store embeds the
//! action into the parent's action type and forwards it.
//!
//! This is a compatibility path for UI layers that expect a store per
//! component. New code should prefer scoping reducers and middleware.

use crate::error::StoreError;
use crate::store::Store;
use flowstore_core::reducer::Reducer;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tokio::sync::watch;

type ForwardFn<DA> = Arc<dyn Fn(DA) -> BoxFuture<'static, ()> + Send + Sync>;

/// Read-only projection of a parent store, with upward action forwarding
///
/// The projection task ends when every clone of the derived store (and every
/// receiver from [`subscribe`](Self::subscribe)) has been dropped.
pub struct DerivedStore<DS, DA> {
    state: watch::Receiver<DS>,
    forward: ForwardFn<DA>,
}

impl<DS, DA> DerivedStore<DS, DA> {
    /// Read the current projection via a closure
    pub fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&DS) -> T,
    {
        f(&self.state.borrow())
    }

    /// Clone the current projection
    #[must_use]
    pub fn snapshot(&self) -> DS
    where
        DS: Clone,
    {
        self.state.borrow().clone()
    }

    /// Wait until the projection changes
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ChannelClosed`] if the projection task stopped.
    pub async fn changed(&mut self) -> Result<(), StoreError> {
        self.state
            .changed()
            .await
            .map_err(|_| StoreError::ChannelClosed)
    }

    /// A fresh receiver of projection changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DS> {
        self.state.clone()
    }

    /// Embed `action` into the parent's action type and send it there
    ///
    /// Resolves when the parent's dispatch tree completes.
    pub async fn send(&self, action: DA) {
        (self.forward)(action).await;
    }
}

impl<DS, DA> Clone for DerivedStore<DS, DA> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            forward: Arc::clone(&self.forward),
        }
    }
}

impl<S, A, R> Store<S, A, R>
where
    R: Reducer<State = S, Action = A> + Send + Sync + 'static,
    S: Send + Sync + 'static,
    A: Clone + Send + Sync + 'static,
{
    /// Create a derived store
    ///
    /// - `derive_state` projects the parent's state; it runs after every
    ///   parent reduction and must be cheap
    /// - `derive_action` embeds a derived action into the parent's action type
    ///
    /// Equal consecutive projections are not republished.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let counter = store
    ///     .derived(|app: &AppState| app.counter.clone(), AppAction::Counter)
    ///     .await;
    ///
    /// counter.send(CounterAction::Increment).await;
    /// assert_eq!(counter.state(|c| c.count), 1);
    /// ```
    pub async fn derived<DS, DA, F, G>(&self, derive_state: F, derive_action: G) -> DerivedStore<DS, DA>
    where
        DS: PartialEq + Send + Sync + 'static,
        DA: Send + 'static,
        F: Fn(&S) -> DS + Send + Sync + 'static,
        G: Fn(DA) -> A + Send + Sync + 'static,
    {
        let state = self.state_cell();
        // Subscribe before the first projection so no reduction is missed
        let mut revisions = self.subscribe_state();
        let initial = derive_state(&*state.read().await);
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = revisions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    },
                    () = tx.closed() => break,
                }

                let projected = derive_state(&*state.read().await);
                let published = tx.send_if_modified(|current| {
                    if *current == projected {
                        false
                    } else {
                        *current = projected;
                        true
                    }
                });
                tracing::trace!(published, "Derived projection recomputed");
            }
            tracing::debug!("Derived store projection stopped");
        });

        let parent = self.clone();
        let forward: ForwardFn<DA> = Arc::new(move |action: DA| {
            let parent = parent.clone();
            let action = derive_action(action);
            async move { parent.send(action).await }.boxed()
        });

        DerivedStore { state: rx, forward }
    }
}
