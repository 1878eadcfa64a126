//! Cooperative cancellation for dispatch trees.
//!
//! Every `send` on a store runs under a [`CancellationToken`]. The same token
//! is handed to each middleware the action fans out to, and to every recursive
//! dispatch of the follow-ups those middleware produce. Cancelling the token
//! therefore reaches the whole tree.
//!
//! Cancellation is cooperative: nothing is aborted. Middleware observe the
//! token (via [`CancellationToken::is_cancelled`] or
//! [`CancellationToken::cancelled`]) and choose to return no follow-up.
//!
//! # Example
//!
//! ```
//! use flowstore_core::CancellationToken;
//!
//! let parent = CancellationToken::new();
//! let child = parent.child_token();
//!
//! parent.cancel();
//! assert!(child.is_cancelled());
//! ```

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable, hierarchical cancellation flag
///
/// Clones share the same flag. A token created with
/// [`child_token`](Self::child_token) is cancelled when either it or any
/// ancestor is cancelled; cancelling a child does not affect its parent.
/// [`linked_child`](Self::linked_child) creates a child with two parents.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    flag: watch::Sender<bool>,
    parents: Vec<CancellationToken>,
}

impl CancellationToken {
    /// Create a new, uncancelled root token
    #[must_use]
    pub fn new() -> Self {
        Self::with_parents(Vec::new())
    }

    fn with_parents(parents: Vec<Self>) -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            inner: Arc::new(TokenInner { flag, parents }),
        }
    }

    /// Create a token that is also cancelled when `self` is cancelled
    #[must_use]
    pub fn child_token(&self) -> Self {
        Self::with_parents(vec![self.clone()])
    }

    /// Create a token that is cancelled when either `self` or `other` is
    #[must_use]
    pub fn linked_child(&self, other: &Self) -> Self {
        Self::with_parents(vec![self.clone(), other.clone()])
    }

    /// Cancel this token and every token derived from it
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.inner.flag.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    /// Returns true if this token or any ancestor has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.inner.flag.borrow() || self.inner.parents.iter().any(CancellationToken::is_cancelled)
    }

    /// Wait until this token or any ancestor is cancelled
    ///
    /// Resolves immediately if cancellation already happened.
    pub async fn cancelled(&self) {
        let mut ancestry = Vec::new();
        let mut pending = vec![self];
        while let Some(token) = pending.pop() {
            ancestry.push(token.inner.flag.subscribe());
            pending.extend(token.inner.parents.iter());
        }

        let waits = ancestry.into_iter().map(|mut rx| {
            Box::pin(async move {
                // Senders live as long as `self`, so this only returns once a flag is set.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            })
        });
        futures::future::select_all(waits).await;
    }

    /// Wrap the token in a guard that cancels it on drop
    ///
    /// Call [`DropGuard::disarm`] once the guarded work finished normally.
    #[must_use]
    pub fn drop_guard(self) -> DropGuard {
        DropGuard { token: Some(self) }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("is_cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Cancels the wrapped token when dropped, unless disarmed
///
/// Dropping a `send` future before it completes drops its guard, which is how
/// cancellation of the owning task propagates into the dispatch tree.
#[derive(Debug)]
pub struct DropGuard {
    token: Option<CancellationToken>,
}

impl DropGuard {
    /// Release the token without cancelling it
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
