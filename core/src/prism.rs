//! Partial mappings between a composite type and one of its parts.
//!
//! A [`Prism`] is a pair of pure functions:
//!
//! - `embed: Part → Whole` (always succeeds)
//! - `extract: &Whole → Option<Part>` (fails when the whole is a different case)
//!
//! It lets a reducer or middleware written for a narrow action type operate
//! inside a larger action enum: the combinators in [`composition`](crate::composition)
//! and [`middleware`](crate::middleware) extract the narrow action, delegate,
//! and embed any follow-up back.
//!
//! # Law
//!
//! For every `part`, `extract(&embed(part)) == Some(part)`.
//!
//! # Example
//!
//! ```
//! use flowstore_core::Prism;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     Quit,
//! }
//!
//! let counter: Prism<AppAction, CounterAction> = Prism::new(AppAction::Counter, |action: &AppAction| {
//!     match action {
//!         AppAction::Counter(inner) => Some(inner.clone()),
//!         _ => None,
//!     }
//! });
//!
//! let whole = counter.embed(CounterAction::Increment);
//! assert_eq!(counter.extract(&whole), Some(CounterAction::Increment));
//! assert_eq!(counter.extract(&AppAction::Quit), None);
//! ```

use std::sync::Arc;

type EmbedFn<Whole, Part> = Arc<dyn Fn(Part) -> Whole + Send + Sync>;
type ExtractFn<Whole, Part> = Arc<dyn Fn(&Whole) -> Option<Part> + Send + Sync>;

/// Reversible partial mapping between `Whole` and `Part`
///
/// Cheap to clone: both functions are reference counted.
pub struct Prism<Whole, Part> {
    embed: EmbedFn<Whole, Part>,
    extract: ExtractFn<Whole, Part>,
}

impl<Whole, Part> Prism<Whole, Part>
where
    Whole: 'static,
    Part: 'static,
{
    /// Build a prism from its two functions
    pub fn new<E, X>(embed: E, extract: X) -> Self
    where
        E: Fn(Part) -> Whole + Send + Sync + 'static,
        X: Fn(&Whole) -> Option<Part> + Send + Sync + 'static,
    {
        Self {
            embed: Arc::new(embed),
            extract: Arc::new(extract),
        }
    }

    /// Embed a part into the whole
    pub fn embed(&self, part: Part) -> Whole {
        (self.embed)(part)
    }

    /// Extract the part, or `None` if `whole` does not carry one
    pub fn extract(&self, whole: &Whole) -> Option<Part> {
        (self.extract)(whole)
    }

    /// Compose with a prism focusing further into `Part`
    ///
    /// # Example
    ///
    /// ```
    /// use flowstore_core::Prism;
    ///
    /// let outer: Prism<Option<Option<u8>>, Option<u8>> = Prism::new(Some, |o: &Option<Option<u8>>| o.clone());
    /// let inner: Prism<Option<u8>, u8> = Prism::new(Some, |o: &Option<u8>| *o);
    /// let both = outer.then(inner);
    ///
    /// assert_eq!(both.embed(3), Some(Some(3)));
    /// assert_eq!(both.extract(&Some(None)), None);
    /// ```
    #[must_use]
    pub fn then<Sub>(&self, inner: Prism<Part, Sub>) -> Prism<Whole, Sub>
    where
        Sub: 'static,
    {
        let outer_embed = Arc::clone(&self.embed);
        let outer_extract = Arc::clone(&self.extract);
        let inner_embed = Arc::clone(&inner.embed);
        let inner_extract = inner.extract;

        Prism::new(
            move |sub| outer_embed(inner_embed(sub)),
            move |whole: &Whole| outer_extract(whole).and_then(|part| inner_extract(&part)),
        )
    }
}

impl<Whole> Prism<Whole, Whole>
where
    Whole: Clone + 'static,
{
    /// The prism that matches every value
    #[must_use]
    pub fn identity() -> Self {
        Self::new(|whole| whole, |whole: &Whole| Some(whole.clone()))
    }
}

impl<Whole, Part> Clone for Prism<Whole, Part> {
    fn clone(&self) -> Self {
        Self {
            embed: Arc::clone(&self.embed),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<Whole, Part> std::fmt::Debug for Prism<Whole, Part> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prism")
            .field("whole", &std::any::type_name::<Whole>())
            .field("part", &std::any::type_name::<Part>())
            .finish()
    }
}
