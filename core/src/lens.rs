//! Accessor pairs that address a sub-state inside a larger state.
//!
//! A [`Lens`] is the explicit form of a writable key path: a getter and a
//! mutable getter passed around as plain function values. The scoped, keyed
//! and indexed combinators use it to find the sub-state they delegate to.
//!
//! # Example
//!
//! ```
//! use flowstore_core::Lens;
//!
//! #[derive(Default)]
//! struct AppState {
//!     count: i64,
//!     title: String,
//! }
//!
//! let count = Lens::new(|s: &AppState| &s.count, |s: &mut AppState| &mut s.count);
//!
//! let mut state = AppState::default();
//! *count.get_mut(&mut state) += 2;
//! assert_eq!(*count.get(&state), 2);
//! ```

/// Getter and mutable getter for a `Part` stored inside a `Whole`
pub struct Lens<Whole, Part> {
    get: fn(&Whole) -> &Part,
    get_mut: fn(&mut Whole) -> &mut Part,
}

impl<Whole, Part> Lens<Whole, Part> {
    /// Build a lens from its accessors
    #[must_use]
    pub const fn new(get: fn(&Whole) -> &Part, get_mut: fn(&mut Whole) -> &mut Part) -> Self {
        Self { get, get_mut }
    }

    /// Borrow the part
    pub fn get<'a>(&self, whole: &'a Whole) -> &'a Part {
        (self.get)(whole)
    }

    /// Borrow the part mutably
    pub fn get_mut<'a>(&self, whole: &'a mut Whole) -> &'a mut Part {
        (self.get_mut)(whole)
    }

    /// Replace the part
    pub fn set(&self, whole: &mut Whole, part: Part) {
        *(self.get_mut)(whole) = part;
    }
}

impl<Whole> Lens<Whole, Whole> {
    /// The lens that addresses the whole value
    #[must_use]
    pub fn identity() -> Self {
        Self::new(|whole| whole, |whole| whole)
    }
}

impl<Whole, Part> Clone for Lens<Whole, Part> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Whole, Part> Copy for Lens<Whole, Part> {}

impl<Whole, Part> std::fmt::Debug for Lens<Whole, Part> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lens")
            .field("whole", &std::any::type_name::<Whole>())
            .field("part", &std::any::type_name::<Part>())
            .finish()
    }
}
