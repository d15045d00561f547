//! Typed context keys.
//!
//! A [`ContextKey`] is the explicit replacement for symbol-keyed injection:
//! a process-wide unique token plus a phantom type, so a value provided
//! under a key can only be read back at that key's type. Every coupling
//! definition mints its own pair of keys, which is what keeps two couplings
//! in the same tree from ever colliding.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Unique, typed key for ancestor-scoped context values.
pub struct ContextKey<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    /// Mint a fresh key, distinct from every other key in the process.
    pub fn new() -> Self {
        Self {
            id: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    pub(crate) fn raw(self) -> u64 {
        self.id
    }
}

impl<T> Default for ContextKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextKey({})", self.id)
    }
}
